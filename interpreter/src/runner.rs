use std::io::Write;
use std::sync::Arc;

use emu_lib::io::serial::{PipeSerial, SerialBackend};
use emu_lib::{ConfigError, Soc, SocConfig};

use log::debug;

use crate::script::{Addr, Command, ErrorKind, Line, ScriptError};

// Drives a Soc from parsed script lines. UART output and read results go to
// `out`.
pub struct Runner<W: Write> {
    soc: Soc,
    serial: Arc<PipeSerial>,
    out: W,
    trace: bool,
}

impl<W: Write> Runner<W> {
    pub fn new(config: &SocConfig, out: W) -> Result<Self, ConfigError> {
        let serial = Arc::new(PipeSerial::default());
        let backend: Arc<dyn SerialBackend> = serial.clone();
        let soc = Soc::new(config, Some(backend))?;
        Ok(Runner{ soc, serial, out, trace: false })
    }

    // Echo every bus access to the output as a comment line.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn soc(&self) -> &Soc {
        &self.soc
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn run(&mut self, lines: &[Line]) -> Result<(), ScriptError> {
        for line in lines {
            debug!("Runner: line {}: {:?}", line.num, line.cmd);
            self.exec(&line.cmd)
                .map_err(|kind| ScriptError{line: line.num, kind})?;
        }
        Ok(())
    }

    pub fn exec(&mut self, cmd: &Command) -> Result<(), ErrorKind> {
        match cmd {
            Command::Write{addr, val} => {
                let addr = self.resolve(addr)?;
                if self.trace {
                    writeln!(self.out, "; write {val:#010x} to {addr:#x}")?;
                }
                self.soc.write_word(addr, *val);
            }
            Command::Read{addr} => {
                let addr = self.resolve(addr)?;
                let val = self.read(addr)?;
                writeln!(self.out, "{addr:#x}: {val:#010x}")?;
            }
            Command::Expect{addr, val: expected} => {
                let addr = self.resolve(addr)?;
                let actual = self.read(addr)?;
                if actual != *expected {
                    return Err(ErrorKind::Mismatch{addr, expected: *expected, actual});
                }
            }
            Command::Advance(ns) => {
                if self.trace {
                    writeln!(self.out, "; advance {ns}ns from {}ns", self.soc.now())?;
                }
                self.soc.advance(*ns);
            }
            Command::Rx(bytes) => self.serial.write_input(bytes),
            Command::Break => self.serial.push_break(),
            Command::Irq{line, level} => {
                if self.soc.irq_level(*line) != *level {
                    return Err(ErrorKind::IrqMismatch{line: *line, expected: *level});
                }
            }
            Command::Reset => self.soc.reset(),
        }

        // Reading RXDATAX may have freed the receive slot.
        self.serial.pump();
        self.flush_serial()?;
        Ok(())
    }

    fn resolve(&self, addr: &Addr) -> Result<u64, ErrorKind> {
        match addr {
            Addr::Abs(addr) => Ok(*addr),
            Addr::Sym(name) => self
                .soc
                .symbol(name)
                .ok_or_else(|| ErrorKind::UnknownSymbol(name.clone())),
        }
    }

    fn read(&mut self, addr: u64) -> Result<u32, ErrorKind> {
        let val = self.soc.read_word(addr);
        if self.trace {
            writeln!(self.out, "; read {val:#010x} from {addr:#x}")?;
        }
        Ok(val)
    }

    fn flush_serial(&mut self) -> Result<(), ErrorKind> {
        let bytes = Vec::from(self.serial.take_output());
        if !bytes.is_empty() {
            self.out.write_all(&bytes)?;
        }
        Ok(())
    }
}
