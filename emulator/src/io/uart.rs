use std::sync::{Arc, Mutex, Weak};

use common::mem::RegisterFile;

use log::{debug, error, trace};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::io::serial::{SerialBackend, SerialFrontend};
use crate::io::{IrqLine, MMIOHandler};
use crate::snapshot::UartSnapshot;

#[derive(Debug, Clone, Copy, FromPrimitive, PartialEq, Eq)]
pub enum UartReg {
    Cmd = 0x0c, // Accepted and ignored
    Status = 0x10, // Read only
    RxDataX = 0x18, // Read only, clears STATUS.RXDATAV
    TxData = 0x34, // Write only
    If = 0x40,
    Ifs = 0x44, // Write only
    Ifc = 0x48, // Write only
    Ien = 0x4c,
}

impl UartReg {
    pub const ALL: [UartReg; 8] = [
        UartReg::Cmd,
        UartReg::Status,
        UartReg::RxDataX,
        UartReg::TxData,
        UartReg::If,
        UartReg::Ifs,
        UartReg::Ifc,
        UartReg::Ien,
    ];

    pub fn from_offset(offset: u64) -> Option<Self> {
        Self::from_u64(offset)
    }

    pub fn offset(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        match self {
            UartReg::Cmd => "cmd",
            UartReg::Status => "status",
            UartReg::RxDataX => "rxdatax",
            UartReg::TxData => "txdata",
            UartReg::If => "if",
            UartReg::Ifs => "ifs",
            UartReg::Ifc => "ifc",
            UartReg::Ien => "ien",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|reg| reg.name().eq_ignore_ascii_case(name))
    }
}

pub const UART_NUM_REGS: usize = RegisterFile::<0>::offset_to_index(UartReg::Ien as u64) + 1;

pub struct Uart {
    device: Option<Arc<dyn SerialBackend>>,
    irq: IrqLine,
    regs: RegisterFile<UART_NUM_REGS>,
}

impl Uart {
    pub const STATUS_TXBL: u32 = 0x1 << 6;
    pub const STATUS_RXDATAV: u32 = 0x1 << 7;
    pub const STATUS_RXFULL: u32 = 0x1 << 8; // Never set, there's only one slot.

    pub const RXDATAX_FERR: u32 = 0x1 << 15;

    pub const IF_RXDATAV: u32 = 0x1 << 2;

    pub const REGION_SIZE: u64 = RegisterFile::<UART_NUM_REGS>::SIZE;

    // Comes out of reset, and attaches itself as the backend's frontend.
    pub fn new(device: Option<Arc<dyn SerialBackend>>, irq: IrqLine) -> Arc<Mutex<Uart>> {
        Arc::new_cyclic(move |weak: &Weak<Mutex<Uart>>| {
            if let Some(device) = &device {
                let frontend: Weak<Mutex<dyn SerialFrontend>> = weak.clone();
                device.set_handlers(frontend);
            }
            let mut uart = Uart{device, irq, regs: RegisterFile::new()};
            uart.reset_regs();
            Mutex::new(uart)
        })
    }

    pub fn is_attached(&self) -> bool {
        self.device.is_some()
    }

    fn reg(&self, reg: UartReg) -> u32 {
        self.regs.get(reg.offset())
    }

    fn reset_regs(&mut self) {
        self.regs.clear();
        self.regs.set_bits(UartReg::Status.offset(), Self::STATUS_TXBL);
    }

    fn rx_valid(&self) -> bool {
        self.regs.is_set(UartReg::Status.offset(), Self::STATUS_RXDATAV)
    }

    fn rxdatax_read(&mut self) -> u32 {
        self.regs.clear_bits(UartReg::Status.offset(), Self::STATUS_RXDATAV);
        self.update_irq();
        self.reg(UartReg::RxDataX)
    }

    fn txdata_write(&mut self, val: u32) {
        let val = val as u8;
        match &self.device {
            Some(device) => device.send(val),
            None => trace!("Uart: no backend, dropping {val:#04x}"),
        }
    }

    // IF.RXDATAV mirrors STATUS.RXDATAV; software can't set or clear it.
    fn update_irq(&mut self) {
        if self.rx_valid() {
            self.regs.set_bits(UartReg::If.offset(), Self::IF_RXDATAV);
        } else {
            self.regs.clear_bits(UartReg::If.offset(), Self::IF_RXDATAV);
        }

        let pending = self.reg(UartReg::If) & self.reg(UartReg::Ien);
        self.irq.set(pending != 0);
    }

    pub fn snapshot(&self) -> UartSnapshot {
        UartSnapshot::new(*self.regs.words())
    }

    pub fn restore(&mut self, snap: &UartSnapshot) {
        self.regs = RegisterFile::from_words(snap.regs);
        self.update_irq();
    }
}

impl SerialFrontend for Uart {
    fn can_receive(&self) -> bool {
        !self.rx_valid()
    }

    fn receive(&mut self, val: u8) {
        if self.rx_valid() {
            error!("Uart: received {val:#04x} with RXDATAX still full, overwriting");
        }
        debug!("Uart: received {val:#04x}");
        self.regs.set_bits(UartReg::Status.offset(), Self::STATUS_RXDATAV);
        self.regs.set(UartReg::RxDataX.offset(), val as u32);
        self.update_irq();
    }

    fn line_break(&mut self) {
        debug!("Uart: break");
        self.regs.set_bits(UartReg::Status.offset(), Self::STATUS_RXDATAV);
        self.regs.set(UartReg::RxDataX.offset(), Self::RXDATAX_FERR);
        self.update_irq();
    }
}

impl MMIOHandler for Uart {
    fn reset(&mut self) {
        self.reset_regs();
        self.update_irq();
    }

    fn region_size(&self) -> u64 {
        Self::REGION_SIZE
    }

    fn irq_level(&self) -> bool {
        self.irq.level()
    }

    fn read(&mut self, offset: u64) -> u32 {
        let val = match UartReg::from_offset(offset) {
            Some(UartReg::Status | UartReg::If | UartReg::Ien) => self.regs.get(offset),
            Some(UartReg::RxDataX) => self.rxdatax_read(),
            _ => {
                self.update_irq();
                0
            }
        };
        trace!("Uart: read {val:#x} from {offset:#x}");
        val
    }

    fn write(&mut self, offset: u64, val: u32) {
        trace!("Uart: write {val:#x} to {offset:#x}");
        match UartReg::from_offset(offset) {
            Some(UartReg::TxData) => self.txdata_write(val),
            Some(UartReg::Ifs) => self.regs.set_bits(UartReg::If.offset(), val),
            Some(UartReg::Ifc) => self.regs.clear_bits(UartReg::If.offset(), val),
            Some(UartReg::Ien) => self.regs.set(offset, val),
            _ => (),
        }
        self.update_irq();
    }
}
