use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use common::constants::*;
use common::misc::IsWordAligned;

use delegate::delegate;
use log::{debug, trace, warn};

use crate::config::{ConfigError, SocConfig};
use crate::io::serial::SerialBackend;
use crate::io::timer::{Timer, TimerReg};
use crate::io::uart::{Uart, UartReg};
use crate::io::{IrqLevels, IrqLine, MMIOHandler};
use crate::scheduler::{Scheduler, VirtualClock};
use crate::snapshot::{SnapshotError, SocSnapshot};

struct Region {
    size: u64,
    handler: Arc<Mutex<dyn MMIOHandler>>,
}

// The EFM32GG peripheral bus: one UART and up to four timers, each wired to
// its NVIC input, all sharing one virtual clock.
pub struct Soc {
    clock: Arc<VirtualClock>,
    irqs: Arc<IrqLevels>,
    mmio_handlers: BTreeMap<u64, Region>,
    timers: Vec<Arc<Mutex<Timer>>>,
    uart: Arc<Mutex<Uart>>,
}

impl Soc {
    pub fn new(
        config: &SocConfig,
        serial: Option<Arc<dyn SerialBackend>>,
    ) -> Result<Soc, ConfigError> {
        config.validate()?;

        let clock = Arc::new(VirtualClock::new());
        let irqs = Arc::new(IrqLevels::default());

        let uart = Uart::new(serial, IrqLine::new(irqs.clone(), UART0_RX_IRQ));
        let mut timers = Vec::with_capacity(config.num_timers);
        for &line in TIMER_IRQS.iter().take(config.num_timers) {
            let irq = IrqLine::new(irqs.clone(), line);
            timers.push(Timer::new(clock.clone(), irq, config.base_clock)?);
        }

        let mut soc = Soc{
            clock,
            irqs,
            mmio_handlers: BTreeMap::new(),
            timers: Vec::new(),
            uart: uart.clone(),
        };

        debug!("Soc: uart0 at {UART0_BASE:#x}, IRQ {UART0_RX_IRQ}");
        soc.register_handler(UART0_BASE, uart);
        for (i, timer) in timers.iter().enumerate() {
            let base = Self::timer_base(i);
            debug!("Soc: timer{i} at {base:#x}, IRQ {}", TIMER_IRQS[i]);
            soc.register_handler(base, timer.clone());
        }
        soc.timers = timers;

        Ok(soc)
    }

    pub fn timer_base(idx: usize) -> u64 {
        TIMER_BASE + (idx as u64) * TIMER_STRIDE
    }

    fn register_handler(&mut self, base: u64, handler: Arc<Mutex<dyn MMIOHandler>>) {
        assert!(base.is_word_aligned(), "MMIOHandler base {base:#x} not aligned");
        let size = handler.lock().unwrap().region_size();
        let end = base + size;

        if let Some((&prev_base, prev)) = self.mmio_handlers.range(..base).next_back() {
            assert!(prev_base + prev.size <= base, "MMIOHandler at {base:#x} overlaps {prev_base:#x}");
        }
        if let Some((&next_base, _)) = self.mmio_handlers.range(base..).next() {
            assert!(end <= next_base, "MMIOHandler at {base:#x} overlaps {next_base:#x}");
        }

        self.mmio_handlers.insert(base, Region{size, handler});
    }

    // Handler and offset within it for a bus address.
    fn lookup(&self, addr: u64) -> Option<(&Arc<Mutex<dyn MMIOHandler>>, u64)> {
        let (&base, region) = self.mmio_handlers.range(..=addr).next_back()?;
        let offset = addr - base;
        (offset < region.size).then_some((&region.handler, offset))
    }

    delegate! {
        to self.clock {
            pub fn now(&self) -> u64;
            pub fn advance(&self, delta: u64);
            pub fn advance_to(&self, target: u64);
            pub fn next_deadline(&self) -> Option<u64>;
        }

        to self.irqs {
            #[call(is_raised)]
            pub fn irq_level(&self, line: u32) -> bool;
            #[call(raised)]
            pub fn raised_irqs(&self) -> Vec<u32>;
        }
    }

    pub fn num_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn timer(&self, idx: usize) -> Option<&Arc<Mutex<Timer>>> {
        self.timers.get(idx)
    }

    pub fn uart(&self) -> &Arc<Mutex<Uart>> {
        &self.uart
    }

    pub fn reset(&mut self) {
        debug!("Soc: reset");
        for region in self.mmio_handlers.values() {
            region.handler.lock().unwrap().reset();
        }
    }

    ///////////////////////////////////////////////////////////////////////////

    pub fn read_word(&mut self, addr: u64) -> u32 {
        if !addr.is_word_aligned() {
            warn!("Soc: misaligned read of {addr:#x}");
            return 0;
        }
        let Some((handler, offset)) = self.lookup(addr) else {
            warn!("Soc: read of unmapped address {addr:#x}");
            return 0;
        };
        let val = handler.lock().unwrap().read(offset);
        trace!("Soc: read {val:#x} from {addr:#x}");
        val
    }

    pub fn write_word(&mut self, addr: u64, val: u32) {
        if !addr.is_word_aligned() {
            warn!("Soc: misaligned write of {val:#x} to {addr:#x}");
            return;
        }
        let Some((handler, offset)) = self.lookup(addr) else {
            warn!("Soc: write of {val:#x} to unmapped address {addr:#x}");
            return;
        };
        trace!("Soc: write {val:#x} to {addr:#x}");
        handler.lock().unwrap().write(offset, val);
    }

    ///////////////////////////////////////////////////////////////////////////

    // "timer2.ctrl", "uart.rxdatax", or a bare "timer1". Case insensitive.
    pub fn symbol(&self, name: &str) -> Option<u64> {
        let name = name.to_ascii_lowercase();
        let (dev, reg) = match name.split_once('.') {
            Some((dev, reg)) => (dev, Some(reg)),
            None => (name.as_str(), None),
        };

        if dev == "uart" || dev == "uart0" {
            let offset = match reg {
                Some(reg) => UartReg::from_name(reg)?.offset(),
                None => 0,
            };
            return Some(UART0_BASE + offset);
        }

        let idx: usize = dev.strip_prefix("timer")?.parse().ok()?;
        if idx >= self.timers.len() {
            return None;
        }
        let offset = match reg {
            Some(reg) => TimerReg::from_name(reg)?.offset(),
            None => 0,
        };
        Some(Self::timer_base(idx) + offset)
    }

    ///////////////////////////////////////////////////////////////////////////

    pub fn snapshot(&self) -> SocSnapshot {
        SocSnapshot{
            now: self.clock.now(),
            timers: self.timers.iter().map(|t| t.lock().unwrap().snapshot()).collect(),
            uart: self.uart.lock().unwrap().snapshot(),
        }
    }

    pub fn restore(&mut self, snap: &SocSnapshot) -> Result<(), SnapshotError> {
        if snap.timers.len() != self.timers.len() {
            return Err(SnapshotError::TimerCount{
                expected: self.timers.len(),
                actual: snap.timers.len(),
            });
        }

        self.clock.set_now(snap.now);
        for (timer, timer_snap) in self.timers.iter().zip(&snap.timers) {
            timer.lock().unwrap().restore(timer_snap);
        }
        self.uart.lock().unwrap().restore(&snap.uart);
        Ok(())
    }
}
