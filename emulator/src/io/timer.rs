use std::sync::{Arc, Mutex, Weak};

use common::constants::{NANOSECONDS_PER_SECOND, TIMER_STRIDE};
use common::mem::RegisterFile;
use common::misc::muldiv64;

use derive_more::IsVariant;
use log::{debug, trace, warn};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::config::ConfigError;
use crate::io::{IrqLine, MMIOHandler};
use crate::scheduler::{DeadlineHandler, DeadlineId, Scheduler};
use crate::snapshot::TimerSnapshot;

#[derive(Debug, Clone, Copy, FromPrimitive, PartialEq, Eq)]
pub enum TimerReg {
    Ctrl = 0x00,
    Cmd = 0x04, // Write only, not stored
    Ien = 0x0c,
    If = 0x10,
    Ifs = 0x14, // Write only
    Ifc = 0x18, // Write only
    Top = 0x1c,
    Cnt = 0x24,
}

impl TimerReg {
    pub const ALL: [TimerReg; 8] = [
        TimerReg::Ctrl,
        TimerReg::Cmd,
        TimerReg::Ien,
        TimerReg::If,
        TimerReg::Ifs,
        TimerReg::Ifc,
        TimerReg::Top,
        TimerReg::Cnt,
    ];

    pub fn from_offset(offset: u64) -> Option<Self> {
        Self::from_u64(offset)
    }

    pub fn offset(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        match self {
            TimerReg::Ctrl => "ctrl",
            TimerReg::Cmd => "cmd",
            TimerReg::Ien => "ien",
            TimerReg::If => "if",
            TimerReg::Ifs => "ifs",
            TimerReg::Ifc => "ifc",
            TimerReg::Top => "top",
            TimerReg::Cnt => "cnt",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|reg| reg.name().eq_ignore_ascii_case(name))
    }
}

pub const TIMER_NUM_REGS: usize = RegisterFile::<0>::offset_to_index(TimerReg::Cnt as u64) + 1;

// CTRL[1:0]. Only up and down are modeled; the other two count down.
#[derive(Debug, Clone, Copy, FromPrimitive, PartialEq, Eq, IsVariant)]
pub enum TimerMode {
    Up = 0,
    Down = 1,
    UpDown = 2,
    QDec = 3,
}

pub struct Timer {
    scheduler: Arc<dyn Scheduler>,
    deadline: DeadlineId,
    irq: IrqLine,
    base_clock: u32,
    rate: u32,
    regs: RegisterFile<TIMER_NUM_REGS>,
}

impl Timer {
    pub const CTRL_MODE_MASK: u32 = 0x3;
    pub const CTRL_OSMEN: u32 = 0x1 << 4;
    pub const CTRL_PRESC_SHIFT: u32 = 24;
    pub const CTRL_PRESC_MASK: u32 = 0xff;

    pub const CMD_START: u32 = 0x1 << 0;
    pub const CMD_STOP: u32 = 0x1 << 1;

    pub const IF_OF: u32 = 0x1 << 0;
    pub const IF_UF: u32 = 0x1 << 1;

    // Registers itself with the scheduler, which is why this hands back the
    // shared handle rather than a bare Timer.
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        irq: IrqLine,
        base_clock: u32,
    ) -> Result<Arc<Mutex<Timer>>, ConfigError> {
        if base_clock == 0 {
            return Err(ConfigError::ZeroBaseClock);
        }

        Ok(Arc::new_cyclic(move |weak: &Weak<Mutex<Timer>>| {
            let handler: Weak<Mutex<dyn DeadlineHandler>> = weak.clone();
            let deadline = scheduler.register(handler);
            Mutex::new(Timer{
                scheduler,
                deadline,
                irq,
                base_clock,
                rate: base_clock,
                regs: RegisterFile::new(),
            })
        }))
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn mode(&self) -> TimerMode {
        TimerMode::from_u32(self.reg(TimerReg::Ctrl) & Self::CTRL_MODE_MASK).unwrap()
    }

    pub fn is_one_shot(&self) -> bool {
        self.regs.is_set(TimerReg::Ctrl.offset(), Self::CTRL_OSMEN)
    }

    // Absolute virtual time at which the pending deadline fires, if any.
    pub fn pending_deadline(&self) -> Option<u64> {
        self.scheduler.deadline(self.deadline)
    }

    pub fn is_running(&self) -> bool {
        self.pending_deadline().is_some()
    }

    // Derived from virtual time rather than kept as a running total.
    pub fn count(&self) -> u32 {
        self.ns_to_ticks(self.scheduler.now()) as u32
    }

    pub fn ticks_to_ns(&self, ticks: u64) -> u64 {
        muldiv64(ticks, NANOSECONDS_PER_SECOND, self.rate as u64)
    }

    pub fn ns_to_ticks(&self, ns: u64) -> u64 {
        muldiv64(ns, self.rate as u64, NANOSECONDS_PER_SECOND)
    }

    fn reg(&self, reg: TimerReg) -> u32 {
        self.regs.get(reg.offset())
    }

    // base_clock / 2^prescaler. A prescaler that divides the clock down to
    // nothing saturates at 1 Hz.
    fn prescaled_rate(&self, ctrl: u32) -> u32 {
        let presc = (ctrl >> Self::CTRL_PRESC_SHIFT) & Self::CTRL_PRESC_MASK;
        let rate = self.base_clock.checked_shr(presc).unwrap_or(0);
        if rate == 0 {
            warn!(
                "Timer: prescaler 2^{presc} on a {} Hz clock gives no ticks, using 1 Hz",
                self.base_clock
            );
            return 1;
        }
        rate
    }

    fn arm(&mut self, ticks: u64) {
        let now = self.scheduler.now();
        let at = now.saturating_add(self.ticks_to_ns(ticks));
        debug!("Timer: expiring in {ticks} ticks at {} Hz ({at}ns)", self.rate);
        self.scheduler.schedule(self.deadline, at);
    }

    fn remaining_ticks(&self) -> Option<u64> {
        let now = self.scheduler.now();
        self.pending_deadline()
            .map(|at| self.ns_to_ticks(at.saturating_sub(now)))
    }

    fn ctrl_write(&mut self, val: u32) {
        // A pending deadline keeps its remaining tick count across a rate
        // change.
        let remaining = self.remaining_ticks();
        self.regs.set(TimerReg::Ctrl.offset(), val);
        self.rate = self.prescaled_rate(val);
        if let Some(ticks) = remaining {
            self.arm(ticks);
        }
    }

    fn start(&mut self) {
        let base = if self.is_one_shot() {
            self.reg(TimerReg::Cnt)
        } else {
            self.reg(TimerReg::Top)
        };
        let expiry = if self.mode().is_up() {
            u32::MAX - base
        } else {
            base
        };
        self.arm(expiry as u64);
    }

    fn cmd_write(&mut self, val: u32) {
        if val & Self::CMD_START != 0 {
            self.start();
        } else if val & Self::CMD_STOP != 0 {
            debug!("Timer: stopped");
            self.scheduler.cancel(self.deadline);
        }
    }

    // A running periodic timer restarts its count from the new TOP. One-shot
    // counts come from CNT, so they keep their deadline.
    fn top_write(&mut self, val: u32) {
        self.regs.set(TimerReg::Top.offset(), val);
        if self.is_running() && !self.is_one_shot() {
            self.start();
        }
    }

    fn ifc_write(&mut self, val: u32) {
        self.regs.clear_bits(TimerReg::If.offset(), val);

        // Acknowledging the flag reloads a periodic timer.
        if !self.is_one_shot() {
            self.arm(self.reg(TimerReg::Top) as u64);
        }
    }

    fn update_irq(&mut self) {
        let pending = self.reg(TimerReg::If) & self.reg(TimerReg::Ien);
        self.irq.set(pending != 0);
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::new(self.rate, self.pending_deadline(), *self.regs.words())
    }

    pub fn restore(&mut self, snap: &TimerSnapshot) {
        self.rate = snap.rate.max(1);
        self.regs = RegisterFile::from_words(snap.regs);
        match snap.deadline() {
            Some(at) => self.scheduler.schedule(self.deadline, at),
            None => self.scheduler.cancel(self.deadline),
        }
        self.update_irq();
    }
}

impl DeadlineHandler for Timer {
    fn deadline_expired(&mut self) {
        let flag = if self.mode().is_up() {
            Self::IF_OF
        } else {
            Self::IF_UF
        };
        debug!("Timer: expired, setting IF {flag:#x}");
        self.regs.set_bits(TimerReg::If.offset(), flag);
        self.update_irq();
    }
}

impl MMIOHandler for Timer {
    fn reset(&mut self) {
        self.regs.clear();
        self.rate = self.base_clock;
        self.scheduler.cancel(self.deadline);
        self.update_irq();
    }

    fn region_size(&self) -> u64 {
        TIMER_STRIDE
    }

    fn irq_level(&self) -> bool {
        self.irq.level()
    }

    fn read(&mut self, offset: u64) -> u32 {
        let val = match TimerReg::from_offset(offset) {
            Some(TimerReg::Ctrl | TimerReg::Ien | TimerReg::If | TimerReg::Top) => {
                self.regs.get(offset)
            }
            Some(TimerReg::Cnt) => self.count(),
            _ => 0,
        };
        trace!("Timer: read {val:#x} from {offset:#x}");
        val
    }

    fn write(&mut self, offset: u64, val: u32) {
        trace!("Timer: write {val:#x} to {offset:#x}");
        match TimerReg::from_offset(offset) {
            Some(TimerReg::Ctrl) => self.ctrl_write(val),
            Some(TimerReg::Cmd) => self.cmd_write(val),
            Some(TimerReg::Ifs) => self.regs.set_bits(TimerReg::If.offset(), val),
            Some(TimerReg::Ifc) => self.ifc_write(val),
            Some(TimerReg::Top) => self.top_write(val),
            Some(TimerReg::Ien | TimerReg::Cnt) => self.regs.set(offset, val),
            // IF is read only.
            Some(TimerReg::If) | None => (),
        }
        self.update_irq();
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.scheduler.unregister(self.deadline);
    }
}
