use bytemuck::{Pod, Zeroable, bytes_of, pod_read_unaligned};
use thiserror::Error;

use crate::io::timer::TIMER_NUM_REGS;
use crate::io::uart::UART_NUM_REGS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("{kind} snapshot is {expected} bytes, got {actual}")]
    BadSize {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("SoC snapshot has {actual} timers, expected {expected}")]
    TimerCount { expected: usize, actual: usize },
}

fn check_size<T>(kind: &'static str, bytes: &[u8]) -> Result<(), SnapshotError> {
    let expected = size_of::<T>();
    if bytes.len() != expected {
        return Err(SnapshotError::BadSize{kind, expected, actual: bytes.len()});
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TimerSnapshot {
    pub rate: u32,
    has_deadline: u32,
    deadline: u64,
    pub regs: [u32; TIMER_NUM_REGS],
}

impl TimerSnapshot {
    pub fn new(rate: u32, deadline: Option<u64>, regs: [u32; TIMER_NUM_REGS]) -> Self {
        TimerSnapshot{
            rate,
            has_deadline: deadline.is_some() as u32,
            deadline: deadline.unwrap_or(0),
            regs,
        }
    }

    // Absolute virtual time of the pending deadline.
    pub fn deadline(&self) -> Option<u64> {
        (self.has_deadline != 0).then_some(self.deadline)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytes_of(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        check_size::<Self>("timer", bytes)?;
        Ok(pod_read_unaligned(bytes))
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct UartSnapshot {
    pub regs: [u32; UART_NUM_REGS],
}

impl UartSnapshot {
    pub fn new(regs: [u32; UART_NUM_REGS]) -> Self {
        UartSnapshot{regs}
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytes_of(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        check_size::<Self>("uart", bytes)?;
        Ok(pod_read_unaligned(bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocSnapshot {
    pub now: u64,
    pub timers: Vec<TimerSnapshot>,
    pub uart: UartSnapshot,
}
