pub mod irq;
pub mod serial;
pub mod timer;
pub mod uart;

pub use irq::{InterruptSink, IrqLevels, IrqLine};

// A device on the peripheral bus. Offsets are relative to the device's base
// address and all accesses are 32 bits wide.
pub trait MMIOHandler: Send {
    fn reset(&mut self) {}
    fn region_size(&self) -> u64;
    fn irq_level(&self) -> bool;

    fn read(&mut self, offset: u64) -> u32;
    fn write(&mut self, offset: u64, val: u32);
}
