pub const WORD_SIZE: u64 = 4; // Bytes

// Virtual time is kept in nanoseconds.
pub const NANOSECONDS_PER_SECOND: u64 = 1_000_000_000;

// High frequency peripheral clock feeding the timers.
pub const HFPERCLK_RATE: u32 = 48_000_000;

pub const UART0_BASE: u64 = 0x4000_e400;
pub const UART0_RX_IRQ: u32 = 22;

pub const TIMER_BASE: u64 = 0x4001_0000;
pub const TIMER_STRIDE: u64 = 0x400;
pub const NUM_TIMERS: usize = 4;
pub const TIMER_IRQS: [u32; NUM_TIMERS] = [2, 12, 13, 14];
