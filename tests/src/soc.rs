use common::constants::{TIMER_IRQS, UART0_RX_IRQ};
use emu_lib::io::serial::{PipeSerial, SerialBackend};
use emu_lib::io::timer::Timer;
use emu_lib::{MMIOHandler, Soc, SocConfig};

use std::sync::Arc;

fn soc() -> (Arc<PipeSerial>, Soc) {
    let serial = Arc::new(PipeSerial::default());
    let backend: Arc<dyn SerialBackend> = serial.clone();
    let soc = Soc::new(&SocConfig::default(), Some(backend)).unwrap();
    (serial, soc)
}

fn addr(soc: &Soc, name: &str) -> u64 {
    soc.symbol(name).unwrap()
}

// Count down from `top` ticks of the default 48 MHz clock.
fn start_down(soc: &mut Soc, timer: usize, top: u32) {
    let w = |soc: &mut Soc, reg: &str, val: u32| {
        let addr = addr(soc, &format!("timer{timer}.{reg}"));
        soc.write_word(addr, val);
    };
    w(soc, "ctrl", 0x1);
    w(soc, "top", top);
    w(soc, "ien", Timer::IF_UF);
    w(soc, "cmd", Timer::CMD_START);
}

#[test]
fn timer_irq_wiring() {
    for (idx, &line) in TIMER_IRQS.iter().enumerate() {
        let (_serial, mut soc) = soc();
        start_down(&mut soc, idx, 48);
        assert_eq!(soc.next_deadline(), Some(1_000));

        soc.advance(1_000);
        assert!(soc.irq_level(line));
        assert_eq!(soc.raised_irqs(), vec![line]);
        assert!(soc.timer(idx).unwrap().lock().unwrap().irq_level());
    }
}

#[test]
fn uart_irq_wiring() {
    let (serial, mut soc) = soc();
    soc.write_word(addr(&soc, "uart.ien"), 0x4);
    serial.push_input(b'q');
    serial.pump();
    assert_eq!(soc.raised_irqs(), vec![UART0_RX_IRQ]);

    assert_eq!(soc.read_word(addr(&soc, "uart.rxdatax")), b'q' as u32);
    assert!(!soc.irq_level(UART0_RX_IRQ));
}

#[test]
fn timers_fire_in_time_order() {
    let (_serial, mut soc) = soc();
    start_down(&mut soc, 0, 4800);
    start_down(&mut soc, 1, 480);

    soc.advance(50_000);
    assert_eq!(soc.raised_irqs(), vec![TIMER_IRQS[1]]);
    assert_eq!(soc.next_deadline(), Some(100_000));

    soc.advance(50_000);
    assert_eq!(soc.raised_irqs(), vec![TIMER_IRQS[0], TIMER_IRQS[1]]);
    assert_eq!(soc.now(), 100_000);
}

#[test]
fn routes_by_address() {
    let (serial, mut soc) = soc();
    soc.write_word(0x4000_e434, 0x21);
    assert_eq!(serial.take_output(), [0x21]);

    soc.write_word(0x4001_041c, 0x1234);
    assert_eq!(soc.read_word(0x4001_041c), 0x1234);
    assert_eq!(soc.read_word(0x4001_001c), 0);
    assert_eq!(soc.read_word(0x4001_081c), 0);
}

#[test]
fn reset_clears_everything() {
    let (serial, mut soc) = soc();
    start_down(&mut soc, 2, 10);
    soc.write_word(addr(&soc, "uart.ien"), 0x4);
    serial.push_input(0);
    serial.pump();
    soc.advance(1_000_000);
    assert_eq!(soc.raised_irqs().len(), 2);

    soc.reset();
    assert!(soc.raised_irqs().is_empty());
    assert_eq!(soc.next_deadline(), None);
    assert_eq!(soc.read_word(addr(&soc, "uart.status")), 0x40);

    let once = soc.snapshot();
    soc.reset();
    assert_eq!(soc.snapshot(), once);
}
