use emu_lib::MMIOHandler;
use emu_lib::io::serial::{PipeSerial, SerialBackend, SerialFrontend};
use emu_lib::io::uart::{Uart, UartReg};
use emu_lib::io::{IrqLevels, IrqLine};

use std::sync::{Arc, Mutex};

const IRQ: u32 = 22;

fn uart() -> (Arc<PipeSerial>, Arc<IrqLevels>, Arc<Mutex<Uart>>) {
    let serial = Arc::new(PipeSerial::default());
    let irqs = Arc::new(IrqLevels::default());
    let backend: Arc<dyn SerialBackend> = serial.clone();
    let uart = Uart::new(Some(backend), IrqLine::new(irqs.clone(), IRQ));
    (serial, irqs, uart)
}

fn write(uart: &Arc<Mutex<Uart>>, reg: UartReg, val: u32) {
    uart.lock().unwrap().write(reg.offset(), val);
}

fn read(uart: &Arc<Mutex<Uart>>, reg: UartReg) -> u32 {
    uart.lock().unwrap().read(reg.offset())
}

#[test]
fn transmit() {
    let (serial, _irqs, uart) = uart();
    write(&uart, UartReg::TxData, 0x41);
    assert_eq!(serial.take_output(), [0x41]);
    assert!(serial.is_out_empty());
    assert_eq!(read(&uart, UartReg::Status), Uart::STATUS_TXBL);
}

#[test]
fn transmit_without_backend() {
    let uart = Uart::new(None, IrqLine::disconnected());
    write(&uart, UartReg::TxData, 0x41);
    assert_eq!(read(&uart, UartReg::Status), Uart::STATUS_TXBL);
    assert!(!uart.lock().unwrap().is_attached());
}

#[test]
fn receive_and_read() {
    let (serial, _irqs, uart) = uart();
    serial.push_input(0x7a);
    assert_eq!(serial.pump(), 1);

    assert_eq!(read(&uart, UartReg::Status), Uart::STATUS_TXBL | Uart::STATUS_RXDATAV);
    assert_eq!(read(&uart, UartReg::RxDataX), 0x7a);
    assert_eq!(read(&uart, UartReg::Status), Uart::STATUS_TXBL);

    // The slot keeps its last value.
    assert_eq!(read(&uart, UartReg::RxDataX), 0x7a);
    assert_eq!(read(&uart, UartReg::Status), Uart::STATUS_TXBL);
}

#[test]
fn single_slot_gates_delivery() {
    let (serial, _irqs, uart) = uart();
    serial.write_input(b"xy");
    assert_eq!(serial.pump(), 1);
    assert!(!uart.lock().unwrap().can_receive());
    assert_eq!(serial.pending_input(), 1);

    assert_eq!(serial.pump(), 0);
    assert_eq!(read(&uart, UartReg::RxDataX), b'x' as u32);
    assert!(uart.lock().unwrap().can_receive());

    assert_eq!(serial.pump(), 1);
    assert_eq!(read(&uart, UartReg::RxDataX), b'y' as u32);
    assert_eq!(serial.pending_input(), 0);
}

#[test]
fn line_break() {
    let (serial, _irqs, uart) = uart();
    serial.push_break();
    assert_eq!(serial.pump(), 1);
    assert_eq!(read(&uart, UartReg::Status) & Uart::STATUS_RXDATAV, Uart::STATUS_RXDATAV);
    assert_eq!(read(&uart, UartReg::RxDataX), Uart::RXDATAX_FERR);
}

#[test]
fn receive_irq() {
    let (serial, irqs, uart) = uart();
    write(&uart, UartReg::Ien, Uart::IF_RXDATAV);
    assert!(!irqs.is_raised(IRQ));

    serial.push_input(b'!');
    serial.pump();
    assert!(irqs.is_raised(IRQ));
    assert_eq!(read(&uart, UartReg::If), Uart::IF_RXDATAV);

    // The flag follows STATUS, not software.
    write(&uart, UartReg::Ifc, Uart::IF_RXDATAV);
    assert_eq!(read(&uart, UartReg::If), Uart::IF_RXDATAV);
    assert!(irqs.is_raised(IRQ));

    read(&uart, UartReg::RxDataX);
    assert_eq!(read(&uart, UartReg::If), 0);
    assert!(!irqs.is_raised(IRQ));

    write(&uart, UartReg::Ifs, Uart::IF_RXDATAV);
    assert_eq!(read(&uart, UartReg::If), 0);
}

#[test]
fn other_flags_are_software_driven() {
    let (_serial, irqs, uart) = uart();
    write(&uart, UartReg::Ien, 0x1);
    write(&uart, UartReg::Ifs, 0x1);
    assert!(irqs.is_raised(IRQ));
    write(&uart, UartReg::Ifc, 0x1);
    assert!(!irqs.is_raised(IRQ));
}

#[test]
fn ignored_registers() {
    let (_serial, _irqs, uart) = uart();
    write(&uart, UartReg::Cmd, 0xffff_ffff);
    write(&uart, UartReg::Status, 0);
    uart.lock().unwrap().write(0x20, 0x1234);
    assert_eq!(read(&uart, UartReg::Status), Uart::STATUS_TXBL);
    assert_eq!(read(&uart, UartReg::Cmd), 0);
    assert_eq!(uart.lock().unwrap().read(0x20), 0);
}

#[test]
fn reset_is_idempotent() {
    let (serial, irqs, uart) = uart();
    write(&uart, UartReg::Ien, Uart::IF_RXDATAV);
    serial.push_input(1);
    serial.pump();
    assert!(irqs.is_raised(IRQ));

    uart.lock().unwrap().reset();
    let once = uart.lock().unwrap().snapshot();
    uart.lock().unwrap().reset();
    let twice = uart.lock().unwrap().snapshot();

    assert_eq!(once, twice);
    assert_eq!(read(&uart, UartReg::Status), Uart::STATUS_TXBL);
    assert!(!irqs.is_raised(IRQ));
    assert!(uart.lock().unwrap().can_receive());
}
