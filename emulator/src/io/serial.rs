use std::collections::VecDeque;
use std::sync::{Mutex, Weak};

use log::trace;

// Implemented by the device end of a serial link (the UART). The backend
// only delivers a byte when can_receive() says there is room for it.
pub trait SerialFrontend: Send {
    fn can_receive(&self) -> bool;
    fn receive(&mut self, val: u8);
    fn line_break(&mut self);
}

// The outside world's end of the link.
pub trait SerialBackend: Send + Sync {
    fn send(&self, val: u8);
    fn set_handlers(&self, frontend: Weak<Mutex<dyn SerialFrontend>>);
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialEvent {
    Byte(u8),
    Break,
}

// In-memory backend. Output accumulates until taken; input is queued and
// handed to the frontend by pump().
#[derive(Default)]
pub struct PipeSerial {
    out_buf: Mutex<VecDeque<u8>>,
    in_buf: Mutex<VecDeque<SerialEvent>>,
    frontend: Mutex<Option<Weak<Mutex<dyn SerialFrontend>>>>,
}

impl PipeSerial {
    pub fn take_output(&self) -> VecDeque<u8> {
        std::mem::take(&mut self.out_buf.lock().unwrap())
    }

    pub fn is_out_empty(&self) -> bool {
        self.out_buf.lock().unwrap().is_empty()
    }

    pub fn pop_output(&self) -> Option<u8> {
        self.out_buf.lock().unwrap().pop_front()
    }

    pub fn push_input(&self, val: u8) {
        self.in_buf.lock().unwrap().push_back(SerialEvent::Byte(val));
    }

    pub fn write_input(&self, vals: &[u8]) {
        for val in vals.iter() {
            self.push_input(*val);
        }
    }

    pub fn push_break(&self) {
        self.in_buf.lock().unwrap().push_back(SerialEvent::Break);
    }

    pub fn pending_input(&self) -> usize {
        self.in_buf.lock().unwrap().len()
    }

    pub fn is_attached(&self) -> bool {
        self.frontend()
            .is_some_and(|frontend| frontend.strong_count() > 0)
    }

    fn frontend(&self) -> Option<Weak<Mutex<dyn SerialFrontend>>> {
        self.frontend.lock().unwrap().clone()
    }

    // Delivers queued input in order until the frontend stops accepting
    // bytes. A break is delivered regardless of can_receive(). Returns the
    // number of events delivered.
    pub fn pump(&self) -> usize {
        let Some(frontend) = self.frontend().and_then(|weak| weak.upgrade()) else {
            return 0;
        };
        let mut frontend = frontend.lock().unwrap();

        let mut delivered = 0;
        loop {
            let mut in_buf = self.in_buf.lock().unwrap();
            match in_buf.front().copied() {
                Some(SerialEvent::Byte(val)) if frontend.can_receive() => {
                    in_buf.pop_front();
                    drop(in_buf);
                    trace!("PipeSerial: delivering {val:#04x}");
                    frontend.receive(val);
                }
                Some(SerialEvent::Break) => {
                    in_buf.pop_front();
                    drop(in_buf);
                    trace!("PipeSerial: delivering break");
                    frontend.line_break();
                }
                _ => return delivered,
            }
            delivered += 1;
        }
    }
}

impl SerialBackend for PipeSerial {
    fn send(&self, val: u8) {
        self.out_buf.lock().unwrap().push_back(val);
    }

    fn set_handlers(&self, frontend: Weak<Mutex<dyn SerialFrontend>>) {
        *self.frontend.lock().unwrap() = Some(frontend);
    }
}
