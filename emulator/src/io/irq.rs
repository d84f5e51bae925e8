use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use log::debug;

// The interrupt controller side of a peripheral's IRQ line.
pub trait InterruptSink: Send + Sync {
    fn set_irq(&self, line: u32, level: bool);
}

////////////////////////////////////////////////////////////////////////////////

// Records the current level of every input. Stands in for the NVIC.
#[derive(Default)]
pub struct IrqLevels {
    levels: Mutex<BTreeMap<u32, bool>>,
}

impl IrqLevels {
    pub fn is_raised(&self, line: u32) -> bool {
        self.levels.lock().unwrap().get(&line).copied().unwrap_or(false)
    }

    pub fn raised(&self) -> Vec<u32> {
        self.levels
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(&line, &level)| level.then_some(line))
            .collect()
    }
}

impl InterruptSink for IrqLevels {
    fn set_irq(&self, line: u32, level: bool) {
        self.levels.lock().unwrap().insert(line, level);
    }
}

////////////////////////////////////////////////////////////////////////////////

// A single level-triggered output owned by a peripheral.
pub struct IrqLine {
    sink: Option<Arc<dyn InterruptSink>>,
    line: u32,
    level: bool,
}

impl IrqLine {
    pub fn new(sink: Arc<dyn InterruptSink>, line: u32) -> Self {
        IrqLine{sink: Some(sink), line, level: false}
    }

    pub fn disconnected() -> Self {
        IrqLine{sink: None, line: 0, level: false}
    }

    pub fn level(&self) -> bool {
        self.level
    }

    // The sink is told on every update, not only on edges.
    pub fn set(&mut self, level: bool) {
        if level != self.level {
            debug!("IRQ {}: {}", self.line, if level { "raised" } else { "lowered" });
        }
        self.level = level;
        if let Some(sink) = &self.sink {
            sink.set_irq(self.line, level);
        }
    }
}
