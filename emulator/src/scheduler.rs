use std::sync::{Mutex, Weak};

use log::{debug, trace};

pub type DeadlineId = usize;

// Whoever owns a deadline gets called back through this when it expires.
pub trait DeadlineHandler: Send {
    fn deadline_expired(&mut self);
}

pub trait Scheduler: Send + Sync {
    // Virtual time in ns.
    fn now(&self) -> u64;

    fn register(&self, handler: Weak<Mutex<dyn DeadlineHandler>>) -> DeadlineId;

    // Cancels and hands the id back for a later register() to reuse. The
    // owner must not use the id afterwards.
    fn unregister(&self, id: DeadlineId);

    // Replaces any pending deadline for id.
    fn schedule(&self, id: DeadlineId, at: u64);
    fn cancel(&self, id: DeadlineId);
    fn deadline(&self, id: DeadlineId) -> Option<u64>;
}

////////////////////////////////////////////////////////////////////////////////

struct Slot {
    handler: Weak<Mutex<dyn DeadlineHandler>>,
    expires: Option<u64>,
}

#[derive(Default)]
struct ClockState {
    now: u64,
    slots: Vec<Slot>,
    free: Vec<DeadlineId>,
}

impl ClockState {
    // Earliest deadline at or before target. Ties go to the lowest id.
    fn next_expiring(&self, target: u64) -> Option<(DeadlineId, u64)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.expires.map(|at| (id, at)))
            .filter(|&(_, at)| at <= target)
            .min_by_key(|&(id, at)| (at, id))
    }
}

// Deterministic virtual clock. Time only moves when the host calls advance().
#[derive(Default)]
pub struct VirtualClock {
    state: Mutex<ClockState>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn advance(&self, delta: u64) {
        let target = self.now().saturating_add(delta);
        self.advance_to(target);
    }

    // Fires every deadline up to and including target, in time order, with
    // now() reading the deadline's own time during each callback. The lock
    // is released before calling out so handlers can reschedule.
    pub fn advance_to(&self, target: u64) {
        loop {
            let handler = {
                let mut state = self.state.lock().unwrap();
                let Some((id, at)) = state.next_expiring(target) else {
                    state.now = state.now.max(target);
                    return;
                };
                state.now = state.now.max(at);
                state.slots[id].expires = None;
                debug!("VirtualClock: deadline {id} expired at {at}ns");
                state.slots[id].handler.clone()
            };

            if let Some(handler) = handler.upgrade() {
                handler.lock().unwrap().deadline_expired();
            }
        }
    }

    // Moves time without firing anything. Only for restoring a snapshot.
    pub fn set_now(&self, now: u64) {
        self.state.lock().unwrap().now = now;
    }

    pub fn next_deadline(&self) -> Option<u64> {
        let state = self.state.lock().unwrap();
        state.slots.iter().filter_map(|slot| slot.expires).min()
    }

    pub fn pending(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.slots.iter().filter(|slot| slot.expires.is_some()).count()
    }
}

impl Scheduler for VirtualClock {
    fn now(&self) -> u64 {
        self.state.lock().unwrap().now
    }

    fn register(&self, handler: Weak<Mutex<dyn DeadlineHandler>>) -> DeadlineId {
        let mut state = self.state.lock().unwrap();
        if let Some(id) = state.free.pop() {
            state.slots[id] = Slot{handler, expires: None};
            return id;
        }
        state.slots.push(Slot{handler, expires: None});
        state.slots.len() - 1
    }

    fn unregister(&self, id: DeadlineId) {
        let mut state = self.state.lock().unwrap();
        assert!(!state.free.contains(&id), "Deadline {id} released twice");
        state.slots[id].expires = None;
        state.free.push(id);
    }

    fn schedule(&self, id: DeadlineId, at: u64) {
        let mut state = self.state.lock().unwrap();
        trace!("VirtualClock: deadline {id} armed for {at}ns");
        state.slots[id].expires = Some(at);
    }

    fn cancel(&self, id: DeadlineId) {
        let mut state = self.state.lock().unwrap();
        if state.slots[id].expires.take().is_some() {
            trace!("VirtualClock: deadline {id} cancelled");
        }
    }

    fn deadline(&self, id: DeadlineId) -> Option<u64> {
        self.state.lock().unwrap().slots[id].expires
    }
}
