//! Diagnostics sink
//!
//! Every non-fatal machine fault ends up here. The sink is a cheap,
//! cloneable handle shared by the bus, the devices manager, the DMA engine
//! and the CPU.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::warn;

use crate::errors::MachineError;
use crate::events::Observers;

pub const DIAGNOSTICS_HISTORY: usize = 256;

#[derive(Clone, Default)]
pub struct Diagnostics {
    inner: Rc<RefCell<Inner>>,
}

#[derive(Default)]
struct Inner {
    history: VecDeque<MachineError>,
    reported: usize,
    observers: Observers<MachineError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, error: MachineError) {
        warn!("{error}");

        let mut observers = {
            let mut inner = self.inner.borrow_mut();
            if inner.history.len() == DIAGNOSTICS_HISTORY {
                inner.history.pop_front();
            }
            inner.history.push_back(error.clone());
            inner.reported += 1;
            std::mem::take(&mut inner.observers)
        };

        // observers may query the sink while being notified
        observers.notify(&error);
        self.inner.borrow_mut().observers = observers;
    }

    /// Total number of diagnostics reported since creation or last `clear`
    pub fn count(&self) -> usize {
        self.inner.borrow().reported
    }

    pub fn last(&self) -> Option<MachineError> {
        self.inner.borrow().history.back().cloned()
    }

    /// Most recent diagnostics, oldest first
    pub fn history(&self) -> Vec<MachineError> {
        self.inner.borrow().history.iter().cloned().collect()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.history.clear();
        inner.reported = 0;
    }

    pub fn subscribe(&self, observer: impl FnMut(&MachineError) + 'static) {
        self.inner.borrow_mut().observers.subscribe(observer);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_diagnostics_history_is_bounded() {
        let diagnostics = Diagnostics::new();

        for address in 0..(DIAGNOSTICS_HISTORY as u16 + 10) {
            diagnostics.report(MachineError::InvalidInterruptReturn { address });
        }

        assert_eq!(diagnostics.count(), DIAGNOSTICS_HISTORY + 10);
        let history = diagnostics.history();
        assert_eq!(history.len(), DIAGNOSTICS_HISTORY);
        assert_eq!(
            history[0],
            MachineError::InvalidInterruptReturn { address: 10 }
        );
    }

    #[test]
    fn test_diagnostics_shared_between_clones() {
        let diagnostics = Diagnostics::new();
        let seen = Rc::new(Cell::new(0));
        let seen_ptr = Rc::clone(&seen);
        diagnostics.subscribe(move |_| seen_ptr.set(seen_ptr.get() + 1));

        let clone = diagnostics.clone();
        clone.report(MachineError::WriteToReadOnly {
            address: 0xC000,
            data: 1,
        });

        assert_eq!(diagnostics.count(), 1);
        assert_eq!(seen.get(), 1);
        assert!(matches!(
            diagnostics.last(),
            Some(MachineError::WriteToReadOnly { .. })
        ));

        diagnostics.clear();
        assert_eq!(clone.count(), 0);
        assert_eq!(clone.last(), None);
    }
}
