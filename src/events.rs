//! Observer lists
//!
//! Components that used to broadcast their state to a UI expose an explicit
//! `state()` accessor instead, plus an [`Observers`] list to get notified
//! when something changes.

pub type Observer<T> = Box<dyn FnMut(&T)>;

pub struct Observers<T> {
    observers: Vec<Observer<T>>,
}

impl<T> Observers<T> {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&T) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn notify(&mut self, event: &T) {
        for observer in self.observers.iter_mut() {
            observer(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}
