//! Frequency driven tick source
//!
//! The clock runs on its own ticker thread and only produces tick numbers:
//! whoever owns the machine consumes them and turns each one into a machine
//! turn, so ticks never overlap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use log::{debug, error, info};

type Subscribers = Arc<Mutex<Vec<Sender<u64>>>>;

struct Ticker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct Clock {
    frequency: u32,
    cycles: Arc<AtomicU64>,
    subscribers: Subscribers,
    ticker: Option<Ticker>,
}

impl Clock {
    pub fn new(frequency: u32) -> Self {
        Self {
            frequency,
            cycles: Arc::new(AtomicU64::new(0)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            ticker: None,
        }
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Change the tick rate. A running clock keeps its old rate until
    /// [`Clock::restart`].
    pub fn set_frequency(&mut self, frequency: u32) {
        debug!("Clock frequency set to {frequency} Hz");
        self.frequency = frequency;
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Ticks emitted since creation
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Receive the cycle number of every tick emitted from now on
    pub fn subscribe(&self) -> Receiver<u64> {
        let (sender, receiver) = unbounded();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(sender),
            Err(poisoned) => poisoned.into_inner().push(sender),
        }
        receiver
    }

    /// Start ticking: one tick right away, then one every period. Does
    /// nothing if the clock is already running or stopped at 0 Hz.
    pub fn start(&mut self) {
        if self.ticker.is_some() || self.frequency == 0 {
            return;
        }

        let period = Self::period(self.frequency);
        let cycles = Arc::clone(&self.cycles);
        let subscribers = Arc::clone(&self.subscribers);
        let (stop, stopped) = bounded::<()>(0);

        let handle = thread::spawn(move || {
            let ticker = tick(period);
            emit(&cycles, &subscribers);

            loop {
                select! {
                    recv(stopped) -> _ => break,
                    recv(ticker) -> _ => emit(&cycles, &subscribers),
                }
            }
        });

        info!("Clock started at {} Hz ({period:?} per tick)", self.frequency);
        self.ticker = Some(Ticker { stop, handle });
    }

    /// Stop ticking. Once this returns no further tick is emitted.
    pub fn stop(&mut self) {
        let Some(ticker) = self.ticker.take() else {
            return;
        };

        // disconnecting the stop channel wakes the ticker thread
        drop(ticker.stop);
        if ticker.handle.join().is_err() {
            error!("Clock ticker thread panicked");
        }
        info!("Clock stopped after {} cycles", self.cycles());
    }

    pub fn restart(&mut self) {
        self.stop();
        self.start();
    }

    fn period(frequency: u32) -> Duration {
        Duration::from_micros(1_000_000 / frequency as u64)
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

fn emit(cycles: &AtomicU64, subscribers: &Mutex<Vec<Sender<u64>>>) {
    let cycle = cycles.fetch_add(1, Ordering::SeqCst) + 1;
    let mut subscribers = match subscribers.lock() {
        Ok(subscribers) => subscribers,
        Err(poisoned) => poisoned.into_inner(),
    };
    subscribers.retain(|subscriber| subscriber.send(cycle).is_ok());
}
