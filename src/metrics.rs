//! Execution metrics gathered by the runtime
//!

use std::time::Duration;
use std::time::Instant;

use log::debug;

#[derive(Debug)]
struct RawMetrics {
    record_start: Instant,
    ticks: u64,
    instructions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub recorded_time: Duration,
    pub ticks_per_second: u64,
    pub instructions_per_second: u64,
}

pub struct Collector {
    collecting: RawMetrics,
}

impl Collector {
    pub fn new() -> Self {
        Self {
            collecting: RawMetrics {
                record_start: Instant::now(),
                ticks: 0,
                instructions: 0,
            },
        }
    }

    /// Metrics since the previous collection. Starts a new recording.
    pub fn collect(&mut self) -> Metrics {
        debug!("Raw metrics: {:?}", self.collecting);
        let recorded_time = Instant::now() - self.collecting.record_start;
        let micros = recorded_time.as_micros().max(1);
        let per_second = |count: u64| (count as u128 * 1_000_000 / micros) as u64;

        let metrics = Metrics {
            recorded_time,
            ticks_per_second: per_second(self.collecting.ticks),
            instructions_per_second: per_second(self.collecting.instructions),
        };

        self.collecting.record_start = Instant::now();
        self.collecting.ticks = 0;
        self.collecting.instructions = 0;

        metrics
    }

    /// Record one machine tick that ran `instructions` CPU steps
    pub fn observe_tick(&mut self, instructions: u64) {
        self.collecting.ticks += 1;
        self.collecting.instructions += instructions;
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_collect_resets_counters() {
        let mut collector = Collector::new();
        collector.observe_tick(3);
        collector.observe_tick(2);
        thread::sleep(Duration::from_millis(10));

        let metrics = collector.collect();
        assert!(metrics.recorded_time >= Duration::from_millis(10));
        assert!(metrics.instructions_per_second > 0);
        assert!(metrics.instructions_per_second <= 500);
        assert!(metrics.ticks_per_second <= 200);

        let metrics = collector.collect();
        assert_eq!(metrics.ticks_per_second, 0);
        assert_eq!(metrics.instructions_per_second, 0);
    }
}
