//! Programmable interval timer
//!
//! Counts clock ticks while enabled. When the counter reaches the period
//! stored in the prescaler register it wraps to zero and raises the timer
//! IRQ line once.

use bitflags::bitflags;
use log::debug;

use crate::errors::DeviceError;
use crate::interfaces::IoDevice;
use crate::interrupts::InterruptLine;

pub const COUNTER_PORT: u8 = 0;
pub const CONTROL_PORT: u8 = 1;
pub const PRESCALER_PORT: u8 = 2;
pub const TICK_PORT: u8 = 3;

bitflags! {
    pub struct TimerControl: u8 {
        const ENABLE = 0b0000_0001;
        // self-clearing: resets the counter and never reads back as set
        const RESET = 0b0000_0010;
    }
}

pub struct Timer {
    counter: u8,
    period: u8,
    control: TimerControl,
    irq: Option<InterruptLine>,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            counter: 0,
            period: 0,
            control: TimerControl::empty(),
            irq: None,
        }
    }

    pub fn connect_interrupt(&mut self, line: InterruptLine) {
        self.irq = Some(line);
    }

    pub fn enabled(&self) -> bool {
        self.control.contains(TimerControl::ENABLE)
    }

    pub fn counter(&self) -> u8 {
        self.counter
    }

    fn advance(&mut self) {
        if !self.enabled() || self.period == 0 {
            return;
        }

        self.counter = self.counter.wrapping_add(1);
        if self.counter >= self.period {
            self.counter = 0;
            debug!("Timer period of {} ticks elapsed", self.period);
            if let Some(irq) = &self.irq {
                irq.raise();
            }
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDevice for Timer {
    fn name(&self) -> &'static str {
        "Timer"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        match port {
            COUNTER_PORT => Ok(self.counter),
            CONTROL_PORT => Ok(self.control.bits()),
            PRESCALER_PORT => Ok(self.period),
            _ => Err(DeviceError::NotReadable(port)),
        }
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        match port {
            COUNTER_PORT => self.counter = data,
            CONTROL_PORT => {
                let control = TimerControl::from_bits_truncate(data);
                if control.contains(TimerControl::RESET) {
                    self.counter = 0;
                }
                self.control = control - TimerControl::RESET;
            }
            PRESCALER_PORT => self.period = data,
            TICK_PORT => self.advance(),
            _ => return Err(DeviceError::NotWritable(port)),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.counter = 0;
        self.period = 0;
        self.control = TimerControl::empty();
    }

    fn tick(&mut self) {
        self.advance();
    }
}
