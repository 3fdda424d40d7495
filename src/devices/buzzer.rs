use log::debug;

use crate::errors::DeviceError;
use crate::interfaces::IoDevice;

pub const TONE_PORT: u8 = 0;
pub const DURATION_PORT: u8 = 1;
pub const CONTROL_PORT: u8 = 2;

pub const HZ_PER_TONE_STEP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuzzerState {
    pub playing: bool,
    pub frequency: u32,
    pub remaining_ticks: u8,
}

/// Tone generator. A started tone plays for `duration` clock ticks; a zero
/// duration plays until stopped.
#[derive(Default)]
pub struct Buzzer {
    tone: u8,
    duration: u8,
    remaining: u8,
    playing: bool,
}

impl Buzzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BuzzerState {
        BuzzerState {
            playing: self.playing,
            frequency: self.tone as u32 * HZ_PER_TONE_STEP,
            remaining_ticks: self.remaining,
        }
    }
}

impl IoDevice for Buzzer {
    fn name(&self) -> &'static str {
        "Buzzer"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        match port {
            TONE_PORT => Ok(self.tone),
            DURATION_PORT => Ok(self.duration),
            CONTROL_PORT => Ok(self.playing as u8),
            _ => Err(DeviceError::NotReadable(port)),
        }
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        match port {
            TONE_PORT => self.tone = data,
            DURATION_PORT => self.duration = data,
            CONTROL_PORT => {
                self.playing = data & 1 != 0;
                self.remaining = if self.playing { self.duration } else { 0 };
                debug!(
                    "Buzzer {} at {} Hz",
                    if self.playing { "on" } else { "off" },
                    self.tone as u32 * HZ_PER_TONE_STEP
                );
            }
            _ => return Err(DeviceError::NotWritable(port)),
        }
        Ok(())
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn tick(&mut self) {
        if !self.playing || self.duration == 0 {
            return;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.playing = false;
        }
    }
}
