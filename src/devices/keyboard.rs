use bitflags::bitflags;
use crossbeam_channel::{Receiver, TryRecvError};
use log::{debug, warn};

use crate::errors::DeviceError;
use crate::interfaces::IoDevice;
use crate::interrupts::InterruptLine;

pub const DATA_PORT: u8 = 0;
pub const STATUS_PORT: u8 = 1;

bitflags! {
    pub struct KeyboardStatus: u8 {
        const HAS_CHAR = 0b0000_0001;
        const IRQ_ENABLED = 0b0000_0010;
    }
}

/// Keyboard fed by a channel of characters. Input is buffered: only the
/// latest key pressed since the last poll is kept and exposed through the
/// data port.
pub struct Keyboard {
    keyboard_channel: Receiver<char>,
    buffered: Option<u8>,
    status: KeyboardStatus,
    irq: Option<InterruptLine>,
    disconnected: bool,
}

impl Keyboard {
    pub fn new(keyboard: Receiver<char>) -> Self {
        Self {
            keyboard_channel: keyboard,
            buffered: None,
            status: KeyboardStatus::empty(),
            irq: None,
            disconnected: false,
        }
    }

    pub fn connect_interrupt(&mut self, line: InterruptLine) {
        self.irq = Some(line);
    }

    /// Drain pending key presses, keeping only the latest one
    pub fn poll(&mut self) {
        let mut latest = None;

        loop {
            match self.keyboard_channel.try_recv() {
                Ok(c) => latest = Some(c),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        warn!("Keyboard channel disconnected");
                        self.disconnected = true;
                    }
                    break;
                }
            }
        }

        let Some(c) = latest else {
            return;
        };
        if !c.is_ascii() {
            debug!("Ignoring non ASCII key {c:?}");
            return;
        }

        self.buffered = Some(c as u8);
        self.status.insert(KeyboardStatus::HAS_CHAR);
        if self.status.contains(KeyboardStatus::IRQ_ENABLED) {
            if let Some(irq) = &self.irq {
                irq.raise();
            }
        }
    }
}

impl IoDevice for Keyboard {
    fn name(&self) -> &'static str {
        "Keyboard"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        match port {
            DATA_PORT => {
                self.status.remove(KeyboardStatus::HAS_CHAR);
                Ok(self.buffered.take().unwrap_or(0))
            }
            STATUS_PORT => Ok(self.status.bits()),
            _ => Err(DeviceError::NotReadable(port)),
        }
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        match port {
            STATUS_PORT => {
                let requested = KeyboardStatus::from_bits_truncate(data);
                self.status.set(
                    KeyboardStatus::IRQ_ENABLED,
                    requested.contains(KeyboardStatus::IRQ_ENABLED),
                );
                Ok(())
            }
            _ => Err(DeviceError::NotWritable(port)),
        }
    }

    fn reset(&mut self) {
        self.buffered = None;
        self.status = KeyboardStatus::empty();
    }

    fn tick(&mut self) {
        self.poll();
    }
}
