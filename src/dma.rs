//! Direct memory access
//!
//! The DMA controller copies a block of bytes from a device into RAM without
//! running CPU instructions. The program selects the source device, the
//! inclusive source range on that device and the RAM target, then writes the
//! trigger port.
//!
//! This module encapsulate the register file in [`DmaController`]. The copy
//! itself is run by the [`MemoryBus`](crate::processor::bus::MemoryBus),
//! which owns both ends of the transfer, as one non-preemptible bus operation.

use log::debug;

use crate::errors::DeviceError;
use crate::interfaces::IoDevice;
use crate::interrupts::InterruptLine;
use crate::utils::{join_word, split_word};

pub const DEVICE_PORT: u8 = 0;
pub const SOURCE_START_LOW_PORT: u8 = 1;
pub const SOURCE_START_HIGH_PORT: u8 = 2;
pub const SOURCE_END_LOW_PORT: u8 = 3;
pub const SOURCE_END_HIGH_PORT: u8 = 4;
pub const TARGET_LOW_PORT: u8 = 5;
pub const TARGET_HIGH_PORT: u8 = 6;
pub const TRIGGER_PORT: u8 = 7;

// Ports the DMA drives on the source device
pub const SOURCE_ADDRESS_LOW_PORT: u8 = 0;
pub const SOURCE_ADDRESS_HIGH_PORT: u8 = 1;
pub const SOURCE_DATA_PORT: u8 = 2;

/// Snapshot of the DMA registers taken when the trigger port is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaRequest {
    pub device: u8,
    pub source_start: u16,
    pub source_end: u16,
    pub target: u16,
}

impl DmaRequest {
    /// Number of bytes to move. `None` when the source range is inverted.
    pub fn size(&self) -> Option<u32> {
        (self.source_end >= self.source_start)
            .then(|| (self.source_end - self.source_start) as u32 + 1)
    }
}

/// DMA controller register file. Stateless between transfers besides these
/// registers.
pub struct DmaController {
    device: u8,
    source_start: u16,
    source_end: u16,
    target: u16,

    /// bytes moved by the last transfer
    moved: u32,

    request: Option<DmaRequest>,
    irq: Option<InterruptLine>,
}

impl DmaController {
    pub fn new() -> Self {
        Self {
            device: 0,
            source_start: 0,
            source_end: 0,
            target: 0,
            moved: 0,
            request: None,
            irq: None,
        }
    }

    pub fn connect_interrupt(&mut self, line: InterruptLine) {
        self.irq = Some(line);
    }

    /// Transfer requested by the last trigger write, if not yet taken
    pub fn take_request(&mut self) -> Option<DmaRequest> {
        self.request.take()
    }

    /// Record the outcome of a transfer run by the bus
    pub fn finish(&mut self, moved: u32) {
        self.moved = moved;
        debug!("DMA transfer finished, {moved} bytes moved");
        if let Some(irq) = &self.irq {
            irq.raise();
        }
    }

    pub fn moved(&self) -> u32 {
        self.moved
    }
}

impl Default for DmaController {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDevice for DmaController {
    fn name(&self) -> &'static str {
        "DMA"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        let data = match port {
            DEVICE_PORT => self.device,
            SOURCE_START_LOW_PORT => split_word(self.source_start).0,
            SOURCE_START_HIGH_PORT => split_word(self.source_start).1,
            SOURCE_END_LOW_PORT => split_word(self.source_end).0,
            SOURCE_END_HIGH_PORT => split_word(self.source_end).1,
            TARGET_LOW_PORT => split_word(self.target).0,
            TARGET_HIGH_PORT => split_word(self.target).1,
            TRIGGER_PORT => self.moved as u8,
            _ => return Err(DeviceError::NotReadable(port)),
        };
        Ok(data)
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        let set_low = |word: u16| join_word(data, split_word(word).1);
        let set_high = |word: u16| join_word(split_word(word).0, data);

        match port {
            DEVICE_PORT => self.device = data,
            SOURCE_START_LOW_PORT => self.source_start = set_low(self.source_start),
            SOURCE_START_HIGH_PORT => self.source_start = set_high(self.source_start),
            SOURCE_END_LOW_PORT => self.source_end = set_low(self.source_end),
            SOURCE_END_HIGH_PORT => self.source_end = set_high(self.source_end),
            TARGET_LOW_PORT => self.target = set_low(self.target),
            TARGET_HIGH_PORT => self.target = set_high(self.target),
            TRIGGER_PORT => {
                let request = DmaRequest {
                    device: self.device,
                    source_start: self.source_start,
                    source_end: self.source_end,
                    target: self.target,
                };
                debug!("DMA transfer requested: {request:?}");
                self.request = Some(request);
            }
            _ => return Err(DeviceError::NotWritable(port)),
        }
        Ok(())
    }

    fn reset(&mut self) {
        let irq = self.irq.take();
        *self = Self::new();
        self.irq = irq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_snapshots_registers() {
        let mut dma = DmaController::new();
        dma.write(DEVICE_PORT, 10).unwrap();
        dma.write(SOURCE_START_LOW_PORT, 0x10).unwrap();
        dma.write(SOURCE_START_HIGH_PORT, 0x02).unwrap();
        dma.write(SOURCE_END_LOW_PORT, 0x1F).unwrap();
        dma.write(SOURCE_END_HIGH_PORT, 0x02).unwrap();
        dma.write(TARGET_LOW_PORT, 0x00).unwrap();
        dma.write(TARGET_HIGH_PORT, 0x40).unwrap();
        assert_eq!(dma.take_request(), None);

        dma.write(TRIGGER_PORT, 1).unwrap();
        let request = dma.take_request().unwrap();
        assert_eq!(
            request,
            DmaRequest {
                device: 10,
                source_start: 0x0210,
                source_end: 0x021F,
                target: 0x4000,
            }
        );
        assert_eq!(request.size(), Some(16));
        assert_eq!(dma.take_request(), None);
        assert_eq!(dma.read(TARGET_HIGH_PORT), Ok(0x40));
    }

    #[test]
    fn test_inverted_range_has_no_size() {
        let request = DmaRequest {
            device: 0,
            source_start: 5,
            source_end: 4,
            target: 0,
        };
        assert_eq!(request.size(), None);
    }

    #[test]
    fn test_finish_records_moved_bytes() {
        let mut dma = DmaController::new();
        dma.finish(0x0102);
        assert_eq!(dma.moved(), 0x0102);
        assert_eq!(dma.read(TRIGGER_PORT), Ok(0x02));
    }
}
