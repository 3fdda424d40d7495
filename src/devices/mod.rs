//! I/O devices
//!
//! Devices live in the I/O region of the bus, 16 ports each. The
//! [`DevicesManager`] splits an I/O relative offset into a device slot
//! (`offset / 16`) and a port (`offset % 16`) and dispatches to the device
//! registered there.
//!
//! The set of devices is closed: every variant is known when the machine is
//! assembled and dispatch goes through the [`Device`] enum.

pub mod buzzer;
pub mod console;
pub mod displays;
pub mod disk;
pub mod keyboard;
pub mod rng;
pub mod rtc;
pub mod timer;

use std::collections::HashMap;

use log::debug;

use crate::dma::{DmaController, DmaRequest};
use crate::errors::{ConfigError, DeviceError, MachineError};
use crate::hardware::{DEVICE_SLOTS, PORTS_PER_DEVICE};
use crate::interfaces::IoDevice;
use crate::interrupts::InterruptPorts;

use buzzer::Buzzer;
use console::Console;
use displays::{LcdDisplay, LedsDisplay, PixelDisplay, SevenSegmentDisplay};
use disk::StorageDisk;
use keyboard::Keyboard;
use rng::Rng;
use rtc::Rtc;
use timer::Timer;

pub enum Device {
    Interrupts(InterruptPorts),
    Timer(Timer),
    Rtc(Rtc),
    Rng(Rng),
    Keyboard(Keyboard),
    Console(Console),
    Leds(LedsDisplay),
    Pixels(PixelDisplay),
    Lcd(LcdDisplay),
    SevenSegment(SevenSegmentDisplay),
    Disk(StorageDisk),
    Buzzer(Buzzer),
    Dma(DmaController),
}

macro_rules! dispatch {
    ($device:expr, $inner:ident => $body:expr) => {
        match $device {
            Device::Interrupts($inner) => $body,
            Device::Timer($inner) => $body,
            Device::Rtc($inner) => $body,
            Device::Rng($inner) => $body,
            Device::Keyboard($inner) => $body,
            Device::Console($inner) => $body,
            Device::Leds($inner) => $body,
            Device::Pixels($inner) => $body,
            Device::Lcd($inner) => $body,
            Device::SevenSegment($inner) => $body,
            Device::Disk($inner) => $body,
            Device::Buzzer($inner) => $body,
            Device::Dma($inner) => $body,
        }
    };
}

impl IoDevice for Device {
    fn name(&self) -> &'static str {
        dispatch!(self, device => device.name())
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        dispatch!(self, device => device.read(port))
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        dispatch!(self, device => device.write(port, data))
    }

    fn reset(&mut self) {
        dispatch!(self, device => device.reset())
    }

    fn size(&self) -> Option<usize> {
        dispatch!(self, device => device.size())
    }

    fn tick(&mut self) {
        dispatch!(self, device => device.tick())
    }
}

struct RegisteredDevice {
    /// arena index assigned at registration, only used to identify the
    /// device in logs
    id: usize,
    device: Device,
}

/// Dispatch table from device slot to device
#[derive(Default)]
pub struct DevicesManager {
    devices: HashMap<u8, RegisteredDevice>,
    next_id: usize,
}

impl DevicesManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `device` on `slot`. Returns the arena index of the device.
    pub fn register(&mut self, slot: u8, device: Device) -> Result<usize, ConfigError> {
        if slot >= DEVICE_SLOTS {
            return Err(ConfigError::InvalidSlot {
                slot,
                max: DEVICE_SLOTS - 1,
            });
        }
        if let Some(registered) = self.devices.get(&slot) {
            return Err(ConfigError::AlreadyAttached {
                slot,
                device: registered.device.name(),
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        debug!("Device '{}' (#{id}) attached to slot {slot}", device.name());
        self.devices.insert(slot, RegisteredDevice { id, device });
        Ok(id)
    }

    pub fn device(&self, slot: u8) -> Option<&Device> {
        self.devices.get(&slot).map(|registered| &registered.device)
    }

    pub fn device_mut(&mut self, slot: u8) -> Option<&mut Device> {
        self.devices
            .get_mut(&slot)
            .map(|registered| &mut registered.device)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values().map(|registered| &registered.device)
    }

    pub fn devices_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices
            .values_mut()
            .map(|registered| &mut registered.device)
    }

    /// Read from the I/O relative `offset`
    pub fn read(&mut self, offset: u16) -> Result<u8, MachineError> {
        let (slot, port) = split_offset(offset);
        self.read_port(slot, port)
    }

    /// Write to the I/O relative `offset`. Returns the DMA transfer the write
    /// triggered, if any.
    pub fn write(&mut self, offset: u16, data: u8) -> Result<Option<DmaRequest>, MachineError> {
        let (slot, port) = split_offset(offset);
        self.write_port(slot, port, data)?;

        let request = match self.device_mut(slot) {
            Some(Device::Dma(dma)) => dma.take_request(),
            _ => None,
        };
        Ok(request)
    }

    pub fn read_port(&mut self, slot: u8, port: u8) -> Result<u8, MachineError> {
        let unknown = unknown_port(slot, port);
        let registered = self.devices.get_mut(&slot).ok_or(unknown.clone())?;
        let data = registered.device.read(port).map_err(|_| unknown)?;
        debug!(
            "Device '{}' (#{}) port {port} -> {data:0>2X}",
            registered.device.name(),
            registered.id
        );
        Ok(data)
    }

    pub fn write_port(&mut self, slot: u8, port: u8, data: u8) -> Result<(), MachineError> {
        let unknown = unknown_port(slot, port);
        let registered = self.devices.get_mut(&slot).ok_or(unknown.clone())?;
        debug!(
            "Device '{}' (#{}) port {port} <- {data:0>2X}",
            registered.device.name(),
            registered.id
        );
        registered.device.write(port, data).map_err(|_| unknown)
    }

    /// Report a finished DMA transfer to the controller on `slot`
    pub fn finish_dma(&mut self, slot: u8, moved: u32) {
        if let Some(Device::Dma(dma)) = self.device_mut(slot) {
            dma.finish(moved);
        }
    }

    /// Slot of the DMA controller, if one is registered
    pub fn dma_slot(&self) -> Option<u8> {
        self.devices
            .iter()
            .find(|(_, registered)| matches!(registered.device, Device::Dma(_)))
            .map(|(slot, _)| *slot)
    }

    /// Whether the device on `slot` exposes the address/data port layout a
    /// DMA transfer reads from
    pub fn is_dma_source(&self, slot: u8) -> bool {
        matches!(self.device(slot), Some(Device::Disk(_)))
    }

    pub fn reset(&mut self) {
        for device in self.devices_mut() {
            device.reset();
        }
    }

    pub fn tick(&mut self) {
        for device in self.devices_mut() {
            device.tick();
        }
    }
}

fn split_offset(offset: u16) -> (u8, u8) {
    (
        (offset / PORTS_PER_DEVICE) as u8,
        (offset % PORTS_PER_DEVICE) as u8,
    )
}

fn unknown_port(slot: u8, port: u8) -> MachineError {
    MachineError::UnknownPort {
        device: slot,
        port,
        offset: slot as u16 * PORTS_PER_DEVICE + port as u16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_slot_and_port() {
        let mut devices = DevicesManager::new();
        devices.register(6, Device::Leds(LedsDisplay::new())).unwrap();
        devices.register(9, Device::SevenSegment(SevenSegmentDisplay::new())).unwrap();

        devices.write(0x60, 0xAA).unwrap();
        devices.write(0x90, 3).unwrap();

        assert_eq!(devices.read(0x60), Ok(0xAA));
        assert_eq!(devices.read(0x91), Ok(0x4F));
    }

    #[test]
    fn test_unknown_device_and_port() {
        let mut devices = DevicesManager::new();
        devices.register(6, Device::Leds(LedsDisplay::new())).unwrap();

        assert_eq!(
            devices.read(0x25),
            Err(MachineError::UnknownPort {
                device: 2,
                port: 5,
                offset: 0x25
            })
        );
        assert_eq!(
            devices.write(0x61, 1),
            Err(MachineError::UnknownPort {
                device: 6,
                port: 1,
                offset: 0x61
            })
        );
    }

    #[test]
    fn test_register_rejects_taken_and_invalid_slots() {
        let mut devices = DevicesManager::new();
        assert_eq!(devices.register(0, Device::Leds(LedsDisplay::new())).unwrap(), 0);
        assert_eq!(devices.register(1, Device::Leds(LedsDisplay::new())).unwrap(), 1);

        assert!(matches!(
            devices.register(1, Device::Console(Console::new())),
            Err(ConfigError::AlreadyAttached { slot: 1, device: "LEDs" })
        ));
        assert!(matches!(
            devices.register(16, Device::Console(Console::new())),
            Err(ConfigError::InvalidSlot { slot: 16, .. })
        ));
    }

    #[test]
    fn test_reset_reaches_every_device() {
        let mut devices = DevicesManager::new();
        devices.register(0, Device::Leds(LedsDisplay::new())).unwrap();
        devices.register(1, Device::Console(Console::new())).unwrap();
        devices.write(0x00, 0xFF).unwrap();
        devices.write(0x10, b'x').unwrap();

        devices.reset();

        assert_eq!(devices.read(0x00), Ok(0));
        match devices.device(1) {
            Some(Device::Console(console)) => assert_eq!(console.text(), ""),
            _ => panic!("console expected on slot 1"),
        }
    }

    #[test]
    fn test_dma_trigger_returns_request() {
        let mut devices = DevicesManager::new();
        devices.register(12, Device::Dma(DmaController::new())).unwrap();
        assert_eq!(devices.dma_slot(), Some(12));
        assert!(!devices.is_dma_source(12));

        devices.write(0xC0, 10).unwrap();
        devices.write(0xC3, 0x07).unwrap();
        let request = devices.write(0xC7, 1).unwrap().unwrap();

        assert_eq!(request.device, 10);
        assert_eq!(request.size(), Some(8));
        assert_eq!(devices.write(0xC0, 10).unwrap(), None);
    }
}
