use crate::errors::DeviceError;

/// Address decoding authority as seen by the CPU
pub trait Bus {
    /// Read a byte from whatever is mapped at `address`
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte of `data` to whatever is mapped at `address`
    fn write(&mut self, address: u16, data: u8);
}

/// Capability set shared by every I/O device. Ports are device-relative
/// register indices in `0..16`.
pub trait IoDevice {
    /// Human readable device name, used in logs
    fn name(&self) -> &'static str;

    /// Read the register behind `port`. Reads may have side effects (the
    /// RNG advances, the keyboard clears its buffered char).
    fn read(&mut self, port: u8) -> Result<u8, DeviceError>;

    /// Write `data` to the register behind `port`
    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError>;

    /// Bring the device back to its power-on state
    fn reset(&mut self) {}

    /// Size of the device backing store, for devices that have one
    fn size(&self) -> Option<usize> {
        None
    }

    /// Called once per clock tick
    fn tick(&mut self) {}
}
