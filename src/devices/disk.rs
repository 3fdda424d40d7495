use crate::errors::DeviceError;
use crate::interfaces::IoDevice;
use crate::utils::{join_word, split_word};

pub const ADDRESS_LOW_PORT: u8 = 0;
pub const ADDRESS_HIGH_PORT: u8 = 1;
pub const DATA_PORT: u8 = 2;
/// Index of the last 256-byte page, so a full 64 kB disk reads 255
pub const PAGES_PORT: u8 = 3;

pub const DISK_SIZE: usize = 64 * 1024;
pub const DISK_PAGE_SIZE: usize = 256;

/// 64 kB byte addressable storage. The program selects a byte with the
/// address ports and then reads or writes it through the data port.
pub struct StorageDisk {
    address: u16,
    image: Vec<u8>,
}

impl StorageDisk {
    pub fn new() -> Self {
        Self {
            address: 0,
            image: vec![0; DISK_SIZE],
        }
    }

    /// Replace the start of the disk image with `image`; the rest is zeroed.
    /// Bytes past the disk size are dropped.
    pub fn load_image(&mut self, image: &[u8]) {
        self.image.fill(0);
        let length = image.len().min(DISK_SIZE);
        self.image[..length].copy_from_slice(&image[..length]);
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn byte_at(&self, address: u16) -> u8 {
        self.image[address as usize]
    }
}

impl Default for StorageDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDevice for StorageDisk {
    fn name(&self) -> &'static str {
        "Storage disk"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        let (low, high) = split_word(self.address);
        match port {
            ADDRESS_LOW_PORT => Ok(low),
            ADDRESS_HIGH_PORT => Ok(high),
            DATA_PORT => Ok(self.image[self.address as usize]),
            PAGES_PORT => Ok((DISK_SIZE / DISK_PAGE_SIZE - 1) as u8),
            _ => Err(DeviceError::NotReadable(port)),
        }
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        let (low, high) = split_word(self.address);
        match port {
            ADDRESS_LOW_PORT => self.address = join_word(data, high),
            ADDRESS_HIGH_PORT => self.address = join_word(low, data),
            DATA_PORT => self.image[self.address as usize] = data,
            _ => return Err(DeviceError::NotWritable(port)),
        }
        Ok(())
    }

    /// Only the address register is reset, the image survives
    fn reset(&mut self) {
        self.address = 0;
    }

    fn size(&self) -> Option<usize> {
        Some(self.image.len())
    }
}
