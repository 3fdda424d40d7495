use crate::errors::DeviceError;
use crate::interfaces::IoDevice;

pub const OUTPUT_PORT: u8 = 0;
pub const SEED_HIGH_PORT: u8 = 1;
pub const SEED_LOW_PORT: u8 = 2;

// xorshift state must never be zero
const FALLBACK_SEED: u16 = 0xACE1;

/// 16-bit xorshift pseudo random number generator. Reading the output port
/// advances the generator and returns the low byte of the new state.
pub struct Rng {
    seed: u16,
    state: u16,
}

impl Rng {
    pub fn new(seed: u16) -> Self {
        let seed = if seed == 0 { FALLBACK_SEED } else { seed };
        Self { seed, state: seed }
    }

    fn reseed(&mut self, seed: u16) {
        *self = Self::new(seed);
    }

    pub fn next_byte(&mut self) -> u8 {
        let mut x = self.state;
        x ^= x << 7;
        x ^= x >> 9;
        x ^= x << 8;
        self.state = x;
        (x & 0x00FF) as u8
    }
}

impl IoDevice for Rng {
    fn name(&self) -> &'static str {
        "RNG"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        match port {
            OUTPUT_PORT => Ok(self.next_byte()),
            SEED_HIGH_PORT => Ok((self.seed >> 8) as u8),
            SEED_LOW_PORT => Ok(self.seed as u8),
            _ => Err(DeviceError::NotReadable(port)),
        }
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        match port {
            SEED_HIGH_PORT => self.reseed(((data as u16) << 8) | (self.seed & 0x00FF)),
            SEED_LOW_PORT => self.reseed((self.seed & 0xFF00) | data as u16),
            _ => return Err(DeviceError::NotWritable(port)),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.state = self.seed;
    }
}
