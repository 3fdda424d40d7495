//! FLAGS register
//!
//! Bit 0 is Carry, bit 1 is Zero. Other bits never read back as set.

use bitflags::bitflags;
use log::debug;

use StatusRegisterFlag::*;

bitflags! {
    #[derive(Default)]
    struct Flags: u8 {
        const CARRY = 0b0000_0001;
        const ZERO = 0b0000_0010;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusRegisterFlag {
    Carry,
    Zero,
}

impl StatusRegisterFlag {
    fn mask(self) -> Flags {
        match self {
            Carry => Flags::CARRY,
            Zero => Flags::ZERO,
        }
    }
}

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct StatusRegister {
    flags: Flags,
}

impl StatusRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.flags = Flags::empty();
    }

    pub fn get(&self, flag: StatusRegisterFlag) -> bool {
        self.flags.contains(flag.mask())
    }

    pub fn set(&mut self, flag: StatusRegisterFlag) {
        self.flags.insert(flag.mask());
    }

    pub fn clear(&mut self, flag: StatusRegisterFlag) {
        self.flags.remove(flag.mask());
    }

    pub fn set_value(&mut self, flag: StatusRegisterFlag, condition: bool) {
        self.flags.set(flag.mask(), condition);
    }

    /// Derive `flag` from a result value. Carry depends on the operation and
    /// must be set explicitly with [`set_value`](Self::set_value).
    pub fn auto_set(&mut self, flag: StatusRegisterFlag, value: u8) {
        match flag {
            Zero => self.set_value(Zero, value == 0),
            Carry => debug!("Carry can't be derived from a value, left untouched"),
        }
    }
}

/// Restore from a byte popped off the stack
impl From<u8> for StatusRegister {
    fn from(value: u8) -> Self {
        Self {
            flags: Flags::from_bits_truncate(value),
        }
    }
}

impl From<StatusRegister> for u8 {
    fn from(value: StatusRegister) -> Self {
        value.flags.bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_register_all() {
        let mut sr = StatusRegister::default();

        for flag in [Carry, Zero] {
            assert!(!sr.get(flag));
            sr.set(flag);
            assert!(sr.get(flag));
            sr.clear(flag);
            assert!(!sr.get(flag));
        }
    }

    #[test]
    fn test_status_register_layout() {
        let sr = StatusRegister::from(0b1111_1110);
        assert!(sr.get(Zero));
        assert!(!sr.get(Carry));
        assert_eq!(u8::from(sr), 0b10);

        let mut sr = StatusRegister::new();
        sr.set(Carry);
        assert_eq!(u8::from(sr), 0b01);
    }

    #[test]
    fn test_status_register_auto_set_zero() {
        let mut sr = StatusRegister::default();
        sr.set(Carry);
        sr.auto_set(Zero, 0);
        assert!(sr.get(Zero));
        sr.auto_set(Zero, 0x80);
        assert!(!sr.get(Zero));
        sr.auto_set(Carry, 0);
        assert!(sr.get(Carry));
    }
}
