use crate::processor::status_register::StatusRegister;

/// General purpose 8-bit registers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    A,
    B,
    C,
    D,
}

#[derive(Clone, Default)]
pub struct InternalCpu {
    pub a: u8, // Accumulator
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub pc: u16, // Program Counter
    pub sp: u16, // Stack Pointer
    pub ir: u8,  // Instruction Register, opcode in flight
    pub sr: StatusRegister,
}

impl InternalCpu {
    pub fn register(&self, register: Register) -> u8 {
        match register {
            Register::A => self.a,
            Register::B => self.b,
            Register::C => self.c,
            Register::D => self.d,
        }
    }

    pub fn register_mut(&mut self, register: Register) -> &mut u8 {
        match register {
            Register::A => &mut self.a,
            Register::B => &mut self.b,
            Register::C => &mut self.c,
            Register::D => &mut self.d,
        }
    }
}
