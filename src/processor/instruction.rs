use crate::processor::internal_cpu::InternalCpu;
use crate::types::SharedBus;

pub type Opcode = u8;

#[derive(Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub name: &'static str,
    pub instruction: InstructionKind,
    pub addressing_mode: AddressingMode,
}

impl Instruction {
    /// Encoded length, opcode included
    pub fn bytes(&self) -> u8 {
        match self.addressing_mode {
            AddressingMode::Implied => 1,
            AddressingMode::Immediate => 2,
            AddressingMode::Absolute => 3,
        }
    }
}

#[derive(Clone)]
pub enum InstructionKind {
    SingleByte(fn(&mut InternalCpu)),
    InternalExecOnMemoryData(fn(&mut InternalCpu, u8)),
    StoreOp(fn(&InternalCpu) -> u8),
    Misc(MiscInstructionKind),
    // Instructions acting on CPU state outside the register file
    Control(ControlKind),
}

#[derive(Clone)]
pub enum MiscInstructionKind {
    Push(fn(&mut InternalCpu, &SharedBus)),
    Pull(fn(&mut InternalCpu, &SharedBus)),
    Jump(fn(&mut InternalCpu, u16)),
    Call(fn(&mut InternalCpu, u16, &SharedBus)),
    Return(fn(&mut InternalCpu, &SharedBus)),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlKind {
    Halt,
    Syscall,
    EnableInterrupts,
    DisableInterrupts,
    ReturnFromInterrupt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,   // no operand
    Immediate, // one literal byte
    Absolute,  // 16-bit little-endian address
}
