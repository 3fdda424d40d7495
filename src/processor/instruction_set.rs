use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::processor::instruction::{
    AddressingMode, ControlKind, Instruction, InstructionKind, MiscInstructionKind, Opcode,
};
use crate::processor::internal_cpu::{InternalCpu, Register};
use crate::processor::status_register::{StatusRegister, StatusRegisterFlag};
use crate::types::SharedBus;
use crate::utils::{join_word, split_word};

use AddressingMode::*;
use ControlKind::*;
use InstructionKind::*;
use MiscInstructionKind::*;
use Register::*;
use StatusRegisterFlag::*;

/// Opcode encoding
pub mod opcodes {
    pub const NOP: u8 = 0x00;
    pub const HALT: u8 = 0x01;
    pub const SYSCALL: u8 = 0x02;

    pub const MOV_A_IMM: u8 = 0x10;
    pub const MOV_B_IMM: u8 = 0x11;
    pub const MOV_C_IMM: u8 = 0x12;
    pub const MOV_D_IMM: u8 = 0x13;
    pub const MOV_A_MEM: u8 = 0x14;
    pub const MOV_B_MEM: u8 = 0x15;
    pub const MOV_C_MEM: u8 = 0x16;
    pub const MOV_D_MEM: u8 = 0x17;
    pub const MOV_MEM_A: u8 = 0x18;
    pub const MOV_MEM_B: u8 = 0x19;
    pub const MOV_MEM_C: u8 = 0x1A;
    pub const MOV_MEM_D: u8 = 0x1B;
    pub const MOV_A_B: u8 = 0x1C;
    pub const MOV_B_A: u8 = 0x1D;
    pub const MOV_A_C: u8 = 0x1E;
    pub const MOV_C_A: u8 = 0x1F;
    pub const MOV_A_D: u8 = 0x20;
    pub const MOV_D_A: u8 = 0x21;

    pub const ADD: u8 = 0x30;
    pub const SUB: u8 = 0x31;
    pub const AND: u8 = 0x32;
    pub const OR: u8 = 0x33;
    pub const XOR: u8 = 0x34;
    pub const CMP: u8 = 0x35;
    pub const ADD_IMM: u8 = 0x38;
    pub const SUB_IMM: u8 = 0x39;
    pub const AND_IMM: u8 = 0x3A;
    pub const OR_IMM: u8 = 0x3B;
    pub const XOR_IMM: u8 = 0x3C;
    pub const CMP_IMM: u8 = 0x3D;

    pub const INC_A: u8 = 0x40;
    pub const INC_B: u8 = 0x41;
    pub const INC_C: u8 = 0x42;
    pub const INC_D: u8 = 0x43;
    pub const DEC_A: u8 = 0x44;
    pub const DEC_B: u8 = 0x45;
    pub const DEC_C: u8 = 0x46;
    pub const DEC_D: u8 = 0x47;

    pub const JMP: u8 = 0x50;
    pub const JZ: u8 = 0x51;
    pub const JNZ: u8 = 0x52;
    pub const JC: u8 = 0x53;
    pub const JNC: u8 = 0x54;
    pub const CALL: u8 = 0x55;
    pub const RET: u8 = 0x56;

    pub const PUSH_A: u8 = 0x60;
    pub const PUSH_B: u8 = 0x61;
    pub const PUSH_C: u8 = 0x62;
    pub const PUSH_D: u8 = 0x63;
    pub const POP_A: u8 = 0x64;
    pub const POP_B: u8 = 0x65;
    pub const POP_C: u8 = 0x66;
    pub const POP_D: u8 = 0x67;
    pub const SET_SP: u8 = 0x68;

    pub const EI: u8 = 0x70;
    pub const DI: u8 = 0x71;
    pub const IRET: u8 = 0x72;
}

use opcodes::*;

pub static INSTRUCTION_SET: Lazy<InstructionSet> = Lazy::new(InstructionSet::new);

pub struct InstructionSet {
    instruction_set: HashMap<Opcode, Instruction>,
}

macro_rules! instruction {
    ($opcode:expr, $name:expr, $kind:expr, $addr_mode:expr) => {
        Instruction {
            opcode: $opcode,
            name: $name,
            instruction: $kind,
            addressing_mode: $addr_mode,
        }
    };
}

impl InstructionSet {
    #[rustfmt::skip]
    pub fn new() -> Self {
        let instructions = [
            instruction!(NOP, "NOP", SingleByte(nop), Implied),
            instruction!(HALT, "HALT", Control(Halt), Implied),
            instruction!(SYSCALL, "SYSCALL", Control(Syscall), Immediate),

            // Data movement
            instruction!(MOV_A_IMM, "MOV_A_IMM", InternalExecOnMemoryData(|cpu, value| mov(cpu, A, value)), Immediate),
            instruction!(MOV_B_IMM, "MOV_B_IMM", InternalExecOnMemoryData(|cpu, value| mov(cpu, B, value)), Immediate),
            instruction!(MOV_C_IMM, "MOV_C_IMM", InternalExecOnMemoryData(|cpu, value| mov(cpu, C, value)), Immediate),
            instruction!(MOV_D_IMM, "MOV_D_IMM", InternalExecOnMemoryData(|cpu, value| mov(cpu, D, value)), Immediate),

            instruction!(MOV_A_MEM, "MOV_A_MEM", InternalExecOnMemoryData(|cpu, value| mov(cpu, A, value)), Absolute),
            instruction!(MOV_B_MEM, "MOV_B_MEM", InternalExecOnMemoryData(|cpu, value| mov(cpu, B, value)), Absolute),
            instruction!(MOV_C_MEM, "MOV_C_MEM", InternalExecOnMemoryData(|cpu, value| mov(cpu, C, value)), Absolute),
            instruction!(MOV_D_MEM, "MOV_D_MEM", InternalExecOnMemoryData(|cpu, value| mov(cpu, D, value)), Absolute),

            instruction!(MOV_MEM_A, "MOV_MEM_A", StoreOp(|cpu| cpu.register(A)), Absolute),
            instruction!(MOV_MEM_B, "MOV_MEM_B", StoreOp(|cpu| cpu.register(B)), Absolute),
            instruction!(MOV_MEM_C, "MOV_MEM_C", StoreOp(|cpu| cpu.register(C)), Absolute),
            instruction!(MOV_MEM_D, "MOV_MEM_D", StoreOp(|cpu| cpu.register(D)), Absolute),

            instruction!(MOV_A_B, "MOV_A_B", SingleByte(|cpu| transfer(cpu, B, A)), Implied),
            instruction!(MOV_B_A, "MOV_B_A", SingleByte(|cpu| transfer(cpu, A, B)), Implied),
            instruction!(MOV_A_C, "MOV_A_C", SingleByte(|cpu| transfer(cpu, C, A)), Implied),
            instruction!(MOV_C_A, "MOV_C_A", SingleByte(|cpu| transfer(cpu, A, C)), Implied),
            instruction!(MOV_A_D, "MOV_A_D", SingleByte(|cpu| transfer(cpu, D, A)), Implied),
            instruction!(MOV_D_A, "MOV_D_A", SingleByte(|cpu| transfer(cpu, A, D)), Implied),

            // Arithmetic and logic, A op B
            instruction!(ADD, "ADD", SingleByte(|cpu| with_b(cpu, add)), Implied),
            instruction!(SUB, "SUB", SingleByte(|cpu| with_b(cpu, sub)), Implied),
            instruction!(AND, "AND", SingleByte(|cpu| with_b(cpu, and)), Implied),
            instruction!(OR, "OR", SingleByte(|cpu| with_b(cpu, or)), Implied),
            instruction!(XOR, "XOR", SingleByte(|cpu| with_b(cpu, xor)), Implied),
            instruction!(CMP, "CMP", SingleByte(|cpu| with_b(cpu, cmp)), Implied),

            // Arithmetic and logic, A op literal
            instruction!(ADD_IMM, "ADD_IMM", InternalExecOnMemoryData(add), Immediate),
            instruction!(SUB_IMM, "SUB_IMM", InternalExecOnMemoryData(sub), Immediate),
            instruction!(AND_IMM, "AND_IMM", InternalExecOnMemoryData(and), Immediate),
            instruction!(OR_IMM, "OR_IMM", InternalExecOnMemoryData(or), Immediate),
            instruction!(XOR_IMM, "XOR_IMM", InternalExecOnMemoryData(xor), Immediate),
            instruction!(CMP_IMM, "CMP_IMM", InternalExecOnMemoryData(cmp), Immediate),

            // Increments and decrements
            instruction!(INC_A, "INC_A", SingleByte(|cpu| inc(cpu, A)), Implied),
            instruction!(INC_B, "INC_B", SingleByte(|cpu| inc(cpu, B)), Implied),
            instruction!(INC_C, "INC_C", SingleByte(|cpu| inc(cpu, C)), Implied),
            instruction!(INC_D, "INC_D", SingleByte(|cpu| inc(cpu, D)), Implied),
            instruction!(DEC_A, "DEC_A", SingleByte(|cpu| dec(cpu, A)), Implied),
            instruction!(DEC_B, "DEC_B", SingleByte(|cpu| dec(cpu, B)), Implied),
            instruction!(DEC_C, "DEC_C", SingleByte(|cpu| dec(cpu, C)), Implied),
            instruction!(DEC_D, "DEC_D", SingleByte(|cpu| dec(cpu, D)), Implied),

            // Control flow
            instruction!(JMP, "JMP", Misc(Jump(jmp)), Absolute),
            instruction!(JZ, "JZ", Misc(Jump(jz)), Absolute),
            instruction!(JNZ, "JNZ", Misc(Jump(jnz)), Absolute),
            instruction!(JC, "JC", Misc(Jump(jc)), Absolute),
            instruction!(JNC, "JNC", Misc(Jump(jnc)), Absolute),
            instruction!(CALL, "CALL", Misc(Call(call)), Absolute),
            instruction!(RET, "RET", Misc(Return(ret)), Implied),

            // Stack
            instruction!(PUSH_A, "PUSH_A", Misc(Push(|cpu, bus| push_register(cpu, A, bus))), Implied),
            instruction!(PUSH_B, "PUSH_B", Misc(Push(|cpu, bus| push_register(cpu, B, bus))), Implied),
            instruction!(PUSH_C, "PUSH_C", Misc(Push(|cpu, bus| push_register(cpu, C, bus))), Implied),
            instruction!(PUSH_D, "PUSH_D", Misc(Push(|cpu, bus| push_register(cpu, D, bus))), Implied),
            instruction!(POP_A, "POP_A", Misc(Pull(|cpu, bus| pop_register(cpu, A, bus))), Implied),
            instruction!(POP_B, "POP_B", Misc(Pull(|cpu, bus| pop_register(cpu, B, bus))), Implied),
            instruction!(POP_C, "POP_C", Misc(Pull(|cpu, bus| pop_register(cpu, C, bus))), Implied),
            instruction!(POP_D, "POP_D", Misc(Pull(|cpu, bus| pop_register(cpu, D, bus))), Implied),
            instruction!(SET_SP, "SET_SP", Misc(Jump(set_sp)), Absolute),

            // Interrupts
            instruction!(EI, "EI", Control(EnableInterrupts), Implied),
            instruction!(DI, "DI", Control(DisableInterrupts), Implied),
            instruction!(IRET, "IRET", Control(ReturnFromInterrupt), Implied),
        ];

        let mut instruction_set = HashMap::new();
        for instruction in instructions {
            instruction_set.insert(instruction.opcode, instruction);
        }

        Self { instruction_set }
    }

    pub fn lookup(&self, opcode: Opcode) -> Option<&Instruction> {
        self.instruction_set.get(&opcode)
    }

    pub fn len(&self) -> usize {
        self.instruction_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruction_set.is_empty()
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::new()
    }
}

// Instruction Set
// ---------------

// Data movement

/// MOV r, M - Load register with literal or memory
///
/// Operation:
/// M -> r
///
/// Status Register
/// Z C
/// + -
pub fn mov(cpu: &mut InternalCpu, register: Register, value: u8) {
    *cpu.register_mut(register) = value;
    cpu.sr.auto_set(Zero, value);
}

/// MOV r, s - Transfer register to register
///
/// Operation:
/// s -> r
///
/// Status Register
/// Z C
/// + -
pub fn transfer(cpu: &mut InternalCpu, from: Register, to: Register) {
    let value = cpu.register(from);
    mov(cpu, to, value);
}

// Arithmetic and logic

/// ADD - Add to Accumulator
///
/// Operation:
/// A + M -> A
///
/// Status Register
/// Z C
/// + +
pub fn add(cpu: &mut InternalCpu, operand: u8) {
    let (result, carry) = cpu.a.overflowing_add(operand);
    cpu.a = result;
    cpu.sr.auto_set(Zero, result);
    cpu.sr.set_value(Carry, carry);
}

/// SUB - Subtract from Accumulator
///
/// Carry is set on unsigned borrow (A < M).
///
/// Operation:
/// A - M -> A
///
/// Status Register
/// Z C
/// + +
pub fn sub(cpu: &mut InternalCpu, operand: u8) {
    let (result, borrow) = cpu.a.overflowing_sub(operand);
    cpu.a = result;
    cpu.sr.auto_set(Zero, result);
    cpu.sr.set_value(Carry, borrow);
}

/// AND - AND with Accumulator
///
/// Operation:
/// A AND M -> A
///
/// Status Register
/// Z C
/// + 0
pub fn and(cpu: &mut InternalCpu, operand: u8) {
    cpu.a &= operand;
    logic_flags(cpu);
}

/// OR - OR with Accumulator
///
/// Operation:
/// A OR M -> A
///
/// Status Register
/// Z C
/// + 0
pub fn or(cpu: &mut InternalCpu, operand: u8) {
    cpu.a |= operand;
    logic_flags(cpu);
}

/// XOR - Exclusive-OR with Accumulator
///
/// Operation:
/// A XOR M -> A
///
/// Status Register
/// Z C
/// + 0
pub fn xor(cpu: &mut InternalCpu, operand: u8) {
    cpu.a ^= operand;
    logic_flags(cpu);
}

/// Run `operation` with register B as operand
fn with_b(cpu: &mut InternalCpu, operation: fn(&mut InternalCpu, u8)) {
    let operand = cpu.b;
    operation(cpu, operand);
}

fn logic_flags(cpu: &mut InternalCpu) {
    cpu.sr.auto_set(Zero, cpu.a);
    cpu.sr.clear(Carry);
}

/// CMP - Compare with Accumulator
///
/// Same flags as SUB, A is left untouched.
///
/// Operation:
/// A - M
///
/// Status Register
/// Z C
/// + +
pub fn cmp(cpu: &mut InternalCpu, operand: u8) {
    let (result, borrow) = cpu.a.overflowing_sub(operand);
    cpu.sr.auto_set(Zero, result);
    cpu.sr.set_value(Carry, borrow);
}

/// INC r - Increment register by one
///
/// Carry is set when the register wraps from 0xFF to 0x00.
///
/// Status Register
/// Z C
/// + +
pub fn inc(cpu: &mut InternalCpu, register: Register) {
    let (result, carry) = cpu.register(register).overflowing_add(1);
    *cpu.register_mut(register) = result;
    cpu.sr.auto_set(Zero, result);
    cpu.sr.set_value(Carry, carry);
}

/// DEC r - Decrement register by one
///
/// Carry is set when the register wraps from 0x00 to 0xFF.
///
/// Status Register
/// Z C
/// + +
pub fn dec(cpu: &mut InternalCpu, register: Register) {
    let (result, borrow) = cpu.register(register).overflowing_sub(1);
    *cpu.register_mut(register) = result;
    cpu.sr.auto_set(Zero, result);
    cpu.sr.set_value(Carry, borrow);
}

// Control flow

pub fn jmp(cpu: &mut InternalCpu, address: u16) {
    cpu.pc = address;
}

fn jump_if(cpu: &mut InternalCpu, condition: bool, address: u16) {
    if condition {
        cpu.pc = address;
    }
}

/// JZ - Jump if Zero set
pub fn jz(cpu: &mut InternalCpu, address: u16) {
    let zero = cpu.sr.get(Zero);
    jump_if(cpu, zero, address);
}

/// JNZ - Jump if Zero clear
pub fn jnz(cpu: &mut InternalCpu, address: u16) {
    let zero = cpu.sr.get(Zero);
    jump_if(cpu, !zero, address);
}

/// JC - Jump if Carry set
pub fn jc(cpu: &mut InternalCpu, address: u16) {
    let carry = cpu.sr.get(Carry);
    jump_if(cpu, carry, address);
}

/// JNC - Jump if Carry clear
pub fn jnc(cpu: &mut InternalCpu, address: u16) {
    let carry = cpu.sr.get(Carry);
    jump_if(cpu, !carry, address);
}

/// CALL - Jump to subroutine saving the return address
///
/// PC already points past the operand, so it is the return address.
///
/// Operation:
/// push PCH, push PCL, M -> PC
pub fn call(cpu: &mut InternalCpu, address: u16, memory: &SharedBus) {
    let return_address = cpu.pc;
    push_word(cpu, return_address, memory);
    cpu.pc = address;
}

/// RET - Return from subroutine
///
/// Operation:
/// pull PCL, pull PCH
pub fn ret(cpu: &mut InternalCpu, memory: &SharedBus) {
    cpu.pc = pull_word(cpu, memory);
}

// Stack

/// Push `data`: SP is decremented first, then written
pub fn push(cpu: &mut InternalCpu, data: u8, memory: &SharedBus) {
    cpu.sp = cpu.sp.wrapping_sub(1);
    log::trace!("Push to SP ${:0>4X} - {data:0>2X}", cpu.sp);
    memory.borrow_mut().write(cpu.sp, data);
}

/// Pull the byte at SP, then increment SP
pub fn pull(cpu: &mut InternalCpu, memory: &SharedBus) -> u8 {
    let data = memory.borrow_mut().read(cpu.sp);
    log::trace!("Pull from SP ${:0>4X} - {data:0>2X}", cpu.sp);
    cpu.sp = cpu.sp.wrapping_add(1);
    data
}

fn push_word(cpu: &mut InternalCpu, word: u16, memory: &SharedBus) {
    let (low, high) = split_word(word);
    push(cpu, high, memory);
    push(cpu, low, memory);
}

fn pull_word(cpu: &mut InternalCpu, memory: &SharedBus) -> u16 {
    let low = pull(cpu, memory);
    let high = pull(cpu, memory);
    join_word(low, high)
}

/// PUSH r - Push register on stack
pub fn push_register(cpu: &mut InternalCpu, register: Register, memory: &SharedBus) {
    let data = cpu.register(register);
    push(cpu, data, memory);
}

/// POP r - Pull register from stack. Flags are not affected.
pub fn pop_register(cpu: &mut InternalCpu, register: Register, memory: &SharedBus) {
    *cpu.register_mut(register) = pull(cpu, memory);
}

/// SET_SP - Load stack pointer with a literal address
pub fn set_sp(cpu: &mut InternalCpu, address: u16) {
    cpu.sp = address;
}

// Interrupts

/// Interrupt entry
///
/// Operation:
/// push PCH, push PCL, push SR, push A, handler -> PC
pub fn interrupt(cpu: &mut InternalCpu, handler: u16, memory: &SharedBus) {
    let (pc, sr, a) = (cpu.pc, cpu.sr.into(), cpu.a);
    push_word(cpu, pc, memory);
    push(cpu, sr, memory);
    push(cpu, a, memory);
    cpu.pc = handler;
}

/// IRET - Return from interrupt
///
/// Operation:
/// pull A, pull SR, pull PCL, pull PCH
///
/// Status Register
/// Z C
/// from stack
pub fn iret(cpu: &mut InternalCpu, memory: &SharedBus) {
    cpu.a = pull(cpu, memory);
    cpu.sr = StatusRegister::from(pull(cpu, memory));
    cpu.pc = pull_word(cpu, memory);
}

// Other

/// NOP - No Operation
pub fn nop(_: &mut InternalCpu) {}
