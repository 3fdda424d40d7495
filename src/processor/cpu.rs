
use log::{debug, info};

use crate::diagnostics::Diagnostics;
use crate::errors::MachineError;
use crate::events::Observers;
use crate::processor::instruction::{
    AddressingMode, ControlKind, InstructionKind, MiscInstructionKind,
};
use crate::processor::instruction_set::{self, InstructionSet, INSTRUCTION_SET};
use crate::processor::internal_cpu::InternalCpu;
use crate::processor::status_register::StatusRegisterFlag;
use crate::types::{SharedBus, SharedInterruptController};
use crate::utils::join_word;

use AddressingMode::*;
use InstructionKind::*;
use MiscInstructionKind::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Halted,
}

/// Register file and run state snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuState {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub pc: u16,
    pub sp: u16,
    pub ir: u8,
    pub flags: u8,
    pub carry: bool,
    pub zero: bool,
    pub run_state: RunState,
    pub in_handler: bool,
}

enum Operand {
    None,
    Byte(u8),
    Address(u16),
}

/// sim16 processor.
///
/// The CPU is the only component issuing bus reads and writes. After every
/// instruction it polls the interrupt controller and, when a line is ready
/// to be serviced, saves PC, FLAGS and A on the stack and jumps to the
/// handler vector.
pub struct Cpu {
    cpu: InternalCpu,
    run_state: RunState,
    bus: SharedBus,
    interrupts: SharedInterruptController,
    diagnostics: Diagnostics,
    instruction_set: &'static InstructionSet,

    // set between interrupt entry and IRET
    in_handler: bool,

    reset_vector: u16,
    stack_pointer: u16,

    steps: u64,
    observers: Observers<CpuState>,
}

impl Cpu {
    pub fn new(
        bus: SharedBus,
        interrupts: SharedInterruptController,
        diagnostics: Diagnostics,
        reset_vector: u16,
        stack_pointer: u16,
    ) -> Self {
        let mut cpu = Self {
            cpu: InternalCpu::default(),
            run_state: RunState::Running,
            bus,
            interrupts,
            diagnostics,
            instruction_set: &INSTRUCTION_SET,
            in_handler: false,
            reset_vector,
            stack_pointer,
            steps: 0,
            observers: Observers::new(),
        };
        cpu.reset();
        cpu
    }

    /// Back to power-on state: registers and flags cleared, PC at the reset
    /// vector and SP at the configured stack top.
    pub fn reset(&mut self) {
        self.cpu = InternalCpu {
            pc: self.reset_vector,
            sp: self.stack_pointer,
            ..Default::default()
        };
        self.run_state = RunState::Running;
        self.in_handler = false;
        debug!(
            "CPU reset, PC=${:0>4X} SP=${:0>4X}",
            self.reset_vector, self.stack_pointer
        );
    }

    /// Execute one instruction and poll for interrupts. Does nothing while
    /// halted.
    pub fn step(&mut self) -> RunState {
        if self.run_state == RunState::Halted {
            return RunState::Halted;
        }

        self.execute();
        self.poll_interrupts();
        self.steps += 1;

        if !self.observers.is_empty() {
            let state = self.state();
            self.observers.notify(&state);
        }

        self.run_state
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_halted(&self) -> bool {
        self.run_state == RunState::Halted
    }

    pub fn in_handler(&self) -> bool {
        self.in_handler
    }

    /// Instructions executed since creation
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc
    }

    pub fn state(&self) -> CpuState {
        CpuState {
            a: self.cpu.a,
            b: self.cpu.b,
            c: self.cpu.c,
            d: self.cpu.d,
            pc: self.cpu.pc,
            sp: self.cpu.sp,
            ir: self.cpu.ir,
            flags: self.cpu.sr.into(),
            carry: self.cpu.sr.get(StatusRegisterFlag::Carry),
            zero: self.cpu.sr.get(StatusRegisterFlag::Zero),
            run_state: self.run_state,
            in_handler: self.in_handler,
        }
    }

    /// Get notified with the CPU state after every step
    pub fn subscribe(&mut self, observer: impl FnMut(&CpuState) + 'static) {
        self.observers.subscribe(observer);
    }

    fn read(&self, address: u16) -> u8 {
        self.bus.borrow_mut().read(address)
    }

    fn write(&self, address: u16, data: u8) {
        self.bus.borrow_mut().write(address, data);
    }

    fn fetch(&mut self) -> u8 {
        let data = self.read(self.cpu.pc);
        self.cpu.pc = self.cpu.pc.wrapping_add(1);
        data
    }

    fn fetch_operand(&mut self, addressing_mode: AddressingMode) -> Operand {
        match addressing_mode {
            Implied => Operand::None,
            Immediate => Operand::Byte(self.fetch()),
            Absolute => {
                let low = self.fetch();
                let high = self.fetch();
                Operand::Address(join_word(low, high))
            }
        }
    }

    fn execute(&mut self) {
        let address = self.cpu.pc;
        let opcode = self.fetch();
        self.cpu.ir = opcode;

        let instruction_set = self.instruction_set;
        let Some(instruction) = instruction_set.lookup(opcode) else {
            self.diagnostics
                .report(MachineError::UnrecognizedOpcode { opcode, address });
            return;
        };

        let operand = self.fetch_operand(instruction.addressing_mode);
        debug!("${address:0>4X}: {} ({opcode:0>2X})", instruction.name);

        match (&instruction.instruction, operand) {
            (SingleByte(instruction), _) => instruction(&mut self.cpu),
            (InternalExecOnMemoryData(instruction), Operand::Byte(value)) => {
                instruction(&mut self.cpu, value)
            }
            (InternalExecOnMemoryData(instruction), Operand::Address(address)) => {
                let value = self.read(address);
                instruction(&mut self.cpu, value);
            }
            (StoreOp(instruction), Operand::Address(address)) => {
                let value = instruction(&self.cpu);
                self.write(address, value);
            }
            (Misc(Push(instruction)), _) => instruction(&mut self.cpu, &self.bus),
            (Misc(Pull(instruction)), _) => instruction(&mut self.cpu, &self.bus),
            (Misc(Jump(instruction)), Operand::Address(address)) => {
                instruction(&mut self.cpu, address)
            }
            (Misc(Call(instruction)), Operand::Address(address)) => {
                instruction(&mut self.cpu, address, &self.bus)
            }
            (Misc(Return(instruction)), _) => instruction(&mut self.cpu, &self.bus),
            (Control(kind), operand) => self.control(*kind, address, operand),
            _ => unreachable!(
                "{} encoded with an operand it does not take",
                instruction.name
            ),
        }
    }

    fn control(&mut self, kind: ControlKind, address: u16, operand: Operand) {
        match kind {
            ControlKind::Halt => self.halt(address),
            ControlKind::Syscall => {
                let number = match operand {
                    Operand::Byte(number) => number,
                    _ => 0,
                };
                match number {
                    0 => self.halt(address),
                    _ => self
                        .diagnostics
                        .report(MachineError::UnsupportedSyscall { number, address }),
                }
            }
            ControlKind::EnableInterrupts => self.interrupts.borrow_mut().set_global_enable(true),
            ControlKind::DisableInterrupts => {
                self.interrupts.borrow_mut().set_global_enable(false)
            }
            ControlKind::ReturnFromInterrupt => {
                if !self.in_handler {
                    self.diagnostics
                        .report(MachineError::InvalidInterruptReturn { address });
                    return;
                }
                instruction_set::iret(&mut self.cpu, &self.bus);
                self.in_handler = false;
                debug!("Returned from interrupt to ${:0>4X}", self.cpu.pc);
            }
        }
    }

    fn halt(&mut self, address: u16) {
        info!("CPU halted at ${address:0>4X}");
        self.run_state = RunState::Halted;
    }

    /// Dispatch the next ready interrupt line, if any. Runs only at
    /// instruction boundaries and never while a handler is running.
    fn poll_interrupts(&mut self) {
        if self.run_state == RunState::Halted || self.in_handler {
            return;
        }

        let next = self.interrupts.borrow_mut().begin_service();
        if let Some((irq, handler)) = next {
            debug!(
                "Servicing IRQ {irq}: PC=${:0>4X} -> handler ${handler:0>4X}",
                self.cpu.pc
            );
            instruction_set::interrupt(&mut self.cpu, handler, &self.bus);
            self.in_handler = true;
        }
    }
}
