use std::cell::RefCell;
use std::rc::Rc;

use sim16::dma;
use sim16::errors::MachineError;
use sim16::hardware::*;
use sim16::interrupts::IrqState;
use sim16::opcodes::*;
use sim16::{CompiledProgram, LoadTarget, Machine, MachineSettings, RunState};

const HANDLER: u16 = 0x0100;

fn machine_with_program(program: &[u8]) -> Machine {
    let settings = MachineSettings {
        reset_vector: 0x0000,
        ..Default::default()
    };
    let mut machine = Machine::new(settings).unwrap();
    machine
        .load_program(&CompiledProgram::from_bytes(0, program), LoadTarget::Ram, 0)
        .unwrap();
    machine
}

fn store(address: u16, value: u8) -> [u8; 5] {
    let [low, high] = address.to_le_bytes();
    [MOV_A_IMM, value, MOV_MEM_A, low, high]
}

fn ram(machine: &Machine, address: u16) -> u8 {
    machine.bus().borrow().ram().read(address)
}

#[test]
fn test_store_then_load_back() {
    let mut machine = machine_with_program(&[
        MOV_A_IMM, 42, MOV_MEM_A, 0x80, 0x00, MOV_A_IMM, 0, MOV_A_MEM, 0x80, 0x00, SYSCALL, 0,
    ]);

    assert_eq!(machine.run_until_halt(100), RunState::Halted);
    assert_eq!(machine.state().cpu.a, 42);
    assert_eq!(ram(&machine, 0x0080), 42);
}

#[test]
fn test_conditional_jump_skips_increment() {
    // MOV_A_IMM 0; JZ skip; INC_A; HALT; skip: MOV_A_IMM 100; HALT
    let mut machine = machine_with_program(&[
        MOV_A_IMM, 0, JZ, 0x07, 0x00, INC_A, HALT, MOV_A_IMM, 100, HALT,
    ]);

    assert_eq!(machine.run_until_halt(100), RunState::Halted);
    assert_eq!(machine.state().cpu.a, 100);
}

#[test]
fn test_program_in_rom_runs_from_reset_vector() {
    let mut machine = Machine::new(MachineSettings::default()).unwrap();
    let program = CompiledProgram::from_bytes(0, &[MOV_B_IMM, 9, INC_B, HALT]);
    machine.load_program(&program, LoadTarget::Rom, 0).unwrap();

    assert_eq!(machine.run_until_halt(100), RunState::Halted);
    let state = machine.state();
    assert_eq!(state.cpu.b, 10);
    assert_eq!(state.cpu.pc, ROM_START + 4);
}

#[test]
fn test_rom_is_immutable_from_programs() {
    let mut machine = Machine::new(MachineSettings::default()).unwrap();
    let [low, high] = (ROM_START + 1).to_le_bytes();
    // overwrite our own operand byte, then read it back
    let program = CompiledProgram::from_bytes(
        0,
        &[MOV_B_IMM, 7, MOV_A_IMM, 99, MOV_MEM_A, low, high, MOV_C_MEM, low, high, HALT],
    );
    machine.load_program(&program, LoadTarget::Rom, 0).unwrap();

    machine.run_until_halt(100);
    assert_eq!(machine.state().cpu.c, 7);
    assert_eq!(
        machine.diagnostics().last(),
        Some(MachineError::WriteToReadOnly {
            address: ROM_START + 1,
            data: 99
        })
    );
}

#[test]
fn test_console_leds_and_seven_segment() {
    let mut program = Vec::new();
    program.extend(store(port_address(CONSOLE_SLOT, 0), b'o'));
    program.extend(store(port_address(CONSOLE_SLOT, 0), b'k'));
    program.extend(store(port_address(LEDS_SLOT, 0), 0b1010_0101));
    program.extend(store(port_address(SEVEN_SEGMENT_SLOT, 0), 0x0F));
    program.push(HALT);
    let mut machine = machine_with_program(&program);

    machine.run_until_halt(100);
    let state = machine.state();
    assert_eq!(state.console, "ok");
    assert_eq!(state.leds, Some(0b1010_0101));
    assert_eq!(state.seven_segment, Some(0x71));
}

#[test]
fn test_unknown_device_reads_zero() {
    let [low, high] = port_address(15, 0).to_le_bytes();
    let mut machine = machine_with_program(&[MOV_A_IMM, 5, MOV_A_MEM, low, high, HALT]);

    machine.run_until_halt(100);
    assert_eq!(machine.state().cpu.a, 0);
    assert!(matches!(
        machine.diagnostics().last(),
        Some(MachineError::UnknownPort { device: 15, .. })
    ));
}

#[test]
fn test_dma_copies_disk_block_into_ram() {
    let dma_port = |port| port_address(DMA_SLOT, port);
    let mut program = Vec::new();
    program.extend(store(dma_port(dma::DEVICE_PORT), DISK_SLOT));
    program.extend(store(dma_port(dma::SOURCE_START_LOW_PORT), 0x20));
    program.extend(store(dma_port(dma::SOURCE_START_HIGH_PORT), 0x00));
    program.extend(store(dma_port(dma::SOURCE_END_LOW_PORT), 0x27));
    program.extend(store(dma_port(dma::SOURCE_END_HIGH_PORT), 0x00));
    program.extend(store(dma_port(dma::TARGET_LOW_PORT), 0x00));
    program.extend(store(dma_port(dma::TARGET_HIGH_PORT), 0x40));
    program.extend(store(dma_port(dma::TRIGGER_PORT), 1));
    program.push(HALT);

    let mut machine = machine_with_program(&program);
    let image: Vec<u8> = (0..=255u8).map(|i| i.wrapping_mul(3)).collect();
    machine.load_disk_image(&image);

    assert_eq!(machine.run_until_halt(100), RunState::Halted);
    for i in 0..8u16 {
        assert_eq!(ram(&machine, 0x4000 + i), image[0x20 + i as usize]);
    }
    assert_eq!(ram(&machine, 0x4008), 0);
    // transfer completion raised the DMA line
    assert_eq!(machine.interrupts().borrow().line(DMA_IRQ), IrqState::Pending);
}

/// Install an IRQ handler counting in B, program the timer with `period`
/// and spin
fn timer_program(enable_mask: u8, period: u8) -> Machine {
    let mut program = Vec::new();
    program.extend(store(INTERRUPT_HANDLER_LOW, HANDLER.to_le_bytes()[0]));
    program.extend(store(INTERRUPT_HANDLER_HIGH, HANDLER.to_le_bytes()[1]));
    program.extend(store(INTERRUPT_ENABLE, enable_mask));
    program.extend(store(TIMER_PRESCALER, period));
    program.extend(store(TIMER_CONTROL, 1));
    program.push(EI);
    let spin = program.len() as u16;
    let [low, high] = spin.to_le_bytes();
    program.extend([NOP, JMP, low, high]);

    let mut machine = machine_with_program(&program);
    let [ack_low, ack_high] = INTERRUPT_ACK.to_le_bytes();
    let handler = CompiledProgram::from_bytes(
        0,
        &[INC_B, MOV_A_MEM, ack_low, ack_high, MOV_MEM_A, ack_low, ack_high, IRET],
    );
    machine
        .load_program(&handler, LoadTarget::Ram, HANDLER)
        .unwrap();
    machine
}

#[test]
fn test_timer_interrupts_are_serviced() {
    let mut machine = timer_program(0b1, 10);

    assert_eq!(machine.run_until_halt(200), RunState::Running);
    let state = machine.state();
    assert!(state.cpu.b >= 10, "serviced {} timer interrupts", state.cpu.b);
    assert!(machine.diagnostics().history().is_empty());
}

#[test]
fn test_masked_timer_never_diverts_the_program() {
    let mut machine = timer_program(0b10, 5);
    let pcs = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&pcs);
    machine
        .cpu_mut()
        .subscribe(move |state| sink.borrow_mut().push(state.pc));

    machine.run_until_halt(200);

    assert_eq!(machine.state().cpu.b, 0);
    assert!(pcs.borrow().iter().all(|pc| *pc < HANDLER));
    assert!(machine.interrupts().borrow().request_count(TIMER_IRQ) > 0);
    assert_eq!(machine.interrupts().borrow().line(TIMER_IRQ), IrqState::Pending);
}

#[test]
fn test_reset_keeps_handler_vector() {
    let mut machine = timer_program(0b1, 10);
    machine.run_until_halt(50);
    machine.reset();

    let state = machine.state();
    assert_eq!(state.interrupts.handler, HANDLER);
    assert_eq!(state.interrupts.enable_mask, 0);
    assert!(!state.interrupts.global_enable);
    assert!(state
        .interrupts
        .lines
        .iter()
        .all(|line| *line == IrqState::Idle));
}
