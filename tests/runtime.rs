use std::time::{Duration, Instant};

use sim16::devices::console::ConsoleEvent;
use sim16::devices::keyboard;
use sim16::errors::{ConfigError, LoadError, MachineError, RuntimeError};
use sim16::hardware::*;
use sim16::opcodes::*;
use sim16::settings::{DeviceKind, DeviceSlot};
use sim16::{CompiledProgram, LoadTarget, MachineRuntime, MachineSettings, MachineState, RunState};

const WAIT: Duration = Duration::from_secs(5);

fn fast_settings() -> MachineSettings {
    MachineSettings {
        reset_vector: 0x0000,
        clock_frequency: 1000,
        instructions_per_tick: 4,
        ..Default::default()
    }
}

fn runtime_with_program(program: &[u8]) -> MachineRuntime {
    let runtime = MachineRuntime::start(fast_settings()).unwrap();
    runtime
        .load_program(CompiledProgram::from_bytes(0, program), LoadTarget::Ram, 0)
        .unwrap();
    runtime
}

fn wait_for_halt(runtime: &MachineRuntime) -> MachineState {
    let started = Instant::now();
    loop {
        let state = runtime.snapshot().unwrap();
        if state.cpu.run_state == RunState::Halted {
            return state;
        }
        assert!(started.elapsed() < WAIT, "machine did not halt: {state:?}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_steps_without_clock() {
    let runtime = runtime_with_program(&[INC_A, INC_A, INC_A, HALT]);

    assert_eq!(runtime.snapshot().unwrap().cpu.a, 0);
    runtime.step().unwrap();

    // four instructions per tick: INC_A x3 then HALT
    let state = runtime.snapshot().unwrap();
    assert_eq!(state.cycles, 1);
    assert_eq!(state.cpu.a, 3);
    assert_eq!(state.cpu.run_state, RunState::Halted);

    runtime.shutdown().unwrap();
}

#[test]
fn test_clock_runs_program_to_halt() {
    let [low, high] = port_address(CONSOLE_SLOT, 0).to_le_bytes();
    let mut program = Vec::new();
    for c in "hey".bytes() {
        program.extend([MOV_A_IMM, c, MOV_MEM_A, low, high]);
    }
    program.extend([SYSCALL, 0]);

    let runtime = runtime_with_program(&program);
    let console = runtime.console();
    runtime.start_clock().unwrap();

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(console.recv_timeout(WAIT).unwrap());
    }
    assert_eq!(
        received,
        vec![
            ConsoleEvent::Char('h'),
            ConsoleEvent::Char('e'),
            ConsoleEvent::Char('y')
        ]
    );

    let state = wait_for_halt(&runtime);
    assert_eq!(state.console, "hey");
    runtime.shutdown().unwrap();
}

#[test]
fn test_key_press_reaches_polling_program() {
    let [status_low, status_high] =
        port_address(KEYBOARD_SLOT, keyboard::STATUS_PORT).to_le_bytes();
    let [data_low, data_high] = port_address(KEYBOARD_SLOT, keyboard::DATA_PORT).to_le_bytes();
    let [console_low, console_high] = port_address(CONSOLE_SLOT, 0).to_le_bytes();
    let runtime = runtime_with_program(&[
        // wait: until status has a char
        MOV_A_MEM, status_low, status_high,
        AND_IMM, 0x01,
        JZ, 0x00, 0x00,
        MOV_A_MEM, data_low, data_high,
        MOV_MEM_A, console_low, console_high,
        HALT,
    ]);

    runtime.start_clock().unwrap();
    runtime.press_key('z').unwrap();

    let state = wait_for_halt(&runtime);
    assert_eq!(state.console, "z");
    runtime.shutdown().unwrap();
}

#[test]
fn test_reset_resumes_a_halted_machine() {
    let runtime = runtime_with_program(&[INC_B, HALT]);
    runtime.start_clock().unwrap();
    assert_eq!(wait_for_halt(&runtime).cpu.b, 1);

    runtime.reset().unwrap();
    let state = wait_for_halt(&runtime);
    // registers were cleared by the reset, so B counts from zero again
    assert_eq!(state.cpu.b, 1);
    runtime.shutdown().unwrap();
}

#[test]
fn test_frequency_change_while_running() {
    let [low, high] = 0u16.to_le_bytes();
    let runtime = runtime_with_program(&[NOP, JMP, low, high]);
    runtime.start_clock().unwrap();
    runtime.set_frequency(500).unwrap();

    std::thread::sleep(Duration::from_millis(50));
    let before = runtime.snapshot().unwrap().cycles;
    std::thread::sleep(Duration::from_millis(100));
    let after = runtime.snapshot().unwrap().cycles;
    assert!(after > before);

    runtime.stop_clock().unwrap();
    let stopped = runtime.snapshot().unwrap().cycles;
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(runtime.snapshot().unwrap().cycles, stopped);

    runtime.shutdown().unwrap();
}

#[test]
fn test_zero_frequency_pauses_until_a_new_rate() {
    let [low, high] = 0u16.to_le_bytes();
    let runtime = runtime_with_program(&[NOP, JMP, low, high]);
    runtime.start_clock().unwrap();
    runtime.set_frequency(0).unwrap();

    let paused = runtime.snapshot().unwrap().cycles;
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(runtime.snapshot().unwrap().cycles, paused);

    runtime.set_frequency(500).unwrap();
    let started = Instant::now();
    while runtime.snapshot().unwrap().cycles == paused {
        assert!(started.elapsed() < WAIT, "clock did not resume");
        std::thread::sleep(Duration::from_millis(5));
    }

    runtime.shutdown().unwrap();
}

#[test]
fn test_diagnostics_are_forwarded() {
    let runtime = runtime_with_program(&[0xFF, HALT]);
    let diagnostics = runtime.diagnostics();
    runtime.step().unwrap();

    assert_eq!(
        diagnostics.recv_timeout(WAIT).unwrap(),
        MachineError::UnrecognizedOpcode {
            opcode: 0xFF,
            address: 0x0000
        }
    );
    runtime.shutdown().unwrap();
}

#[test]
fn test_invalid_configuration_fails_startup() {
    let mut settings = fast_settings();
    settings.devices.push(DeviceSlot {
        slot: DEVICE_SLOTS,
        kind: DeviceKind::Console,
        irq: None,
    });

    assert!(matches!(
        MachineRuntime::start(settings),
        Err(RuntimeError::Config(ConfigError::InvalidSlot { .. }))
    ));
}

#[test]
fn test_program_outside_rom_is_refused() {
    let runtime = MachineRuntime::start(fast_settings()).unwrap();
    let rom_size = (ROM_END - ROM_START) + 1;
    let program = CompiledProgram::from_bytes(rom_size - 1, &[NOP, NOP]);

    assert!(matches!(
        runtime.load_program(program, LoadTarget::Rom, 0),
        Err(RuntimeError::Load(LoadError::OutOfBounds { .. }))
    ));
    runtime.shutdown().unwrap();
}
