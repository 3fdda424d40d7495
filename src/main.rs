use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use log::info;

use sim16::devices::console::ConsoleEvent;
use sim16::hardware::{port_address, CONSOLE_SLOT};
use sim16::opcodes::*;
use sim16::{CompiledProgram, LoadTarget, MachineRuntime, MachineSettings, RunState};

const RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Print a greeting on the console and exit
fn hello_world() -> Vec<u8> {
    let [low, high] = port_address(CONSOLE_SLOT, 0).to_le_bytes();
    let mut bytes = Vec::new();
    for c in "Hello from sim16!\n".bytes() {
        bytes.extend([MOV_A_IMM, c, MOV_MEM_A, low, high]);
    }
    bytes.extend([SYSCALL, 0]);
    bytes
}

fn main() -> Result<()> {
    env_logger::init();

    // optional raw ROM image, loaded at the reset vector
    let image = match std::env::args().nth(1) {
        Some(path) => std::fs::read(&path).with_context(|| format!("reading ROM image {path}"))?,
        None => hello_world(),
    };

    let settings = MachineSettings {
        clock_frequency: 1000,
        ..Default::default()
    };
    let runtime = MachineRuntime::start(settings)?;
    let console = runtime.console();

    runtime.load_program(CompiledProgram::from_bytes(0, &image), LoadTarget::Rom, 0)?;
    runtime.start_clock()?;

    let started = Instant::now();
    loop {
        while let Ok(event) = console.try_recv() {
            match event {
                ConsoleEvent::Char(c) => print!("{c}"),
                ConsoleEvent::Cleared => println!(),
            }
        }
        std::io::stdout().flush()?;

        let state = runtime.snapshot()?;
        if state.cpu.run_state == RunState::Halted {
            info!("Program halted after {} cycles", state.cycles);
            break;
        }
        if started.elapsed() > RUN_TIMEOUT {
            bail!("program still running after {RUN_TIMEOUT:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    runtime.shutdown()?;
    Ok(())
}
