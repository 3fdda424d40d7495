//! sim16: a small 16-bit computer emulator

pub mod clock;
pub mod devices;
pub mod diagnostics;
pub mod dma;
pub mod errors;
pub mod events;
pub mod hardware;
pub mod interfaces;
pub mod interrupts;
pub mod machine;
pub mod metrics;
pub mod processor;
pub mod program;
pub mod runtime;
pub mod settings;
pub mod types;
mod utils;

pub use machine::{Machine, MachineState};
pub use processor::bus::LoadTarget;
pub use processor::cpu::{CpuState, RunState};
pub use processor::instruction_set::opcodes;
pub use program::CompiledProgram;
pub use runtime::MachineRuntime;
pub use settings::MachineSettings;
