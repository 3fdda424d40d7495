//! sim16 errors
//!
//! All errors the machine can produce. [`MachineError`] values never stop
//! the machine: they are reported as diagnostics and execution continues.

use thiserror::Error;

/// Machine diagnostics
///
/// Runtime faults caused by the running program. Each one has a defined,
/// deterministic recovery and is reported through
/// [`Diagnostics`](crate::diagnostics::Diagnostics).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("Write to read-only memory at ${address:0>4X} (value ${data:0>2X}) rejected")]
    WriteToReadOnly { address: u16, data: u8 },

    #[error("Unknown port {port} on device {device} (I/O offset ${offset:0>2X})")]
    UnknownPort { device: u8, port: u8, offset: u16 },

    #[error("RAM capacity of {capacity} entries exceeded, evicted ${evicted:0>4X}")]
    StorageOverflow { capacity: usize, evicted: u16 },

    #[error("DMA transfer of {size} bytes to ${target:0>4X} does not fit in RAM")]
    DmaOutOfRange { target: u16, size: u32 },

    #[error("Unrecognized opcode ${opcode:0>2X} at ${address:0>4X}")]
    UnrecognizedOpcode { opcode: u8, address: u16 },

    #[error("IRET at ${address:0>4X} outside an interrupt handler")]
    InvalidInterruptReturn { address: u16 },

    #[error("Unsupported system call {number} at ${address:0>4X}")]
    UnsupportedSyscall { number: u8, address: u16 },
}

/// Device port errors, mapped to [`MachineError::UnknownPort`] by the
/// devices manager once the device slot is known
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("port {0} is not readable")]
    NotReadable(u8),

    #[error("port {0} is not writable")]
    NotWritable(u8),
}

/// Machine assembly errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Memory map regions overlap at ${address:0>4X}")]
    OverlappingRegions { address: u16 },

    #[error("Memory map leaves ${address:0>4X} unmapped")]
    UnmappedAddress { address: u16 },

    #[error("Memory region '{region}' has start ${start:0>4X} after end ${end:0>4X}")]
    InvertedRange {
        region: &'static str,
        start: u16,
        end: u16,
    },

    #[error("Device slot {slot} already taken by '{device}'")]
    AlreadyAttached { slot: u8, device: &'static str },

    #[error("Device slot {slot} is out of range (max {max})")]
    InvalidSlot { slot: u8, max: u8 },

    #[error("IRQ line {irq} is out of range (max {max})")]
    InvalidIrq { irq: u8, max: u8 },
}

/// Program loading errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Program entry ${address:0>4X} (+{offset}) falls outside {target} of {size} bytes")]
    OutOfBounds {
        target: &'static str,
        address: u16,
        offset: u16,
        size: usize,
    },
}

/// Threaded runtime errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Machine worker is not running")]
    WorkerGone,

    #[error("Machine worker failed to start: {0}")]
    Startup(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Machine worker panicked")]
    WorkerPanicked,
}
