//! sim16 hardware constants
//!
//! Default layout of the machine. The core never reads these directly: they
//! seed [`MemoryMap::default`](crate::settings::MemoryMap) and the default
//! device slot table in [`MachineSettings`](crate::settings::MachineSettings).

// Main bus
// --------
//
// 16-bit address space partitioned into RAM, ROM and memory-mapped I/O. The
// three regions are disjoint and cover every address.

// Memory - 48 kB RAM holding programs, data and the stack
pub const RAM_START: u16 = 0x0000;
pub const RAM_END: u16 = 0xBFFF;

// Read-only memory, reset vector points at its first byte
pub const ROM_START: u16 = 0xC000;
pub const ROM_END: u16 = 0xFEFF;

// I/O - 16 device slots of 16 ports each
pub const IO_START: u16 = 0xFF00;
pub const IO_END: u16 = 0xFFFF;

pub const PORTS_PER_DEVICE: u16 = 16;
pub const DEVICE_SLOTS: u8 = 16;

// Stack grows downwards, STACK_END is the first byte written by a push
pub const STACK_END: u16 = RAM_END;
pub const STACK_POINTER_START: u16 = STACK_END.wrapping_add(1);

pub const RESET_VECTOR: u16 = ROM_START;

// Device slots
// ------------

pub const INTERRUPT_CONTROLLER_SLOT: u8 = 0;
pub const TIMER_SLOT: u8 = 1;
pub const RTC_SLOT: u8 = 2;
pub const RNG_SLOT: u8 = 3;
pub const KEYBOARD_SLOT: u8 = 4;
pub const CONSOLE_SLOT: u8 = 5;
pub const LEDS_SLOT: u8 = 6;
pub const PIXEL_DISPLAY_SLOT: u8 = 7;
pub const LCD_SLOT: u8 = 8;
pub const SEVEN_SEGMENT_SLOT: u8 = 9;
pub const DISK_SLOT: u8 = 10;
pub const BUZZER_SLOT: u8 = 11;
pub const DMA_SLOT: u8 = 12;

// IRQ lines
pub const IRQ_LINES: u8 = 8;
pub const TIMER_IRQ: u8 = 0;
pub const KEYBOARD_IRQ: u8 = 1;
pub const DMA_IRQ: u8 = 2;

/// Absolute bus address of `port` on device `slot` for the default layout
pub const fn port_address(slot: u8, port: u8) -> u16 {
    IO_START + (slot as u16) * PORTS_PER_DEVICE + port as u16
}

// Interrupt controller registers
pub const INTERRUPT_ENABLE: u16 = port_address(INTERRUPT_CONTROLLER_SLOT, 0);
pub const INTERRUPT_PENDING: u16 = port_address(INTERRUPT_CONTROLLER_SLOT, 1);
pub const INTERRUPT_ACK: u16 = port_address(INTERRUPT_CONTROLLER_SLOT, 2);
pub const INTERRUPT_HANDLER_LOW: u16 = port_address(INTERRUPT_CONTROLLER_SLOT, 3);
pub const INTERRUPT_HANDLER_HIGH: u16 = port_address(INTERRUPT_CONTROLLER_SLOT, 4);
pub const INTERRUPT_GLOBAL: u16 = port_address(INTERRUPT_CONTROLLER_SLOT, 5);

// Timer registers
pub const TIMER_COUNTER: u16 = port_address(TIMER_SLOT, 0);
pub const TIMER_CONTROL: u16 = port_address(TIMER_SLOT, 1);
pub const TIMER_PRESCALER: u16 = port_address(TIMER_SLOT, 2);
pub const TIMER_TICK: u16 = port_address(TIMER_SLOT, 3);

// Clock
// -----

pub const DEFAULT_CLOCK_FREQUENCY: u32 = 100;
pub const DEFAULT_INSTRUCTIONS_PER_TICK: u32 = 1;
