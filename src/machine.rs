//! sim16 machine
//!
//! Assembles the CPU, the memory bus, the devices and the interrupt
//! controller into one machine. Building happens in two phases: every
//! component is constructed first, then IRQ lines and shared handles are
//! wired between them.
//!
//! A [`Machine`] is single threaded. [`Machine::tick`] is one atomic turn
//! of the whole machine; the threaded
//! [`MachineRuntime`](crate::runtime::MachineRuntime) feeds it clock ticks.
use std::cell::RefCell;
use std::rc::Rc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};

use crate::devices::buzzer::{Buzzer, BuzzerState};
use crate::devices::console::{Console, ConsoleEvent};
use crate::devices::displays::{LcdDisplay, LedsDisplay, PixelDisplay, SevenSegmentDisplay};
use crate::devices::disk::StorageDisk;
use crate::devices::keyboard::Keyboard;
use crate::devices::rng::Rng;
use crate::devices::rtc::Rtc;
use crate::devices::timer::Timer;
use crate::devices::{Device, DevicesManager};
use crate::diagnostics::Diagnostics;
use crate::dma::DmaController;
use crate::errors::{ConfigError, LoadError};
use crate::hardware::IRQ_LINES;
use crate::interfaces::IoDevice;
use crate::interrupts::{InterruptController, InterruptLine, InterruptPorts, InterruptState};
use crate::processor::bus::{LoadTarget, MemoryBus};
use crate::processor::cpu::{Cpu, CpuState, RunState};
use crate::program::CompiledProgram;
use crate::settings::{DeviceKind, MachineSettings};
use crate::types::{SharedInterruptController, SharedMemoryBus};

/// Whole machine snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineState {
    pub cpu: CpuState,
    pub interrupts: InterruptState,
    pub cycles: u64,
    pub console: String,
    pub leds: Option<u8>,
    pub seven_segment: Option<u8>,
    pub lcd: Option<Vec<String>>,
    pub buzzer: Option<BuzzerState>,
}

pub struct Machine {
    settings: MachineSettings,

    // clock ticks seen since the last reset
    cycles: u64,

    cpu: Cpu,
    bus: SharedMemoryBus,
    interrupts: SharedInterruptController,
    diagnostics: Diagnostics,

    keyboard: Sender<char>,
}

impl Machine {
    pub fn new(settings: MachineSettings) -> Result<Self, ConfigError> {
        Self::with_keyboard(settings, unbounded())
    }

    /// Build a machine whose keyboard reads from `keyboard`. The sender half
    /// is kept so [`Machine::press_key`] keeps working.
    pub fn with_keyboard(
        settings: MachineSettings,
        keyboard: (Sender<char>, Receiver<char>),
    ) -> Result<Self, ConfigError> {
        let (keyboard_sender, keyboard_receiver) = keyboard;
        let diagnostics = Diagnostics::new();
        let interrupts = Rc::new(RefCell::new(InterruptController::new()));

        // Phase 1: construct every device
        // ----------------------------------------------------------------------------------------

        let mut devices = DevicesManager::new();
        for slot in settings.devices.iter() {
            let device = match slot.kind {
                DeviceKind::InterruptController => {
                    Device::Interrupts(InterruptPorts::new(Rc::clone(&interrupts)))
                }
                DeviceKind::Timer => Device::Timer(Timer::new()),
                DeviceKind::Rtc => Device::Rtc(Rtc::new()),
                DeviceKind::Rng => Device::Rng(Rng::new(settings.rng_seed)),
                DeviceKind::Keyboard => Device::Keyboard(Keyboard::new(keyboard_receiver.clone())),
                DeviceKind::Console => Device::Console(Console::new()),
                DeviceKind::LedsDisplay => Device::Leds(LedsDisplay::new()),
                DeviceKind::PixelDisplay => Device::Pixels(PixelDisplay::new()),
                DeviceKind::LcdDisplay => Device::Lcd(LcdDisplay::new()),
                DeviceKind::SevenSegmentDisplay => {
                    Device::SevenSegment(SevenSegmentDisplay::new())
                }
                DeviceKind::StorageDisk => Device::Disk(StorageDisk::new()),
                DeviceKind::Buzzer => Device::Buzzer(Buzzer::new()),
                DeviceKind::Dma => Device::Dma(DmaController::new()),
            };
            devices.register(slot.slot, device)?;
        }

        // Phase 2: wire IRQ lines
        // ----------------------------------------------------------------------------------------

        for slot in settings.devices.iter() {
            let Some(irq) = slot.irq else {
                continue;
            };
            if irq >= IRQ_LINES {
                return Err(ConfigError::InvalidIrq {
                    irq,
                    max: IRQ_LINES - 1,
                });
            }

            let line = InterruptLine::new(Rc::clone(&interrupts), irq);
            match devices.device_mut(slot.slot) {
                Some(Device::Timer(timer)) => timer.connect_interrupt(line),
                Some(Device::Keyboard(keyboard)) => keyboard.connect_interrupt(line),
                Some(Device::Dma(dma)) => dma.connect_interrupt(line),
                Some(device) => {
                    warn!(
                        "Device '{}' on slot {} cannot raise interrupts, IRQ {irq} left unconnected",
                        device.name(),
                        slot.slot
                    );
                    continue;
                }
                None => continue,
            }
            debug!("IRQ {irq} wired to slot {}", slot.slot);
        }

        let bus = Rc::new(RefCell::new(MemoryBus::new(
            settings.memory_map,
            settings.ram_capacity,
            devices,
            diagnostics.clone(),
        )));

        let cpu = Cpu::new(
            bus.clone(),
            Rc::clone(&interrupts),
            diagnostics.clone(),
            settings.reset_vector,
            settings.stack_pointer,
        );

        info!(
            "Machine assembled with {} devices, reset vector ${:0>4X}",
            settings.devices.len(),
            settings.reset_vector
        );

        Ok(Self {
            settings,
            cycles: 0,
            cpu,
            bus,
            interrupts,
            diagnostics,
            keyboard: keyboard_sender,
        })
    }

    /// One machine turn: devices tick once, then the CPU runs
    /// `instructions_per_tick` steps, each followed by an interrupt poll.
    pub fn tick(&mut self) -> RunState {
        self.cycles += 1;
        self.bus.borrow_mut().tick();

        for _ in 0..self.settings.instructions_per_tick {
            if self.cpu.step() == RunState::Halted {
                break;
            }
        }
        self.cpu.run_state()
    }

    /// Tick until the CPU halts or `max_ticks` ticks went by
    pub fn run_until_halt(&mut self, max_ticks: u64) -> RunState {
        for _ in 0..max_ticks {
            if self.tick() == RunState::Halted {
                break;
            }
        }
        self.cpu.run_state()
    }

    /// Reset devices, interrupt state and CPU. Memory contents survive, as
    /// does the interrupt handler vector.
    pub fn reset(&mut self) {
        info!("Machine reset");
        self.bus.borrow_mut().reset();
        self.interrupts.borrow_mut().reset();
        self.cpu.reset();
        self.cycles = 0;
    }

    pub fn load_program(
        &mut self,
        program: &CompiledProgram,
        target: LoadTarget,
        offset: u16,
    ) -> Result<(), LoadError> {
        if program.has_errors() {
            warn!("Loading a program that was compiled with errors");
        }
        self.bus.borrow_mut().load_program(program, target, offset)
    }

    /// Replace the contents of every storage disk
    pub fn load_disk_image(&mut self, image: &[u8]) {
        let mut bus = self.bus.borrow_mut();
        for device in bus.devices_mut().devices_mut() {
            if let Device::Disk(disk) = device {
                disk.load_image(image);
            }
        }
    }

    /// Latch the host time into every RTC
    pub fn refresh_rtc(&mut self) {
        let mut bus = self.bus.borrow_mut();
        for device in bus.devices_mut().devices_mut() {
            if let Device::Rtc(rtc) = device {
                rtc.refresh();
            }
        }
    }

    /// Feed a key press to the keyboard. Delivered on the next tick.
    pub fn press_key(&self, key: char) {
        // the receiver lives in the keyboard device we own
        let _ = self.keyboard.send(key);
    }

    pub fn keyboard(&self) -> Sender<char> {
        self.keyboard.clone()
    }

    /// Get notified of everything written to the console
    pub fn subscribe_console(&mut self, observer: impl FnMut(&ConsoleEvent) + 'static) {
        let mut bus = self.bus.borrow_mut();
        let console = bus
            .devices_mut()
            .devices_mut()
            .find_map(|device| match device {
                Device::Console(console) => Some(console),
                _ => None,
            });
        match console {
            Some(console) => console.subscribe(observer),
            None => warn!("No console attached, console observer dropped"),
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus(&self) -> SharedMemoryBus {
        Rc::clone(&self.bus)
    }

    pub fn interrupts(&self) -> SharedInterruptController {
        Rc::clone(&self.interrupts)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    pub fn state(&self) -> MachineState {
        let bus = self.bus.borrow();
        let devices = bus.devices();
        let console = devices
            .devices()
            .find_map(|device| match device {
                Device::Console(console) => Some(console.text().to_string()),
                _ => None,
            })
            .unwrap_or_default();
        let leds = devices.devices().find_map(|device| match device {
            Device::Leds(leds) => Some(leds.state()),
            _ => None,
        });
        let seven_segment = devices.devices().find_map(|device| match device {
            Device::SevenSegment(display) => Some(display.state()),
            _ => None,
        });
        let lcd = devices.devices().find_map(|device| match device {
            Device::Lcd(lcd) => Some(lcd.state()),
            _ => None,
        });
        let buzzer = devices.devices().find_map(|device| match device {
            Device::Buzzer(buzzer) => Some(buzzer.state()),
            _ => None,
        });

        MachineState {
            cpu: self.cpu.state(),
            interrupts: self.interrupts.borrow().state(),
            cycles: self.cycles,
            console,
            leds,
            seven_segment,
            lcd,
            buzzer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::*;
    use crate::processor::instruction_set::opcodes::*;
    use crate::settings::DeviceSlot;

    fn settings_with_ram_reset() -> MachineSettings {
        MachineSettings {
            reset_vector: 0x0000,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_machine_assembles() {
        let machine = Machine::new(MachineSettings::default()).unwrap();
        let state = machine.state();

        assert_eq!(state.cpu.pc, RESET_VECTOR);
        assert_eq!(state.cpu.sp, STACK_POINTER_START);
        assert_eq!(state.cycles, 0);
        assert_eq!(state.console, "");
        assert_eq!(state.leds, Some(0));
        assert!(state.buzzer.is_some());
    }

    #[test]
    fn test_duplicate_slot_is_rejected() {
        let mut settings = MachineSettings::default();
        settings.devices.push(DeviceSlot {
            slot: TIMER_SLOT,
            kind: DeviceKind::Console,
            irq: None,
        });

        assert!(matches!(
            Machine::new(settings),
            Err(ConfigError::AlreadyAttached { slot: TIMER_SLOT, .. })
        ));
    }

    #[test]
    fn test_invalid_irq_is_rejected() {
        let mut settings = MachineSettings::default();
        settings.devices[1].irq = Some(IRQ_LINES);

        assert!(matches!(
            Machine::new(settings),
            Err(ConfigError::InvalidIrq { .. })
        ));
    }

    #[test]
    fn test_tick_runs_instructions_per_tick_steps() {
        let settings = MachineSettings {
            instructions_per_tick: 3,
            ..settings_with_ram_reset()
        };
        let mut machine = Machine::new(settings).unwrap();
        let program = CompiledProgram::from_bytes(0, &[NOP, NOP, NOP, NOP, HALT]);
        machine.load_program(&program, LoadTarget::Ram, 0).unwrap();

        assert_eq!(machine.tick(), RunState::Running);
        assert_eq!(machine.cpu().pc(), 3);
        assert_eq!(machine.cycles(), 1);

        // halting stops the remaining steps of the turn
        assert_eq!(machine.tick(), RunState::Halted);
        assert_eq!(machine.cpu().pc(), 5);
    }

    #[test]
    fn test_run_until_halt_gives_up_after_max_ticks() {
        let mut machine = Machine::new(settings_with_ram_reset()).unwrap();
        let program = CompiledProgram::from_bytes(0, &[JMP, 0x00, 0x00]);
        machine.load_program(&program, LoadTarget::Ram, 0).unwrap();

        assert_eq!(machine.run_until_halt(10), RunState::Running);
        assert_eq!(machine.cycles(), 10);
    }

    #[test]
    fn test_reset_restarts_program_and_keeps_memory() {
        let mut machine = Machine::new(settings_with_ram_reset()).unwrap();
        let program = CompiledProgram::from_bytes(0, &[MOV_A_IMM, 7, MOV_MEM_A, 0x80, 0x00, HALT]);
        machine.load_program(&program, LoadTarget::Ram, 0).unwrap();

        assert_eq!(machine.run_until_halt(100), RunState::Halted);
        machine.reset();

        let state = machine.state();
        assert_eq!(state.cpu.run_state, RunState::Running);
        assert_eq!(state.cpu.pc, 0);
        assert_eq!(state.cpu.a, 0);
        assert_eq!(state.cycles, 0);
        assert_eq!(machine.bus().borrow().ram().read(0x80), 7);
    }

    #[test]
    fn test_console_output_and_observer() {
        let mut machine = Machine::new(settings_with_ram_reset()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_ptr = Rc::clone(&seen);
        machine.subscribe_console(move |event| seen_ptr.borrow_mut().push(*event));

        let [low, high] = port_address(CONSOLE_SLOT, 0).to_le_bytes();
        let program = CompiledProgram::from_bytes(
            0,
            &[MOV_A_IMM, b'h', MOV_MEM_A, low, high, MOV_A_IMM, b'i', MOV_MEM_A, low, high, HALT],
        );
        machine.load_program(&program, LoadTarget::Ram, 0).unwrap();
        machine.run_until_halt(100);

        assert_eq!(machine.state().console, "hi");
        assert_eq!(
            *seen.borrow(),
            vec![ConsoleEvent::Char('h'), ConsoleEvent::Char('i')]
        );
    }

    #[test]
    fn test_key_press_reaches_keyboard_port() {
        let mut machine = Machine::new(settings_with_ram_reset()).unwrap();
        let [low, high] = port_address(KEYBOARD_SLOT, 0).to_le_bytes();
        let program = CompiledProgram::from_bytes(0, &[MOV_A_MEM, low, high, HALT]);
        machine.load_program(&program, LoadTarget::Ram, 0).unwrap();

        machine.press_key('x');
        machine.run_until_halt(10);

        assert_eq!(machine.state().cpu.a, b'x');
    }

    #[test]
    fn test_timer_irq_is_wired() {
        let mut machine = Machine::new(settings_with_ram_reset()).unwrap();
        {
            let bus = machine.bus();
            let mut bus = bus.borrow_mut();
            let devices = bus.devices_mut();
            // period 2, enabled
            devices.write_port(TIMER_SLOT, 2, 2).unwrap();
            devices.write_port(TIMER_SLOT, 1, 1).unwrap();
        }
        let program = CompiledProgram::from_bytes(0, &[NOP, NOP, NOP, NOP, HALT]);
        machine.load_program(&program, LoadTarget::Ram, 0).unwrap();

        machine.tick();
        assert_eq!(machine.interrupts().borrow().request_count(TIMER_IRQ), 0);
        machine.tick();
        assert_eq!(machine.interrupts().borrow().request_count(TIMER_IRQ), 1);
    }

    #[test]
    fn test_load_disk_image_feeds_every_disk() {
        let mut machine = Machine::new(MachineSettings::default()).unwrap();
        machine.load_disk_image(&[1, 2, 3]);

        let bus = machine.bus();
        let bus = bus.borrow();
        match bus.devices().device(DISK_SLOT) {
            Some(Device::Disk(disk)) => {
                assert_eq!(&disk.image()[..3], &[1, 2, 3]);
                assert!(disk.image()[3..].iter().all(|byte| *byte == 0));
            }
            _ => panic!("no disk on slot {DISK_SLOT}"),
        }
    }
}
