//! Threaded machine runtime
//!
//! The [`Machine`] is not thread safe. [`MachineRuntime`] spawns one worker
//! thread that builds the machine and owns it for its whole life: clock
//! ticks, RTC refreshes and commands all arrive on channels and are handled
//! one at a time by that thread, so two turns never overlap.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::clock::Clock;
use crate::devices::console::ConsoleEvent;
use crate::errors::{LoadError, MachineError, RuntimeError};
use crate::machine::{Machine, MachineState};
use crate::metrics::Collector;
use crate::processor::bus::LoadTarget;
use crate::processor::cpu::RunState;
use crate::program::CompiledProgram;
use crate::settings::MachineSettings;

const RTC_REFRESH_PERIOD: Duration = Duration::from_secs(1);
const METRICS_PERIOD: Duration = Duration::from_secs(5);

pub enum Command {
    /// Reset the machine and resume the clock if it was started
    Reset,
    /// Run a single machine turn, whether the clock runs or not
    Step,
    StartClock,
    StopClock,
    SetFrequency(u32),
    Load {
        program: CompiledProgram,
        target: LoadTarget,
        offset: u16,
        reply: Sender<Result<(), LoadError>>,
    },
    LoadDiskImage(Vec<u8>),
    Snapshot(Sender<MachineState>),
    Shutdown,
}

pub struct MachineRuntime {
    commands: Sender<Command>,
    keyboard: Sender<char>,
    console: Receiver<ConsoleEvent>,
    diagnostics: Receiver<MachineError>,
    worker: Option<JoinHandle<()>>,
}

impl MachineRuntime {
    /// Spawn the worker and build the machine on it. The clock stays stopped
    /// until [`MachineRuntime::start_clock`].
    pub fn start(settings: MachineSettings) -> Result<Self, RuntimeError> {
        let (commands, command_receiver) = unbounded();
        let (keyboard, keyboard_receiver) = unbounded();
        let (console_sender, console) = unbounded();
        let (diagnostics_sender, diagnostics) = unbounded();
        let (ready, ready_receiver) = bounded(1);

        let keyboard_ptr = keyboard.clone();
        let worker = thread::Builder::new()
            .name("sim16-machine".to_string())
            .spawn(move || {
                let mut machine =
                    match Machine::with_keyboard(settings, (keyboard_ptr, keyboard_receiver)) {
                        Ok(machine) => machine,
                        Err(error) => {
                            let _ = ready.send(Err(error));
                            return;
                        }
                    };

                machine.subscribe_console(move |event| {
                    let _ = console_sender.send(*event);
                });
                machine
                    .diagnostics()
                    .subscribe(move |error| {
                        let _ = diagnostics_sender.send(error.clone());
                    });

                let _ = ready.send(Ok(()));
                Worker::new(machine, command_receiver).run();
            })
            .map_err(|error| RuntimeError::Startup(error.to_string()))?;

        match ready_receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                let _ = worker.join();
                return Err(RuntimeError::Config(error));
            }
            Err(_) => {
                let _ = worker.join();
                return Err(RuntimeError::WorkerPanicked);
            }
        }

        info!("Machine runtime started");
        Ok(Self {
            commands,
            keyboard,
            console,
            diagnostics,
            worker: Some(worker),
        })
    }

    fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands
            .send(command)
            .map_err(|_| RuntimeError::WorkerGone)
    }

    pub fn reset(&self) -> Result<(), RuntimeError> {
        self.send(Command::Reset)
    }

    pub fn step(&self) -> Result<(), RuntimeError> {
        self.send(Command::Step)
    }

    pub fn start_clock(&self) -> Result<(), RuntimeError> {
        self.send(Command::StartClock)
    }

    pub fn stop_clock(&self) -> Result<(), RuntimeError> {
        self.send(Command::StopClock)
    }

    /// Change the clock rate. A running clock is restarted at the new rate.
    pub fn set_frequency(&self, frequency: u32) -> Result<(), RuntimeError> {
        self.send(Command::SetFrequency(frequency))
    }

    pub fn load_program(
        &self,
        program: CompiledProgram,
        target: LoadTarget,
        offset: u16,
    ) -> Result<(), RuntimeError> {
        let (reply, result) = bounded(1);
        self.send(Command::Load {
            program,
            target,
            offset,
            reply,
        })?;
        result.recv().map_err(|_| RuntimeError::WorkerGone)??;
        Ok(())
    }

    pub fn load_disk_image(&self, image: Vec<u8>) -> Result<(), RuntimeError> {
        self.send(Command::LoadDiskImage(image))
    }

    /// Machine state once every command sent before has been handled
    pub fn snapshot(&self) -> Result<MachineState, RuntimeError> {
        let (reply, state) = bounded(1);
        self.send(Command::Snapshot(reply))?;
        state.recv().map_err(|_| RuntimeError::WorkerGone)
    }

    pub fn press_key(&self, key: char) -> Result<(), RuntimeError> {
        self.keyboard
            .send(key)
            .map_err(|_| RuntimeError::WorkerGone)
    }

    /// Sender feeding the machine keyboard, usable from any thread
    pub fn keyboard(&self) -> Sender<char> {
        self.keyboard.clone()
    }

    /// Console output as the program writes it
    pub fn console(&self) -> Receiver<ConsoleEvent> {
        self.console.clone()
    }

    pub fn diagnostics(&self) -> Receiver<MachineError> {
        self.diagnostics.clone()
    }

    /// Stop the worker and wait for it to exit
    pub fn shutdown(mut self) -> Result<(), RuntimeError> {
        self.join()
    }

    fn join(&mut self) -> Result<(), RuntimeError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        // the worker may be gone already
        let _ = self.commands.send(Command::Shutdown);
        worker.join().map_err(|_| RuntimeError::WorkerPanicked)?;
        info!("Machine runtime stopped");
        Ok(())
    }
}

impl Drop for MachineRuntime {
    fn drop(&mut self) {
        if let Err(error) = self.join() {
            error!("{error}");
        }
    }
}

/// Worker side of the runtime, lives on the machine thread
struct Worker {
    machine: Machine,
    clock: Clock,
    ticks: Receiver<u64>,
    commands: Receiver<Command>,
    // clock requested by the user, paused while the CPU is halted
    clock_enabled: bool,
    collector: Collector,
}

impl Worker {
    fn new(machine: Machine, commands: Receiver<Command>) -> Self {
        let clock = Clock::new(machine.settings().clock_frequency);
        let ticks = clock.subscribe();
        Self {
            machine,
            clock,
            ticks,
            commands,
            clock_enabled: false,
            collector: Collector::new(),
        }
    }

    fn run(mut self) {
        let ticks = self.ticks.clone();
        let commands = self.commands.clone();
        let rtc = tick(RTC_REFRESH_PERIOD);
        let metrics = tick(METRICS_PERIOD);

        loop {
            select! {
                recv(ticks) -> _ => self.turn(),
                recv(rtc) -> _ => self.machine.refresh_rtc(),
                recv(metrics) -> _ => {
                    let collected = self.collector.collect();
                    info!(
                        "{} ticks/s, {} instructions/s",
                        collected.ticks_per_second, collected.instructions_per_second
                    );
                }
                recv(commands) -> command => match command {
                    Ok(Command::Shutdown) | Err(_) => break,
                    Ok(command) => self.handle(command),
                },
            }
        }

        self.clock.stop();
        debug!("Machine worker exiting after {} cycles", self.machine.cycles());
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Reset => {
                self.machine.reset();
                if self.clock_enabled {
                    self.start_clock();
                }
            }
            Command::Step => self.turn(),
            Command::StartClock => {
                self.clock_enabled = true;
                self.start_clock();
            }
            Command::StopClock => {
                self.clock_enabled = false;
                self.stop_clock();
            }
            Command::SetFrequency(frequency) => {
                self.clock.set_frequency(frequency);
                self.stop_clock();
                if self.clock_enabled {
                    self.start_clock();
                }
            }
            Command::Load {
                program,
                target,
                offset,
                reply,
            } => {
                let result = self.machine.load_program(&program, target, offset);
                let _ = reply.send(result);
            }
            Command::LoadDiskImage(image) => self.machine.load_disk_image(&image),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.machine.state());
            }
            Command::Shutdown => {}
        }
    }

    fn turn(&mut self) {
        if self.machine.is_halted() {
            return;
        }

        let before = self.machine.cpu().steps();
        let state = self.machine.tick();
        self.collector
            .observe_tick(self.machine.cpu().steps() - before);

        if state == RunState::Halted {
            info!("Machine halted after {} cycles", self.machine.cycles());
            self.stop_clock();
        }
    }

    fn start_clock(&mut self) {
        if !self.machine.is_halted() {
            self.clock.start();
        }
    }

    /// Stop the clock and drop ticks it already queued
    fn stop_clock(&mut self) {
        self.clock.stop();
        while self.ticks.try_recv().is_ok() {}
    }
}
