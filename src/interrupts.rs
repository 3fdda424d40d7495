//! Interrupt controller
//!
//! Eight IRQ lines, each one in one of three states:
//!
//! ```text
//!            request           CPU dispatch             ACK write
//!   Idle  ------------>  Pending  ------------>  Servicing  ------------> Idle
//! ```
//!
//! A pending line is dispatched when global interrupts are enabled, its
//! enable bit is set and no other line is being serviced. Ties are broken by
//! the lowest IRQ number. Only one line can be in service at a time: nesting
//! is not supported.

use std::rc::Rc;

use log::debug;

use crate::errors::DeviceError;
use crate::hardware::IRQ_LINES;
use crate::interfaces::IoDevice;
use crate::types::SharedInterruptController;
use crate::utils::{join_word, split_word};

pub const ENABLE_PORT: u8 = 0;
pub const PENDING_PORT: u8 = 1;
pub const ACK_PORT: u8 = 2;
pub const HANDLER_LOW_PORT: u8 = 3;
pub const HANDLER_HIGH_PORT: u8 = 4;
pub const GLOBAL_ENABLE_PORT: u8 = 5;

/// Value read from the ACK port while no line is in service
pub const NO_IRQ: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IrqState {
    #[default]
    Idle,
    Pending,
    Servicing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptState {
    pub lines: [IrqState; IRQ_LINES as usize],
    pub enable_mask: u8,
    pub global_enable: bool,
    pub handler: u16,
}

#[derive(Default)]
pub struct InterruptController {
    lines: [IrqState; IRQ_LINES as usize],
    requests: [u32; IRQ_LINES as usize],
    enable_mask: u8,
    global_enable: bool,
    handler: u16,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device side request on line `irq`. Lines already pending stay
    /// pending; a request on the line in service is dropped.
    pub fn request_interrupt(&mut self, irq: u8) {
        let Some(line) = self.lines.get_mut(irq as usize) else {
            debug!("Ignoring request on invalid IRQ line {irq}");
            return;
        };

        self.requests[irq as usize] = self.requests[irq as usize].saturating_add(1);
        match line {
            IrqState::Idle => {
                debug!("IRQ {irq} pending");
                *line = IrqState::Pending;
            }
            IrqState::Pending => {}
            IrqState::Servicing => {
                debug!("IRQ {irq} requested while in service, dropped");
            }
        }
    }

    /// Clear the pending or in-service state of line `irq`
    pub fn acknowledge(&mut self, irq: u8) {
        match self.lines.get_mut(irq as usize) {
            Some(line) => {
                debug!("IRQ {irq} acknowledged ({line:?} -> Idle)");
                *line = IrqState::Idle;
            }
            None => debug!("Ignoring ACK for invalid IRQ line {irq}"),
        }
    }

    /// Line that would be dispatched right now, if any
    pub fn next_to_service(&self) -> Option<u8> {
        if !self.global_enable || self.servicing().is_some() {
            return None;
        }
        (0..IRQ_LINES).find(|&irq| {
            self.lines[irq as usize] == IrqState::Pending && self.enable_mask & (1 << irq) != 0
        })
    }

    /// Move the next dispatchable line into service. Returns the line and the
    /// handler vector the CPU must jump to.
    pub fn begin_service(&mut self) -> Option<(u8, u16)> {
        let irq = self.next_to_service()?;
        self.lines[irq as usize] = IrqState::Servicing;
        debug!("IRQ {irq} in service, handler ${:0>4X}", self.handler);
        Some((irq, self.handler))
    }

    pub fn servicing(&self) -> Option<u8> {
        (0..IRQ_LINES).find(|&irq| self.lines[irq as usize] == IrqState::Servicing)
    }

    pub fn line(&self, irq: u8) -> IrqState {
        self.lines
            .get(irq as usize)
            .copied()
            .unwrap_or(IrqState::Idle)
    }

    /// Number of device requests seen on line `irq`
    pub fn request_count(&self, irq: u8) -> u32 {
        self.requests.get(irq as usize).copied().unwrap_or(0)
    }

    pub fn pending_mask(&self) -> u8 {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, state)| **state == IrqState::Pending)
            .fold(0, |mask, (irq, _)| mask | (1 << irq))
    }

    pub fn enable_mask(&self) -> u8 {
        self.enable_mask
    }

    pub fn set_enable_mask(&mut self, mask: u8) {
        self.enable_mask = mask;
    }

    pub fn global_enabled(&self) -> bool {
        self.global_enable
    }

    pub fn set_global_enable(&mut self, enable: bool) {
        self.global_enable = enable;
    }

    pub fn handler(&self) -> u16 {
        self.handler
    }

    pub fn set_handler(&mut self, handler: u16) {
        self.handler = handler;
    }

    /// Clear every pending and in-service line, enable bits and the global
    /// enable. The handler vector survives.
    pub fn reset(&mut self) {
        self.lines = Default::default();
        self.requests = Default::default();
        self.enable_mask = 0;
        self.global_enable = false;
    }

    pub fn state(&self) -> InterruptState {
        InterruptState {
            lines: self.lines,
            enable_mask: self.enable_mask,
            global_enable: self.global_enable,
            handler: self.handler,
        }
    }
}

/// Handle given to a device so it can raise its own IRQ line
#[derive(Clone)]
pub struct InterruptLine {
    controller: SharedInterruptController,
    irq: u8,
}

impl InterruptLine {
    pub fn new(controller: SharedInterruptController, irq: u8) -> Self {
        Self { controller, irq }
    }

    pub fn irq(&self) -> u8 {
        self.irq
    }

    pub fn raise(&self) {
        self.controller.borrow_mut().request_interrupt(self.irq);
    }
}

/// Port view of the interrupt controller, so programs can configure it
/// through the I/O region
pub struct InterruptPorts {
    controller: SharedInterruptController,
}

impl InterruptPorts {
    pub fn new(controller: SharedInterruptController) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> SharedInterruptController {
        Rc::clone(&self.controller)
    }
}

impl IoDevice for InterruptPorts {
    fn name(&self) -> &'static str {
        "Interrupt controller"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        let controller = self.controller.borrow();
        let data = match port {
            ENABLE_PORT => controller.enable_mask(),
            PENDING_PORT => controller.pending_mask(),
            ACK_PORT => controller.servicing().unwrap_or(NO_IRQ),
            HANDLER_LOW_PORT => split_word(controller.handler()).0,
            HANDLER_HIGH_PORT => split_word(controller.handler()).1,
            GLOBAL_ENABLE_PORT => controller.global_enabled() as u8,
            _ => return Err(DeviceError::NotReadable(port)),
        };
        Ok(data)
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        let mut controller = self.controller.borrow_mut();
        match port {
            ENABLE_PORT => controller.set_enable_mask(data),
            ACK_PORT => controller.acknowledge(data),
            HANDLER_LOW_PORT => {
                let (_, high) = split_word(controller.handler());
                controller.set_handler(join_word(data, high));
            }
            HANDLER_HIGH_PORT => {
                let (low, _) = split_word(controller.handler());
                controller.set_handler(join_word(low, data));
            }
            GLOBAL_ENABLE_PORT => controller.set_global_enable(data & 1 != 0),
            _ => return Err(DeviceError::NotWritable(port)),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.controller.borrow_mut().reset();
    }
}
