use std::cell::RefCell;
use std::rc::Rc;

use crate::interfaces::Bus;
use crate::interrupts::InterruptController;
use crate::processor::bus::MemoryBus;

pub type SharedBus = Rc<RefCell<dyn Bus>>;
pub type SharedMemoryBus = Rc<RefCell<MemoryBus>>;
pub type SharedInterruptController = Rc<RefCell<InterruptController>>;
