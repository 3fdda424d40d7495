pub mod bus;
pub mod cpu;
pub mod memory;


mod instruction;
pub mod instruction_set;
mod internal_cpu;
mod status_register;
