use log::debug;

use crate::errors::DeviceError;
use crate::events::Observers;
use crate::interfaces::IoDevice;

pub const CHAR_PORT: u8 = 0;
pub const CLEAR_PORT: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleEvent {
    Char(char),
    Cleared,
}

/// Character output console
pub struct Console {
    text: String,
    last: u8,
    observers: Observers<ConsoleEvent>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            last: 0,
            observers: Observers::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&ConsoleEvent) + 'static) {
        self.observers.subscribe(observer);
    }

    fn clear(&mut self) {
        self.text.clear();
        self.last = 0;
        self.observers.notify(&ConsoleEvent::Cleared);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDevice for Console {
    fn name(&self) -> &'static str {
        "Console"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        match port {
            CHAR_PORT => Ok(self.last),
            _ => Err(DeviceError::NotReadable(port)),
        }
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        match port {
            CHAR_PORT => {
                let c = data as char;
                debug!("Console output {c:?}");
                self.text.push(c);
                self.last = data;
                self.observers.notify(&ConsoleEvent::Char(c));
            }
            CLEAR_PORT => self.clear(),
            _ => return Err(DeviceError::NotWritable(port)),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_console_output_and_clear() {
        let mut console = Console::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let events_ptr = Rc::clone(&events);
        console.subscribe(move |event| events_ptr.borrow_mut().push(*event));

        for byte in b"Hi!" {
            console.write(CHAR_PORT, *byte).unwrap();
        }
        assert_eq!(console.text(), "Hi!");
        assert_eq!(console.read(CHAR_PORT), Ok(b'!'));

        console.write(CLEAR_PORT, 0).unwrap();
        assert_eq!(console.text(), "");
        assert_eq!(
            *events.borrow(),
            vec![
                ConsoleEvent::Char('H'),
                ConsoleEvent::Char('i'),
                ConsoleEvent::Char('!'),
                ConsoleEvent::Cleared
            ]
        );
    }

    #[test]
    fn test_console_unknown_port() {
        let mut console = Console::new();
        assert_eq!(console.write(2, 0), Err(DeviceError::NotWritable(2)));
        assert_eq!(console.read(CLEAR_PORT), Err(DeviceError::NotReadable(CLEAR_PORT)));
    }
}
