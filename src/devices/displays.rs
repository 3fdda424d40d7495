//! Output displays
//!
//! Only the port protocol lives here: what the program writes and what it
//! can read back. Drawing the state is up to whoever calls `state()`.

use crate::errors::DeviceError;
use crate::interfaces::IoDevice;

// LEDs
// ----

pub const LEDS_PORT: u8 = 0;

/// Row of 8 LEDs, one bit each
#[derive(Default)]
pub struct LedsDisplay {
    leds: u8,
}

impl LedsDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> u8 {
        self.leds
    }
}

impl IoDevice for LedsDisplay {
    fn name(&self) -> &'static str {
        "LEDs"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        match port {
            LEDS_PORT => Ok(self.leds),
            _ => Err(DeviceError::NotReadable(port)),
        }
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        match port {
            LEDS_PORT => {
                self.leds = data;
                Ok(())
            }
            _ => Err(DeviceError::NotWritable(port)),
        }
    }

    fn reset(&mut self) {
        self.leds = 0;
    }
}

// Pixel display
// -------------

pub const PIXEL_X_PORT: u8 = 0;
pub const PIXEL_Y_PORT: u8 = 1;
pub const PIXEL_COLOR_PORT: u8 = 2;
pub const PIXEL_CLEAR_PORT: u8 = 3;

pub const PIXEL_DISPLAY_WIDTH: usize = 32;
pub const PIXEL_DISPLAY_HEIGHT: usize = 32;

/// Framebuffer of one colour byte per pixel. Coordinates wrap around the
/// display size.
pub struct PixelDisplay {
    x: u8,
    y: u8,
    pixels: Vec<u8>,
}

impl PixelDisplay {
    pub fn new() -> Self {
        Self {
            x: 0,
            y: 0,
            pixels: vec![0; PIXEL_DISPLAY_WIDTH * PIXEL_DISPLAY_HEIGHT],
        }
    }

    fn index(&self) -> usize {
        let x = self.x as usize % PIXEL_DISPLAY_WIDTH;
        let y = self.y as usize % PIXEL_DISPLAY_HEIGHT;
        y * PIXEL_DISPLAY_WIDTH + x
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[(y % PIXEL_DISPLAY_HEIGHT) * PIXEL_DISPLAY_WIDTH + x % PIXEL_DISPLAY_WIDTH]
    }

    pub fn state(&self) -> &[u8] {
        &self.pixels
    }
}

impl Default for PixelDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDevice for PixelDisplay {
    fn name(&self) -> &'static str {
        "Pixel display"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        match port {
            PIXEL_X_PORT => Ok(self.x),
            PIXEL_Y_PORT => Ok(self.y),
            PIXEL_COLOR_PORT => Ok(self.pixels[self.index()]),
            _ => Err(DeviceError::NotReadable(port)),
        }
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        match port {
            PIXEL_X_PORT => self.x = data,
            PIXEL_Y_PORT => self.y = data,
            PIXEL_COLOR_PORT => {
                let index = self.index();
                self.pixels[index] = data;
            }
            PIXEL_CLEAR_PORT => self.pixels.fill(0),
            _ => return Err(DeviceError::NotWritable(port)),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.x = 0;
        self.y = 0;
        self.pixels.fill(0);
    }

    fn size(&self) -> Option<usize> {
        Some(self.pixels.len())
    }
}

// Character LCD
// -------------

pub const LCD_COMMAND_PORT: u8 = 0;
pub const LCD_DATA_PORT: u8 = 1;
pub const LCD_CURSOR_PORT: u8 = 2;

pub const LCD_CLEAR: u8 = 0x01;
pub const LCD_HOME: u8 = 0x02;

pub const LCD_ROWS: usize = 2;
pub const LCD_COLUMNS: usize = 16;

/// 2x16 character LCD with an auto-advancing cursor
pub struct LcdDisplay {
    cells: [u8; LCD_ROWS * LCD_COLUMNS],
    cursor: usize,
}

impl LcdDisplay {
    pub fn new() -> Self {
        Self {
            cells: [b' '; LCD_ROWS * LCD_COLUMNS],
            cursor: 0,
        }
    }

    pub fn line(&self, row: usize) -> String {
        let start = (row % LCD_ROWS) * LCD_COLUMNS;
        self.cells[start..start + LCD_COLUMNS]
            .iter()
            .map(|byte| *byte as char)
            .collect()
    }

    pub fn state(&self) -> Vec<String> {
        (0..LCD_ROWS).map(|row| self.line(row)).collect()
    }
}

impl Default for LcdDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDevice for LcdDisplay {
    fn name(&self) -> &'static str {
        "LCD"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        match port {
            LCD_CURSOR_PORT => Ok(self.cursor as u8),
            LCD_DATA_PORT => Ok(self.cells[self.cursor]),
            _ => Err(DeviceError::NotReadable(port)),
        }
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        match port {
            LCD_COMMAND_PORT => match data {
                LCD_CLEAR => self.reset(),
                LCD_HOME => self.cursor = 0,
                _ => return Err(DeviceError::NotWritable(port)),
            },
            LCD_DATA_PORT => {
                self.cells[self.cursor] = data;
                self.cursor = (self.cursor + 1) % self.cells.len();
            }
            LCD_CURSOR_PORT => self.cursor = data as usize % self.cells.len(),
            _ => return Err(DeviceError::NotWritable(port)),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.cells.fill(b' ');
        self.cursor = 0;
    }
}

// Seven segment display
// ---------------------

pub const SEGMENT_DIGIT_PORT: u8 = 0;
pub const SEGMENT_RAW_PORT: u8 = 1;

/// Segment patterns (gfedcba) for hexadecimal digits
pub const SEGMENT_PATTERNS: [u8; 16] = [
    0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F, 0x77, 0x7C, 0x39, 0x5E, 0x79, 0x71,
];

#[derive(Default)]
pub struct SevenSegmentDisplay {
    digit: u8,
    segments: u8,
}

impl SevenSegmentDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lit segments, bit 0 is segment a
    pub fn state(&self) -> u8 {
        self.segments
    }
}

impl IoDevice for SevenSegmentDisplay {
    fn name(&self) -> &'static str {
        "Seven segment display"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        match port {
            SEGMENT_DIGIT_PORT => Ok(self.digit),
            SEGMENT_RAW_PORT => Ok(self.segments),
            _ => Err(DeviceError::NotReadable(port)),
        }
    }

    fn write(&mut self, port: u8, data: u8) -> Result<(), DeviceError> {
        match port {
            SEGMENT_DIGIT_PORT => {
                self.digit = data & 0x0F;
                self.segments = SEGMENT_PATTERNS[self.digit as usize];
            }
            SEGMENT_RAW_PORT => self.segments = data,
            _ => return Err(DeviceError::NotWritable(port)),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.digit = 0;
        self.segments = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leds() {
        let mut leds = LedsDisplay::new();
        leds.write(LEDS_PORT, 0b1010_0101).unwrap();
        assert_eq!(leds.read(LEDS_PORT), Ok(0b1010_0101));
        assert_eq!(leds.state(), 0b1010_0101);
        assert!(leds.write(1, 0).is_err());
    }

    #[test]
    fn test_pixel_display_colour_at_coordinates() {
        let mut display = PixelDisplay::new();
        display.write(PIXEL_X_PORT, 3).unwrap();
        display.write(PIXEL_Y_PORT, 4).unwrap();
        display.write(PIXEL_COLOR_PORT, 0xE0).unwrap();

        assert_eq!(display.pixel(3, 4), 0xE0);
        assert_eq!(display.read(PIXEL_COLOR_PORT), Ok(0xE0));

        // coordinates wrap around the display
        display.write(PIXEL_X_PORT, 3 + PIXEL_DISPLAY_WIDTH as u8).unwrap();
        assert_eq!(display.read(PIXEL_COLOR_PORT), Ok(0xE0));

        display.write(PIXEL_CLEAR_PORT, 0).unwrap();
        assert_eq!(display.pixel(3, 4), 0);
    }

    #[test]
    fn test_lcd_writes_advance_cursor() {
        let mut lcd = LcdDisplay::new();
        for byte in b"HELLO" {
            lcd.write(LCD_DATA_PORT, *byte).unwrap();
        }
        assert_eq!(lcd.line(0), "HELLO           ");
        assert_eq!(lcd.read(LCD_CURSOR_PORT), Ok(5));

        lcd.write(LCD_CURSOR_PORT, LCD_COLUMNS as u8).unwrap();
        lcd.write(LCD_DATA_PORT, b'!').unwrap();
        assert_eq!(lcd.line(1), "!               ");

        lcd.write(LCD_COMMAND_PORT, LCD_HOME).unwrap();
        assert_eq!(lcd.read(LCD_DATA_PORT), Ok(b'H'));

        lcd.write(LCD_COMMAND_PORT, LCD_CLEAR).unwrap();
        assert_eq!(lcd.state(), vec![" ".repeat(16), " ".repeat(16)]);
    }

    #[test]
    fn test_seven_segment_digits() {
        let mut display = SevenSegmentDisplay::new();
        display.write(SEGMENT_DIGIT_PORT, 8).unwrap();
        assert_eq!(display.state(), 0x7F);
        display.write(SEGMENT_DIGIT_PORT, 0x0F).unwrap();
        assert_eq!(display.state(), 0x71);
        assert_eq!(display.read(SEGMENT_DIGIT_PORT), Ok(0x0F));

        display.write(SEGMENT_RAW_PORT, 0b0100_0000).unwrap();
        assert_eq!(display.state(), 0b0100_0000);
    }
}
