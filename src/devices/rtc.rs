//! Real time clock
//!
//! Latches the host wall clock. The latch is refreshed once a second by the
//! runtime and whenever the program writes to the refresh port, so all the
//! date fields read back are consistent with each other.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::DeviceError;
use crate::interfaces::IoDevice;

pub const REFRESH_PORT: u8 = 0;
pub const YEAR_PORT: u8 = 1;
pub const MONTH_PORT: u8 = 2;
pub const DAY_PORT: u8 = 3;
pub const HOURS_PORT: u8 = 4;
pub const MINUTES_PORT: u8 = 5;
pub const SECONDS_PORT: u8 = 6;
pub const TIMESTAMP_PORT_START: u8 = 7;
pub const TIMESTAMP_PORT_END: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl DateTime {
    /// Civil (proleptic Gregorian, UTC) date of a Unix timestamp
    pub fn from_timestamp(timestamp: u32) -> Self {
        let days = (timestamp / 86_400) as i64;
        let secs = timestamp % 86_400;

        // days since 0000-03-01, eras of 400 years
        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z - era * 146_097;
        let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };

        Self {
            year: year as u16,
            month: month as u8,
            day: day as u8,
            hours: (secs / 3_600) as u8,
            minutes: (secs % 3_600 / 60) as u8,
            seconds: (secs % 60) as u8,
        }
    }
}

pub struct Rtc {
    timestamp: u32,
    now: DateTime,
}

impl Rtc {
    pub fn new() -> Self {
        let mut rtc = Self {
            timestamp: 0,
            now: DateTime::from_timestamp(0),
        };
        rtc.refresh();
        rtc
    }

    /// Latch the current host time
    pub fn refresh(&mut self) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as u32)
            .unwrap_or(0);
        self.refresh_at(timestamp);
    }

    pub fn refresh_at(&mut self, timestamp: u32) {
        self.timestamp = timestamp;
        self.now = DateTime::from_timestamp(timestamp);
    }

    pub fn now(&self) -> DateTime {
        self.now
    }
}

impl Default for Rtc {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDevice for Rtc {
    fn name(&self) -> &'static str {
        "RTC"
    }

    fn read(&mut self, port: u8) -> Result<u8, DeviceError> {
        let data = match port {
            YEAR_PORT => self.now.year.saturating_sub(2000).min(u8::MAX as u16) as u8,
            MONTH_PORT => self.now.month,
            DAY_PORT => self.now.day,
            HOURS_PORT => self.now.hours,
            MINUTES_PORT => self.now.minutes,
            SECONDS_PORT => self.now.seconds,
            TIMESTAMP_PORT_START..=TIMESTAMP_PORT_END => {
                let byte = port - TIMESTAMP_PORT_START;
                (self.timestamp >> (8 * byte)) as u8
            }
            _ => return Err(DeviceError::NotReadable(port)),
        };
        Ok(data)
    }

    fn write(&mut self, port: u8, _data: u8) -> Result<(), DeviceError> {
        match port {
            REFRESH_PORT => {
                self.refresh();
                Ok(())
            }
            _ => Err(DeviceError::NotWritable(port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_from_timestamp() {
        assert_eq!(
            DateTime::from_timestamp(0),
            DateTime {
                year: 1970,
                month: 1,
                day: 1,
                hours: 0,
                minutes: 0,
                seconds: 0
            }
        );

        // 2024-02-29 13:37:42 UTC
        assert_eq!(
            DateTime::from_timestamp(1_709_213_862),
            DateTime {
                year: 2024,
                month: 2,
                day: 29,
                hours: 13,
                minutes: 37,
                seconds: 42
            }
        );
    }

    #[test]
    fn test_rtc_ports() {
        let mut rtc = Rtc::new();
        rtc.refresh_at(0x65E0_85A6);

        assert_eq!(rtc.read(7), Ok(0xA6));
        assert_eq!(rtc.read(8), Ok(0x85));
        assert_eq!(rtc.read(9), Ok(0xE0));
        assert_eq!(rtc.read(10), Ok(0x65));

        assert_eq!(rtc.read(YEAR_PORT), Ok(24));
        assert_eq!(rtc.read(MONTH_PORT), Ok(2));
        assert_eq!(rtc.read(DAY_PORT), Ok(29));

        // date fields are read-only
        assert_eq!(
            rtc.write(SECONDS_PORT, 0),
            Err(DeviceError::NotWritable(SECONDS_PORT))
        );
        assert_eq!(rtc.read(11), Err(DeviceError::NotReadable(11)));
    }
}
