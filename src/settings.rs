//! sim16 configuration options
use crate::errors::ConfigError;
use crate::hardware::*;

/// Address space layout. Built through [`MemoryMap::new`], which only
/// accepts layouts where RAM, ROM and I/O are disjoint and together cover
/// every 16-bit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    rom: Region,
    ram: Region,
    io: Region,
}

/// Inclusive address range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: u16,
    pub end: u16,
}

impl Region {
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, address: u16) -> bool {
        address >= self.start && address <= self.end
    }

    pub fn size(&self) -> usize {
        (self.end - self.start) as usize + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Rom,
    Ram,
    Io,
}

impl MemoryMap {
    pub fn new(rom: Region, ram: Region, io: Region) -> Result<Self, ConfigError> {
        for (name, region) in [("ROM", rom), ("RAM", ram), ("I/O", io)] {
            if region.start > region.end {
                return Err(ConfigError::InvertedRange {
                    region: name,
                    start: region.start,
                    end: region.end,
                });
            }
        }

        // Sort by start and check each region begins right after the
        // previous one: no overlaps, no holes
        let mut regions = [rom, ram, io];
        regions.sort_by_key(|region| region.start);

        if regions[0].start != 0 {
            return Err(ConfigError::UnmappedAddress { address: 0 });
        }
        for pair in regions.windows(2) {
            let (previous, next) = (pair[0], pair[1]);
            if next.start <= previous.end {
                return Err(ConfigError::OverlappingRegions {
                    address: next.start,
                });
            }
            if next.start != previous.end + 1 {
                return Err(ConfigError::UnmappedAddress {
                    address: previous.end + 1,
                });
            }
        }
        if regions[2].end != u16::MAX {
            return Err(ConfigError::UnmappedAddress {
                address: regions[2].end + 1,
            });
        }

        Ok(Self { rom, ram, io })
    }

    pub fn rom(&self) -> Region {
        self.rom
    }

    pub fn ram(&self) -> Region {
        self.ram
    }

    pub fn io(&self) -> Region {
        self.io
    }

    pub fn is_rom(&self, address: u16) -> bool {
        self.rom.contains(address)
    }

    pub fn is_ram(&self, address: u16) -> bool {
        self.ram.contains(address)
    }

    pub fn is_io(&self, address: u16) -> bool {
        self.io.contains(address)
    }

    /// Decode `address` into the single region owning it
    pub fn decode(&self, address: u16) -> (RegionKind, u16) {
        if self.rom.contains(address) {
            (RegionKind::Rom, address - self.rom.start)
        } else if self.io.contains(address) {
            (RegionKind::Io, address - self.io.start)
        } else {
            // validated partition: anything else is RAM
            (RegionKind::Ram, address - self.ram.start)
        }
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self {
            rom: Region::new(ROM_START, ROM_END),
            ram: Region::new(RAM_START, RAM_END),
            io: Region::new(IO_START, IO_END),
        }
    }
}

/// Devices the machine assembles and where they live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    InterruptController,
    Timer,
    Rtc,
    Rng,
    Keyboard,
    Console,
    LedsDisplay,
    PixelDisplay,
    LcdDisplay,
    SevenSegmentDisplay,
    StorageDisk,
    Buzzer,
    Dma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSlot {
    pub slot: u8,
    pub kind: DeviceKind,
    pub irq: Option<u8>,
}

/// Machine configuration options
#[derive(Debug, Clone)]
pub struct MachineSettings {
    pub memory_map: MemoryMap,

    /// Maximum number of occupied RAM cells before the oldest are evicted
    pub ram_capacity: usize,

    /// Initial program counter after reset
    pub reset_vector: u16,

    /// Initial stack pointer after reset
    pub stack_pointer: u16,

    /// Clock frequency in Hz
    pub clock_frequency: u32,

    /// CPU steps executed on every clock tick
    pub instructions_per_tick: u32,

    pub devices: Vec<DeviceSlot>,

    pub rng_seed: u16,
}

impl MachineSettings {
    pub fn default_devices() -> Vec<DeviceSlot> {
        use DeviceKind::*;

        let slot = |slot, kind, irq| DeviceSlot { slot, kind, irq };
        vec![
            slot(INTERRUPT_CONTROLLER_SLOT, InterruptController, None),
            slot(TIMER_SLOT, Timer, Some(TIMER_IRQ)),
            slot(RTC_SLOT, Rtc, None),
            slot(RNG_SLOT, Rng, None),
            slot(KEYBOARD_SLOT, Keyboard, Some(KEYBOARD_IRQ)),
            slot(CONSOLE_SLOT, Console, None),
            slot(LEDS_SLOT, LedsDisplay, None),
            slot(PIXEL_DISPLAY_SLOT, PixelDisplay, None),
            slot(LCD_SLOT, LcdDisplay, None),
            slot(SEVEN_SEGMENT_SLOT, SevenSegmentDisplay, None),
            slot(DISK_SLOT, StorageDisk, None),
            slot(BUZZER_SLOT, Buzzer, None),
            slot(DMA_SLOT, Dma, Some(DMA_IRQ)),
        ]
    }
}

impl Default for MachineSettings {
    fn default() -> Self {
        let memory_map = MemoryMap::default();
        Self {
            memory_map,
            ram_capacity: memory_map.ram().size(),
            reset_vector: RESET_VECTOR,
            stack_pointer: STACK_POINTER_START,
            clock_frequency: DEFAULT_CLOCK_FREQUENCY,
            instructions_per_tick: DEFAULT_INSTRUCTIONS_PER_TICK,
            devices: Self::default_devices(),
            rng_seed: 0xACE1,
        }
    }
}
