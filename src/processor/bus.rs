use log::{debug, info};

use crate::devices::DevicesManager;
use crate::diagnostics::Diagnostics;
use crate::dma::{DmaRequest, SOURCE_ADDRESS_HIGH_PORT, SOURCE_ADDRESS_LOW_PORT, SOURCE_DATA_PORT};
use crate::errors::{LoadError, MachineError};
use crate::hardware::PORTS_PER_DEVICE;
use crate::interfaces::Bus;
use crate::program::CompiledProgram;
use crate::settings::{MemoryMap, RegionKind};
use crate::utils::split_word;

use super::memory::{Ram, Rom};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTarget {
    Rom,
    Ram,
}

/// Main bus. Sole address decoding authority: every address belongs to
/// exactly one of ROM, RAM or I/O and accesses are routed there.
pub struct MemoryBus {
    map: MemoryMap,
    rom: Rom,
    ram: Ram,
    devices: DevicesManager,
    diagnostics: Diagnostics,
}

impl MemoryBus {
    pub fn new(
        map: MemoryMap,
        ram_capacity: usize,
        devices: DevicesManager,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            map,
            rom: Rom::new(map.rom().size()),
            ram: Ram::new(map.ram().size(), ram_capacity),
            devices,
            diagnostics,
        }
    }

    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    pub fn devices(&self) -> &DevicesManager {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut DevicesManager {
        &mut self.devices
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Load every entry of `program` into `target`, shifted by `offset`.
    /// Entry addresses are relative to the start of the target store.
    /// Nothing is written if any entry falls outside the store.
    pub fn load_program(
        &mut self,
        program: &CompiledProgram,
        target: LoadTarget,
        offset: u16,
    ) -> Result<(), LoadError> {
        let (name, size) = match target {
            LoadTarget::Rom => ("ROM", self.rom.size()),
            LoadTarget::Ram => ("RAM", self.ram.size()),
        };

        let mut placed = Vec::with_capacity(program.len());
        for entry in program.entries() {
            let slot = entry.address as usize + offset as usize;
            if slot >= size {
                return Err(LoadError::OutOfBounds {
                    target: name,
                    address: entry.address,
                    offset,
                    size,
                });
            }
            placed.push((slot as u16, entry.value));
        }

        for (slot, value) in placed {
            match target {
                LoadTarget::Rom => self.rom.load(slot, &[value])?,
                LoadTarget::Ram => {
                    for evicted in self.ram.load(slot, &[value])? {
                        self.report_eviction(evicted);
                    }
                }
            }
        }

        info!(
            "Program of {} bytes loaded into {name} at offset ${offset:0>4X}",
            program.len()
        );
        Ok(())
    }

    /// Reset every device. Memory contents survive.
    pub fn reset(&mut self) {
        self.devices.reset();
    }

    pub fn tick(&mut self) {
        self.devices.tick();
    }

    pub fn try_read(&mut self, address: u16) -> Result<u8, MachineError> {
        let (region, offset) = self.map.decode(address);
        let data = match region {
            RegionKind::Rom => self.rom.read(offset),
            RegionKind::Ram => self.ram.read(offset),
            RegionKind::Io => self.devices.read(offset)?,
        };
        debug!("Bus read from: {address:0>4X} <- {data:0>2X}");
        Ok(data)
    }

    pub fn try_write(&mut self, address: u16, data: u8) -> Result<(), MachineError> {
        debug!("Bus write to: {address:0>4X} <- {data:0>2X}");

        let (region, offset) = self.map.decode(address);
        match region {
            RegionKind::Rom => return Err(MachineError::WriteToReadOnly { address, data }),
            RegionKind::Ram => self.write_ram(offset, data),
            RegionKind::Io => {
                if let Some(request) = self.devices.write(offset, data)? {
                    self.transfer(request);
                }
            }
        }
        Ok(())
    }

    fn write_ram(&mut self, offset: u16, data: u8) {
        if let Some(evicted) = self.ram.write(offset, data) {
            self.report_eviction(evicted);
        }
    }

    fn report_eviction(&self, evicted: u16) {
        self.diagnostics.report(MachineError::StorageOverflow {
            capacity: self.ram.capacity(),
            evicted: self.map.ram().start.wrapping_add(evicted),
        });
    }

    /// Run a DMA transfer to completion. Every source byte is read before
    /// the first RAM write, so a failing transfer leaves RAM untouched.
    fn transfer(&mut self, request: DmaRequest) {
        let ram = self.map.ram();
        let size = request.size().unwrap_or(0);
        let last = request.target as u32 + size.saturating_sub(1);
        if size == 0 || !ram.contains(request.target) || last > ram.end as u32 {
            self.diagnostics.report(MachineError::DmaOutOfRange {
                target: request.target,
                size,
            });
            return;
        }

        // no port is driven unless the whole source layout is there
        if !self.devices.is_dma_source(request.device) {
            self.diagnostics.report(MachineError::UnknownPort {
                device: request.device,
                port: SOURCE_ADDRESS_LOW_PORT,
                offset: request.device as u16 * PORTS_PER_DEVICE
                    + SOURCE_ADDRESS_LOW_PORT as u16,
            });
            return;
        }

        let mut buffer = Vec::with_capacity(size as usize);
        for i in 0..size {
            match self.read_source(request.device, request.source_start + i as u16) {
                Ok(byte) => buffer.push(byte),
                Err(error) => {
                    self.diagnostics.report(error);
                    return;
                }
            }
        }

        let target = request.target - ram.start;
        for (i, byte) in buffer.into_iter().enumerate() {
            self.write_ram(target + i as u16, byte);
        }

        debug!(
            "DMA moved {size} bytes from device {} ${:0>4X} to ${:0>4X}",
            request.device, request.source_start, request.target
        );
        if let Some(slot) = self.devices.dma_slot() {
            self.devices.finish_dma(slot, size);
        }
    }

    fn read_source(&mut self, device: u8, address: u16) -> Result<u8, MachineError> {
        let (low, high) = split_word(address);
        self.devices.write_port(device, SOURCE_ADDRESS_LOW_PORT, low)?;
        self.devices.write_port(device, SOURCE_ADDRESS_HIGH_PORT, high)?;
        self.devices.read_port(device, SOURCE_DATA_PORT)
    }
}

impl Bus for MemoryBus {
    fn read(&mut self, address: u16) -> u8 {
        self.try_read(address).unwrap_or_else(|error| {
            self.diagnostics.report(error);
            0
        })
    }

    fn write(&mut self, address: u16, data: u8) {
        if let Err(error) = self.try_write(address, data) {
            self.diagnostics.report(error);
        }
    }
}
