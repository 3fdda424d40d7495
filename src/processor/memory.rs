use std::collections::{HashMap, VecDeque};

use crate::errors::LoadError;

/// Read-only memory. Contents are only set through [`Rom::load`]; bus
/// writes are refused by the [`MemoryBus`](super::bus::MemoryBus).
pub struct Rom {
    memory: Vec<u8>,
}

impl Rom {
    pub fn new(size: usize) -> Self {
        Self {
            memory: vec![0; size],
        }
    }

    pub fn read(&self, address: u16) -> u8 {
        self.memory.get(address as usize).copied().unwrap_or(0)
    }

    pub fn size(&self) -> usize {
        self.memory.len()
    }

    /// Load `contents` array starting on `address`.
    pub fn load(&mut self, address: u16, contents: &[u8]) -> Result<(), LoadError> {
        check_bounds("ROM", address, contents.len(), self.size())?;
        let start = address as usize;
        self.memory[start..start + contents.len()].copy_from_slice(contents);
        Ok(())
    }
}

/// Random access memory with a bounded number of occupied cells.
///
/// Cells are created on first write. Once `capacity` cells are occupied,
/// writing a new cell evicts the oldest inserted one. Unwritten and evicted
/// cells read as 0.
pub struct Ram {
    memory: HashMap<u16, u8>,
    insertion_order: VecDeque<u16>,
    size: usize,
    capacity: usize,
}

impl Ram {
    pub fn new(size: usize, capacity: usize) -> Self {
        Self {
            memory: HashMap::new(),
            insertion_order: VecDeque::new(),
            size,
            capacity: capacity.max(1),
        }
    }

    pub fn read(&self, address: u16) -> u8 {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    /// Write a byte of `data` to `address`. Returns the address of the cell
    /// evicted to make room for it, if any.
    pub fn write(&mut self, address: u16, data: u8) -> Option<u16> {
        if let Some(cell) = self.memory.get_mut(&address) {
            *cell = data;
            return None;
        }

        let mut evicted = None;
        if self.memory.len() >= self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.memory.remove(&oldest);
                evicted = Some(oldest);
            }
        }

        self.memory.insert(address, data);
        self.insertion_order.push_back(address);
        evicted
    }

    /// Address space size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied cells
    pub fn occupied(&self) -> usize {
        self.memory.len()
    }

    pub fn clear(&mut self) {
        self.memory.clear();
        self.insertion_order.clear();
    }

    /// Load `contents` array starting on `address`. Returns every address
    /// evicted while loading.
    pub fn load(&mut self, address: u16, contents: &[u8]) -> Result<Vec<u16>, LoadError> {
        check_bounds("RAM", address, contents.len(), self.size)?;
        let evicted = contents
            .iter()
            .enumerate()
            .filter_map(|(i, byte)| self.write(address + i as u16, *byte))
            .collect();
        Ok(evicted)
    }
}

fn check_bounds(
    target: &'static str,
    address: u16,
    length: usize,
    size: usize,
) -> Result<(), LoadError> {
    if address as usize + length > size {
        return Err(LoadError::OutOfBounds {
            target,
            address,
            offset: 0,
            size,
        });
    }
    Ok(())
}
