use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ConfigError, MachineConfig};
use crate::error::{MemoryError, Result};
use crate::page::{self, Frame, Page, TableId};
use crate::word::Word;

/// Real memory: a fixed array of frames shared by every page table
pub struct PhysicalMemory {
    config: MachineConfig,
    frames: Vec<Frame>,
    rng: StdRng,
    next_table_id: TableId,
}

impl PhysicalMemory {
    /// Create physical memory with every frame free
    pub fn new(config: &MachineConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let frames = (0..config.frame_count)
            .map(|n| Frame::new(n, config.page_size))
            .collect();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(PhysicalMemory {
            config: config.clone(),
            frames,
            rng,
            next_table_id: 0,
        })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Total addressable words
    #[inline]
    pub fn size(&self) -> usize {
        self.config.total_size()
    }

    /// Calculate the starting address of a frame
    #[inline]
    pub fn frame_to_address(&self, frame: usize) -> usize {
        frame * self.page_size()
    }

    /// Read a word from physical memory
    pub fn read(&self, address: usize) -> Result<Word> {
        let (frame, offset) = self.split(address)?;
        self.frames[frame].read(offset)
    }

    /// Write a word to physical memory
    pub fn write(&mut self, address: usize, word: Word) -> Result<()> {
        let (frame, offset) = self.split(address)?;
        self.frames[frame].write(offset, word)
    }

    fn split(&self, address: usize) -> Result<(usize, usize)> {
        if address >= self.size() {
            return Err(MemoryError::out_of_range("physical address", address, self.size()));
        }
        Ok((address / self.page_size(), address % self.page_size()))
    }

    pub fn frame(&self, number: usize) -> Result<&Frame> {
        let count = self.frames.len();
        self.frames
            .get(number)
            .ok_or(MemoryError::out_of_range("frame", number, count))
    }

    pub fn frame_mut(&mut self, number: usize) -> Result<&mut Frame> {
        let count = self.frames.len();
        self.frames
            .get_mut(number)
            .ok_or(MemoryError::out_of_range("frame", number, count))
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Link frame `number` to `target`
    pub fn allocate_frame(&mut self, number: usize, target: &mut dyn Page) -> Result<()> {
        page::allocate(self.frame_mut(number)?, target)
    }

    /// Unlink frame `number` from `target`
    pub fn deallocate_frame(&mut self, number: usize, target: &mut dyn Page) -> Result<()> {
        page::deallocate(self.frame_mut(number)?, target)
    }

    pub fn is_frame_allocated(&self, number: usize) -> Result<bool> {
        Ok(self.frame(number)?.is_allocated())
    }

    pub fn allocated_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_allocated()).count()
    }

    pub fn free_frame_count(&self) -> usize {
        self.frame_count() - self.allocated_frame_count()
    }

    /// Find a free frame, scanning circularly from a random starting frame.
    ///
    /// Every frame is examined at most once. There is no eviction: when all
    /// frames are taken the search fails.
    pub fn find_free_frame(&mut self) -> Result<usize> {
        let count = self.frames.len();
        let start = self.rng.gen_range(0..count);
        let found = (0..count)
            .map(|step| (start + step) % count)
            .find(|&n| !self.frames[n].is_allocated());
        match found {
            Some(n) => {
                debug!("free frame {} found (search started at {})", n, start);
                Ok(n)
            }
            None => Err(MemoryError::OutOfMemory(format!(
                "all {} frames are allocated",
                count
            ))),
        }
    }

    /// Copy every word of frame `from` into frame `to`
    pub(crate) fn copy_frame(&mut self, from: usize, to: usize) -> Result<()> {
        for offset in 0..self.page_size() {
            let word = self.frame(from)?.read(offset)?;
            self.frame_mut(to)?.write(offset, word)?;
        }
        Ok(())
    }

    pub(crate) fn next_table_id(&mut self) -> TableId {
        let id = self.next_table_id;
        self.next_table_id += 1;
        id
    }
}
