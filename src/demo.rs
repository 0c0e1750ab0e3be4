//! A minimal process used by the command-line driver.

use anyhow::{Context, bail};

use crate::error::{MemoryError, Result};
use crate::memory::PhysicalMemory;
use crate::page_table::PageTable;
use crate::process::{Process, ProcessIdentity};
use crate::word::Word;

/// Counter values wrap so they always fit the 4-character text view
const COUNTER_MODULUS: usize = 10_000;

/// Writes its instruction counter as decimal text into successive logical
/// words, reading every value back to check it.
#[derive(Debug)]
pub struct CounterProcess {
    identity: ProcessIdentity,
    page_table: PageTable,
    counter: usize,
    length: usize,
    stride: usize,
    fault_at: Option<usize>,
}

impl CounterProcess {
    /// A process that finishes after `length` instructions
    pub fn new(memory: &mut PhysicalMemory, identity: ProcessIdentity, length: usize) -> Self {
        CounterProcess {
            identity,
            page_table: PageTable::new(memory),
            counter: 0,
            length,
            stride: 1,
            fault_at: None,
        }
    }

    /// Words skipped between consecutive writes
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride.max(1);
        self
    }

    /// Raise a program fault on instruction `instruction` (0-based)
    pub fn with_fault_at(mut self, instruction: usize) -> Self {
        self.fault_at = Some(instruction);
        self
    }

    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    /// Instructions executed so far
    pub fn executed(&self) -> usize {
        self.counter
    }

    /// `counter * stride` modulo the logical size, without overflow for any stride
    fn address(&self) -> usize {
        let size = self.page_table.virtual_size() as u128;
        let offset = (self.counter as u128 % size) * (self.stride as u128 % size) % size;
        offset as usize
    }
}

impl Process for CounterProcess {
    fn identity(&self) -> ProcessIdentity {
        self.identity.clone()
    }

    fn is_finished(&self) -> bool {
        self.counter >= self.length
    }

    fn execute_one_instruction(&mut self, memory: &mut PhysicalMemory) -> anyhow::Result<()> {
        if self.fault_at == Some(self.counter) {
            return Err(MemoryError::ProgramFault(format!(
                "illegal instruction at step {}",
                self.counter
            ))
            .into());
        }

        let address = self.address();
        let value = (self.counter % COUNTER_MODULUS) as i32;
        self.page_table
            .write(memory, address, Word::from_decimal(value)?)
            .with_context(|| format!("store to logical address {}", address))?;

        let stored = self
            .page_table
            .read(memory, address)
            .with_context(|| format!("load from logical address {}", address))?
            .get_int()?;
        if stored != value {
            bail!("logical address {} holds {}, expected {}", address, stored, value);
        }

        self.counter += 1;
        Ok(())
    }

    fn release_resources(&mut self, memory: &mut PhysicalMemory) -> Result<()> {
        self.page_table.deallocate_all(memory)
    }

    fn fork(&self, memory: &mut PhysicalMemory) -> Result<Self> {
        Ok(CounterProcess {
            identity: self.identity.clone(),
            page_table: self.page_table.duplicate(memory)?,
            counter: self.counter,
            length: self.length,
            stride: self.stride,
            fault_at: self.fault_at,
        })
    }
}
