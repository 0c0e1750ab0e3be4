//! The real machine: physical memory plus the processes sharing it.
//!
//! Scheduling rounds live in [`crate::scheduler`].

use log::{error, info, warn};

use crate::config::{ConfigError, MachineConfig};
use crate::error::{MemoryError, Result};
use crate::memory::PhysicalMemory;
use crate::page::Page;
use crate::process::{FaultReport, Process, ProcessHandle};
use crate::word::Word;

pub(crate) struct Slot<P> {
    pub(crate) handle: ProcessHandle,
    pub(crate) process: P,
}

/// Outcome of running a single instruction through [`RealMachine::execute`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Executed,
    /// The process crashed and was removed from the machine
    Faulted(FaultReport),
}

pub struct RealMachine<P> {
    pub(crate) config: MachineConfig,
    pub(crate) memory: PhysicalMemory,
    pub(crate) processes: Vec<Slot<P>>,
    next_handle: u64,
    /// Instructions left in the current turn
    pub(crate) timer: usize,
}

impl<P: Process> RealMachine<P> {
    pub fn new(config: MachineConfig) -> std::result::Result<Self, ConfigError> {
        let memory = PhysicalMemory::new(&config)?;
        info!(
            "real machine: {} frames x {} words, {} logical pages per process, quantum {}",
            config.frame_count, config.page_size, config.virtual_page_count, config.quantum
        );
        Ok(RealMachine {
            timer: config.quantum,
            config,
            memory,
            processes: Vec::new(),
            next_handle: 0,
        })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut PhysicalMemory {
        &mut self.memory
    }

    /// Current value of the quantum timer
    pub fn timer(&self) -> usize {
        self.timer
    }

    pub fn read(&self, address: usize) -> Result<Word> {
        self.memory.read(address)
    }

    pub fn write(&mut self, address: usize, word: Word) -> Result<()> {
        self.memory.write(address, word)
    }

    pub fn allocate_frame(&mut self, frame: usize, page: &mut dyn Page) -> Result<()> {
        self.memory.allocate_frame(frame, page)
    }

    pub fn deallocate_frame(&mut self, frame: usize, page: &mut dyn Page) -> Result<()> {
        self.memory.deallocate_frame(frame, page)
    }

    pub fn is_frame_allocated(&self, frame: usize) -> Result<bool> {
        self.memory.is_frame_allocated(frame)
    }

    pub fn free_frame_count(&self) -> usize {
        self.memory.free_frame_count()
    }

    pub fn allocated_frame_count(&self) -> usize {
        self.memory.allocated_frame_count()
    }

    /// Build a process against this machine's memory and append it to the
    /// active set
    pub fn spawn<F>(&mut self, build: F) -> Result<ProcessHandle>
    where
        F: FnOnce(&mut PhysicalMemory) -> Result<P>,
    {
        let process = build(&mut self.memory)?;
        let identity = process.identity();
        let handle = self.insert(process);
        info!("spawned {} as {}", identity, handle);
        Ok(handle)
    }

    /// Duplicate the process behind `source` and append the copy.
    ///
    /// If the copy cannot be built, the source process's resources are
    /// released and the fork fails with out of memory.
    pub fn fork(&mut self, source: ProcessHandle) -> Result<ProcessHandle> {
        let position = self
            .position(source)
            .ok_or_else(|| MemoryError::Allocation(format!("no process {} to fork", source)))?;

        let slot = &mut self.processes[position];
        match slot.process.fork(&mut self.memory) {
            Ok(child) => {
                let handle = self.insert(child);
                info!("forked {} into {}", source, handle);
                Ok(handle)
            }
            Err(err) => {
                let identity = slot.process.identity();
                warn!("fork of {} failed: {}, releasing its resources", identity, err);
                if let Err(release) = slot.process.release_resources(&mut self.memory) {
                    warn!("failed to release resources of {}: {}", identity, release);
                }
                Err(MemoryError::OutOfMemory(format!("could not fork {}: {}", identity, err)))
            }
        }
    }

    /// Run one instruction of the process behind `handle`.
    ///
    /// A failing instruction crashes the process: its resources are released
    /// and it leaves the active set. Returns `None` if there is no such
    /// process.
    pub fn execute(&mut self, handle: ProcessHandle) -> Option<StepOutcome> {
        let position = self.position(handle)?;
        let slot = &mut self.processes[position];
        match slot.process.execute_one_instruction(&mut self.memory) {
            Ok(()) => Some(StepOutcome::Executed),
            Err(err) => {
                let report = FaultReport::new(handle, slot.process.identity(), &err);
                error!("{}", report);
                self.terminate(position);
                Some(StepOutcome::Faulted(report))
            }
        }
    }

    /// Release and remove every finished process, returning their handles
    pub fn reap_finished(&mut self) -> Vec<ProcessHandle> {
        let mut reaped = Vec::new();
        let mut position = 0;
        while position < self.processes.len() {
            if self.processes[position].process.is_finished() {
                reaped.push(self.processes[position].handle);
                self.terminate(position);
            } else {
                position += 1;
            }
        }
        reaped
    }

    /// Active processes in scheduling order
    pub fn processes(&self) -> impl Iterator<Item = (ProcessHandle, &P)> {
        self.processes.iter().map(|slot| (slot.handle, &slot.process))
    }

    pub fn process(&self, handle: ProcessHandle) -> Option<&P> {
        self.position(handle).map(|n| &self.processes[n].process)
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn has_unfinished(&self) -> bool {
        self.processes.iter().any(|slot| !slot.process.is_finished())
    }

    pub(crate) fn is_unfinished(&self, handle: ProcessHandle) -> bool {
        self.process(handle).is_some_and(|process| !process.is_finished())
    }

    fn position(&self, handle: ProcessHandle) -> Option<usize> {
        self.processes.iter().position(|slot| slot.handle == handle)
    }

    fn insert(&mut self, process: P) -> ProcessHandle {
        let handle = ProcessHandle(self.next_handle);
        self.next_handle += 1;
        self.processes.push(Slot { handle, process });
        handle
    }

    fn terminate(&mut self, position: usize) {
        let mut slot = self.processes.remove(position);
        if let Err(err) = slot.process.release_resources(&mut self.memory) {
            warn!(
                "failed to release resources of {}: {}",
                slot.process.identity(),
                err
            );
        }
    }
}
