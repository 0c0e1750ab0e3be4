use std::fmt;

use crate::error::{FaultKind, MemoryError, Result};
use crate::memory::PhysicalMemory;

/// Name and numeric id of a simulated process
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessIdentity {
    pub name: String,
    pub pid: u32,
}

impl ProcessIdentity {
    pub fn new(name: impl Into<String>, pid: u32) -> Self {
        ProcessIdentity {
            name: name.into(),
            pid,
        }
    }
}

impl fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.pid)
    }
}

/// A simulated process ("virtual machine") the real machine can schedule.
///
/// The instruction set behind `execute_one_instruction` is opaque to the
/// machine; any error it returns is treated as a crash of this process only.
pub trait Process {
    fn identity(&self) -> ProcessIdentity;

    fn is_finished(&self) -> bool;

    fn execute_one_instruction(&mut self, memory: &mut PhysicalMemory) -> anyhow::Result<()>;

    /// Give every frame held by this process back to physical memory
    fn release_resources(&mut self, memory: &mut PhysicalMemory) -> Result<()>;

    /// Duplicate this process, memory contents included
    fn fork(&self, memory: &mut PhysicalMemory) -> Result<Self>
    where
        Self: Sized;
}

/// Stable handle the machine assigns to each process it holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessHandle(pub(crate) u64);

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A process crash, as surfaced to whoever reports failures to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultReport {
    pub handle: ProcessHandle,
    pub process: ProcessIdentity,
    pub kind: FaultKind,
    pub message: String,
}

impl FaultReport {
    pub(crate) fn new(handle: ProcessHandle, process: ProcessIdentity, error: &anyhow::Error) -> Self {
        let kind = error
            .downcast_ref::<MemoryError>()
            .map_or(FaultKind::Program, MemoryError::kind);
        FaultReport {
            handle,
            process,
            kind,
            message: format!("{:#}", error),
        }
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Program {} crashed ({}): {}", self.process, self.kind, self.message)
    }
}
