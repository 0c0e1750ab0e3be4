pub mod config;
pub mod constants;
pub mod demo;
pub mod error;
pub mod machine;
pub mod memory;
pub mod page;
pub mod page_table;
pub mod process;
pub mod scheduler;
pub mod translation;
pub mod word;

// Re-export commonly used items for convenience
pub use config::{ConfigError, MachineConfig};
pub use error::{FaultKind, MemoryError, Result};
pub use machine::{RealMachine, StepOutcome};
pub use memory::PhysicalMemory;
pub use page::{Frame, LogicalPage, Page, PageId, PageKind};
pub use page_table::PageTable;
pub use process::{FaultReport, Process, ProcessHandle, ProcessIdentity};
pub use scheduler::{RoundReport, RunReport};
pub use translation::VirtualAddress;
pub use word::Word;
