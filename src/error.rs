use std::fmt;

/// Result alias used throughout the memory subsystem
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Memory subsystem errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("{what} {index} is out of range, must be in [0..{limit})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    #[error("Allocation error: {0}")]
    Allocation(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Program fault: {0}")]
    ProgramFault(String),
}

impl MemoryError {
    pub(crate) fn out_of_range(what: &'static str, index: usize, limit: usize) -> Self {
        MemoryError::OutOfRange { what, index, limit }
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            MemoryError::OutOfRange { .. } => FaultKind::OutOfRange,
            MemoryError::Allocation(_) => FaultKind::Allocation,
            MemoryError::OutOfMemory(_) => FaultKind::OutOfMemory,
            MemoryError::Format(_) => FaultKind::Format,
            MemoryError::ProgramFault(_) => FaultKind::Program,
        }
    }
}

/// Error kind without payload, as carried by fault reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    OutOfRange,
    Allocation,
    OutOfMemory,
    Format,
    Program,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::OutOfRange => "out of range",
            FaultKind::Allocation => "allocation error",
            FaultKind::OutOfMemory => "out of memory",
            FaultKind::Format => "format error",
            FaultKind::Program => "program fault",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = MemoryError::out_of_range("address", 1024, 1024);
        assert_eq!(err.to_string(), "address 1024 is out of range, must be in [0..1024)");
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(MemoryError::out_of_range("byte", 4, 4).kind(), FaultKind::OutOfRange);
        assert_eq!(MemoryError::Allocation("x".into()).kind(), FaultKind::Allocation);
        assert_eq!(MemoryError::OutOfMemory("x".into()).kind(), FaultKind::OutOfMemory);
        assert_eq!(MemoryError::Format("x".into()).kind(), FaultKind::Format);
        assert_eq!(MemoryError::ProgramFault("x".into()).kind(), FaultKind::Program);
    }
}
