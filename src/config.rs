use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::constants::*;

/// Machine geometry and scheduling parameters, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachineConfig {
    /// Words per page / frame
    pub page_size: usize,
    /// Physical frames in real memory
    pub frame_count: usize,
    /// Logical pages per process
    pub virtual_page_count: usize,
    /// Instructions per scheduling turn
    pub quantum: usize,
    /// Seed for the free-frame search; entropy when absent
    pub seed: Option<u64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            page_size: PAGE_SIZE,
            frame_count: FRAME_COUNT,
            virtual_page_count: VIRTUAL_PAGE_COUNT,
            quantum: QUANTUM,
            seed: None,
        }
    }
}

impl MachineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: MachineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("page_size", self.page_size),
            ("frame_count", self.frame_count),
            ("virtual_page_count", self.virtual_page_count),
            ("quantum", self.quantum),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
            }
        }
        if self.page_size.checked_mul(self.frame_count).is_none() {
            return Err(ConfigError::Invalid(format!(
                "physical memory of {} frames x {} words does not fit in an address",
                self.frame_count, self.page_size
            )));
        }
        if self.page_size.checked_mul(self.virtual_page_count).is_none() {
            return Err(ConfigError::Invalid(format!(
                "logical memory of {} pages x {} words does not fit in an address",
                self.virtual_page_count, self.page_size
            )));
        }
        Ok(())
    }

    /// Words of physical memory
    pub fn total_size(&self) -> usize {
        self.page_size * self.frame_count
    }

    /// Words of logical memory available to one process
    pub fn virtual_size(&self) -> usize {
        self.page_size * self.virtual_page_count
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let config = MachineConfig::default();
        assert_eq!(config.total_size(), PM_SIZE);
        assert_eq!(config.virtual_size(), VIRTUAL_PAGE_COUNT * PAGE_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_document() {
        let config = MachineConfig::parse("page_size = 8\nframe_count = 4\nseed = 7").unwrap();
        assert_eq!(config.page_size, 8);
        assert_eq!(config.frame_count, 4);
        assert_eq!(config.seed, Some(7));
        // Unspecified keys fall back to defaults
        assert_eq!(config.virtual_page_count, VIRTUAL_PAGE_COUNT);
        assert_eq!(config.quantum, QUANTUM);
    }

    #[test]
    fn test_parse_rejects_unknown_key() {
        let err = MachineConfig::parse("page_sise = 8").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_sizes_rejected() {
        for doc in ["page_size = 0", "frame_count = 0", "virtual_page_count = 0", "quantum = 0"] {
            let err = MachineConfig::parse(doc).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "Failed for {}", doc);
        }
    }

    #[test]
    fn test_overflowing_geometry_rejected() {
        let config = MachineConfig {
            page_size: usize::MAX,
            frame_count: 2,
            ..MachineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "quantum = 5").unwrap();
        writeln!(file, "virtual_page_count = 2").unwrap();

        let config = MachineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.quantum, 5);
        assert_eq!(config.virtual_page_count, 2);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MachineConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }
}
