//! Environment-driven defaults
//!
//! CLI flags always win; these only fill in the blanks so container and
//! cron deployments can be configured without wrapper scripts.

use std::env;
use std::path::PathBuf;

/// Default batch size for database bulk inserts.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Defaults resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct Defaults {
    /// `DISCODUMP_OUTPUT_DIR`: directory for converted files and derived
    /// database paths. Defaults to the current directory.
    pub output_dir: PathBuf,
    /// `DISCODUMP_BATCH_SIZE`: rows buffered per table before a bulk flush.
    pub batch_size: usize,
}

impl Defaults {
    pub fn from_env() -> Self {
        let output_dir = env::var_os("DISCODUMP_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let batch_size = env::var("DISCODUMP_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_BATCH_SIZE);

        Self {
            output_dir,
            batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Env vars are absent in the test environment
        let defaults = Defaults::from_env();
        assert_eq!(defaults.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(defaults.output_dir, PathBuf::from("."));
    }
}
