use std::path::PathBuf;

pub const DEFAULT_KEYS_DIR: &str = "ssm-keys";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsmConfig {
    /// Root of the key store.
    pub keys_dir: PathBuf,
    /// Allows operations that reveal master private keys (`get_xprv`).
    pub debug: bool,
}

impl SsmConfig {
    pub fn new(keys_dir: impl Into<PathBuf>) -> Self {
        Self {
            keys_dir: keys_dir.into(),
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Default for SsmConfig {
    fn default() -> Self {
        Self::new(DEFAULT_KEYS_DIR)
    }
}
