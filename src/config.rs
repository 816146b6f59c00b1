use crate::error::{Error, Result};

/// Largest item count the runtime accepts in a single read/write call.
pub const MAX_ITEMS_PER_CALL: usize = i32::MAX as usize;

/// Marker byte appended after the data of single-byte item files.
pub const TRAILER_BYTE: u8 = b'\n';

pub const ENV_MAX_ITEMS_PER_CALL: &str = "CHUNKIO_MAX_ITEMS_PER_CALL";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IoConfig {
    /// Per-call item bound for segmented transfers, in `1..=MAX_ITEMS_PER_CALL`.
    pub max_items_per_call: usize,
    /// Single-byte item files carry one trailing marker byte.
    pub single_byte_trailer: bool,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            max_items_per_call: MAX_ITEMS_PER_CALL,
            single_byte_trailer: true,
        }
    }
}

impl IoConfig {
    pub fn new(max_items_per_call: usize, single_byte_trailer: bool) -> Self {
        Self::default()
            .with_max_items_per_call(max_items_per_call)
            .with_single_byte_trailer(single_byte_trailer)
    }

    pub fn with_max_items_per_call(mut self, limit: usize) -> Self {
        self.max_items_per_call = limit.clamp(1, MAX_ITEMS_PER_CALL);
        self
    }

    pub fn with_single_byte_trailer(mut self, enabled: bool) -> Self {
        self.single_byte_trailer = enabled;
        self
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_MAX_ITEMS_PER_CALL) {
            let limit: usize = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{ENV_MAX_ITEMS_PER_CALL} must be a positive integer, got {raw:?}"))
            })?;
            if limit == 0 {
                return Err(Error::Config(format!("{ENV_MAX_ITEMS_PER_CALL} must be positive")));
            }
            config = config.with_max_items_per_call(limit);
        }
        Ok(config)
    }
}
