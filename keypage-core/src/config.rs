//! Pagination settings.

use serde::{Deserialize, Serialize};

/// Page size used when a request does not name one.
pub const DEFAULT_LIMIT: usize = 20;
/// Largest page size a request may ask for.
pub const DEFAULT_MAX_LIMIT: usize = 1000;
/// Field holding the store's unique document id.
pub const DEFAULT_TIEBREAK_FIELD: &str = "_id";

/// Settings shared by every pagination request of a store.
///
/// ```ignore
/// let config = PaginationConfig::builder()
///     .with_default_limit(50)
///     .with_max_limit(500)
///     .build();
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when the request leaves it unset.
    pub default_limit: usize,
    /// Requests above this size fail with `LimitExceeded`; they are never clamped.
    pub max_limit: usize,
    /// Unique, totally ordered field appended to every sort.
    pub tiebreak_field: String,
    /// When set, strings in caller-facing results are truncated to this many characters.
    pub max_string_length: Option<usize>,
}

impl PaginationConfig {
    pub fn builder() -> PaginationConfigBuilder {
        PaginationConfigBuilder::new()
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
            tiebreak_field: DEFAULT_TIEBREAK_FIELD.to_string(),
            max_string_length: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct PaginationConfigBuilder {
    config: PaginationConfig,
}

impl PaginationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_limit(mut self, default_limit: usize) -> Self {
        self.config.default_limit = default_limit;
        self
    }

    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.config.max_limit = max_limit;
        self
    }

    pub fn with_tiebreak_field(mut self, field: impl Into<String>) -> Self {
        self.config.tiebreak_field = field.into();
        self
    }

    pub fn with_max_string_length(mut self, max: Option<usize>) -> Self {
        self.config.max_string_length = max;
        self
    }

    pub fn build(self) -> PaginationConfig {
        self.config
    }
}
