//! Store configuration and backend selection.
//!
//! ```ignore
//! let config = Config::from_env()?;
//! let store = keypage::connect(&config).await?;
//! ```
//!
//! Environment variables read by [`Config::from_env`]:
//!
//! | variable                    | default                     |
//! |-----------------------------|-----------------------------|
//! | `KEYPAGE_BACKEND`           | `memory` (or `mongodb`)     |
//! | `KEYPAGE_MONGODB_URI`       | `mongodb://localhost:27017` |
//! | `KEYPAGE_MONGODB_DATABASE`  | `keypage`                   |
//! | `KEYPAGE_ID_KIND`           | `uuid` (or `objectid`)      |
//! | `KEYPAGE_DEFAULT_LIMIT`     | `20`                        |
//! | `KEYPAGE_MAX_LIMIT`         | `1000`                      |
//! | `KEYPAGE_TIEBREAK_FIELD`    | `_id`                       |
//! | `KEYPAGE_MAX_STRING_LENGTH` | unset (no truncation)       |

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use keypage_core::{
    backend::IdKind,
    config::PaginationConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    store::{DocumentStore, DynDocumentStore},
};
use keypage_memory::InMemoryStore;

pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_MONGODB_DATABASE: &str = "keypage";

/// Which store backend to connect to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    #[default]
    Memory,
    MongoDb {
        uri: String,
        database: String,
        #[serde(default)]
        id_kind: IdKind,
    },
}

/// Complete configuration of a store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub pagination: PaginationConfig,
}

impl Config {
    /// Loads configuration from `KEYPAGE_*` environment variables.
    pub fn from_env() -> DocumentStoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DocumentStoreResult<Self> {
        let backend = match lookup("KEYPAGE_BACKEND").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("memory") => BackendConfig::Memory,
            Some("mongodb") => BackendConfig::MongoDb {
                uri: lookup("KEYPAGE_MONGODB_URI").unwrap_or_else(|| DEFAULT_MONGODB_URI.to_string()),
                database: lookup("KEYPAGE_MONGODB_DATABASE")
                    .unwrap_or_else(|| DEFAULT_MONGODB_DATABASE.to_string()),
                id_kind: parse_var(&lookup, "KEYPAGE_ID_KIND")?.unwrap_or_default(),
            },
            Some(other) => {
                return Err(DocumentStoreError::Initialization(format!(
                    "KEYPAGE_BACKEND: unknown backend '{other}' (expected memory or mongodb)"
                )));
            }
        };

        let defaults = PaginationConfig::default();
        let pagination = PaginationConfig::builder()
            .with_default_limit(parse_var(&lookup, "KEYPAGE_DEFAULT_LIMIT")?.unwrap_or(defaults.default_limit))
            .with_max_limit(parse_var(&lookup, "KEYPAGE_MAX_LIMIT")?.unwrap_or(defaults.max_limit))
            .with_tiebreak_field(lookup("KEYPAGE_TIEBREAK_FIELD").unwrap_or(defaults.tiebreak_field))
            .with_max_string_length(parse_var(&lookup, "KEYPAGE_MAX_STRING_LENGTH")?)
            .build();

        let config = Config { backend, pagination };
        config.validate()?;
        Ok(config)
    }

    /// Checks the pagination bounds for consistency.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        let pagination = &self.pagination;

        if pagination.max_limit == 0 {
            return Err(DocumentStoreError::Initialization("max_limit must be at least 1".to_string()));
        }
        if pagination.default_limit == 0 || pagination.default_limit > pagination.max_limit {
            return Err(DocumentStoreError::Initialization(format!(
                "default_limit must be between 1 and max_limit ({})",
                pagination.max_limit
            )));
        }
        if pagination.tiebreak_field.is_empty() {
            return Err(DocumentStoreError::Initialization("tiebreak_field must not be empty".to_string()));
        }

        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> DocumentStoreResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| DocumentStoreError::Initialization(format!("{key}: {err}")))
        })
        .transpose()
}

/// Connects to the configured backend.
pub async fn connect(config: &Config) -> DocumentStoreResult<DynDocumentStore> {
    config.validate()?;

    match &config.backend {
        BackendConfig::Memory => {
            tracing::info!("using in-memory document store");
            Ok(DocumentStore::with_pagination_config(InMemoryStore::new(), config.pagination.clone()).into_dyn())
        }
        #[cfg(feature = "mongodb")]
        BackendConfig::MongoDb { uri, database, id_kind } => {
            use keypage_core::backend::StoreBackendBuilder;

            let backend = keypage_mongodb::MongoDbStore::builder(uri, database)
                .with_id_kind(*id_kind)
                .build()
                .await?;
            tracing::info!(database = %database, "using mongodb document store");

            Ok(DocumentStore::with_pagination_config(backend, config.pagination.clone()).into_dyn())
        }
        #[cfg(not(feature = "mongodb"))]
        BackendConfig::MongoDb { .. } => Err(DocumentStoreError::Initialization(
            "the mongodb backend requires the `mongodb` feature".to_string(),
        )),
    }
}
