pub mod catalog;
pub mod config;
mod json;
pub mod ledger;
pub mod media;
pub mod media_service;
pub mod release;
pub mod retrieval;
pub mod runner;
pub mod testing;
pub mod throttle;

pub use catalog::{
    Catalog, CatalogCandidate, CatalogError, CatalogMatcher, SubSourceClient, SubtitleCandidate,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use ledger::{Ledger, LedgerEntry, LedgerError, LedgerSummary};
pub use media::{normalize_subject_key, LanguageRequest, MediaKind, MediaRequest, MediaType};
pub use media_service::{BazarrClient, MediaService, MediaServiceError};
pub use release::{EpisodeTarget, ReleaseInfoParser};
pub use retrieval::{FetchError, RetrievalPipeline, SearchError};
pub use runner::{RunError, RunSummary, Runner};
pub use throttle::{parse_cadence, CadenceParseError, SearchThrottle};
