pub mod analysis;
pub mod app_config;
pub mod communities;
pub mod config;
pub mod content;
pub mod dump;
pub mod runs;
pub mod stats;

pub use analysis::{AiAnalysisDocuments, AnalysisDocuments, AudienceDocuments, SkepticismLevel};
pub use app_config::{AppConfig, Environment};
pub use communities::{
    load_communities, normalize_community_name, validate_community_name, CommunitiesFile,
    NewCommunity,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use content::{
    dedupe_comments, parent_from_fullname, AuthorProfile, NewComment, NewPost, ParentRef,
    MAX_COMMUNITY_NAME_LEN, MAX_EXTERNAL_ID_LEN, MAX_USERNAME_LEN,
};
pub use dump::{load_dump, CollectionDump, DumpPost};
pub use runs::RunStatus;
pub use stats::ScoreDistribution;

use thiserror::Error;

/// Validation failures raised before a record reaches the database.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("{field} must be non-empty")]
    Empty { field: &'static str },
    #[error("{field} is {actual} characters; the limit is {max}")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    #[error("{field} is out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
    #[error("invalid community name: {0}")]
    InvalidCommunityName(String),
    #[error("invalid run status: {0}")]
    InvalidRunStatus(String),
    #[error("invalid skepticism level: {0}")]
    InvalidSkepticismLevel(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read communities file {path}: {source}")]
    CommunitiesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse communities file: {0}")]
    CommunitiesFileParse(#[source] serde_yaml::Error),
    #[error("failed to read collection dump {path}: {source}")]
    DumpFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse collection dump: {0}")]
    DumpFileParse(#[source] serde_json::Error),
    #[error("config validation failed: {0}")]
    Validation(String),
}
