pub mod app_config;
pub mod clock;
pub mod config;
pub mod keywords;
pub mod platform;
pub mod profile;

pub use app_config::{
    AppConfig, ClassifierSettings, DefaultAvatars, DiscoverySettings, Environment, LocaleTags,
    PacingSettings, ScraperSettings, StoreBackend, TrendSettings,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use keywords::{load_keyword_pools, KeywordPool, KeywordPoolsFile};
pub use platform::{Platform, UnknownPlatform};
pub use profile::{FollowerPoint, NormalizedPost, NormalizedProfile, PostCounters};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read keywords file {path}: {source}")]
    KeywordsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse keywords file: {0}")]
    KeywordsFileParse(#[source] serde_yaml::Error),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}
