use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read profile {path}: {source}")]
    ProfileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse profile: {0}")]
    ProfileParse(#[from] serde_yaml::Error),

    #[error("invalid profile: {0}")]
    ProfileValidation(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store snapshot at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("product {0} not found")]
    UnknownProduct(uuid::Uuid),
}
