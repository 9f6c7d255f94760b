#[derive(Debug, thiserror::Error)]
pub enum FedError {
    #[error("unknown source: {name}")]
    UnknownSource { name: String },

    #[error("duplicate source: {name}")]
    DuplicateSource { name: String },

    #[error("missing join key '{key}' in table '{table}'")]
    MissingJoinKey { table: String, key: String },

    #[error("join key count mismatch, left: {left}, right: {right}")]
    JoinKeyArity { left: usize, right: usize },

    #[error("missing column '{column}' in table '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("ambiguous column reference '{column}' in table '{table}'")]
    AmbiguousColumn { table: String, column: String },

    #[error("duplicate projection target: {target}")]
    DuplicateProjection { target: String },

    #[error(
        "schema mismatch for query '{query}' at shard {shard}, expected: [{expected}], found: [{found}]"
    )]
    SchemaMismatch {
        query: String,
        shard: usize,
        expected: String,
        found: String,
    },

    #[error("invalid table: {0}")]
    InvalidTable(String),

    #[error("transform '{name}' failed: {message}")]
    Transform { name: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = FedError> = std::result::Result<T, E>;

macro_rules! invalid_table {
    ($($arg:tt)*) => {
        crate::errors::FedError::InvalidTable(std::format!($($arg)*))
    };
}
pub(crate) use invalid_table;

macro_rules! config_err {
    ($($arg:tt)*) => {
        crate::errors::FedError::Config(std::format!($($arg)*))
    };
}
pub(crate) use config_err;
