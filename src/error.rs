use thiserror::Error;

/// Crate-level error taxonomy.
///
/// Decode failures on raw detection records are deliberately NOT errors:
/// the normalizer recovers them to `None`/`0` locally. Only configuration,
/// store and transport problems surface as `Err` values, and the REST
/// boundary decides whether to mask them.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
