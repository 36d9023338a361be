use thiserror::Error;

use crate::mapping::MappingError;

/// Crate-level error type. The defragmenter, renderer and sweeper are
/// infallible by design; only configuration and strict-mode mapping
/// validation can fail.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
