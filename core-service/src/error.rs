use core_bridge::CommandError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Bridge initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
