// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid supervisor state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
