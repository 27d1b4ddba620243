//! Error types for the Avro crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AvroError {
    #[error("Schema registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Schema registry returned status {status}: {message}")]
    Registry { status: u16, message: String },

    #[error("Schema registry has no schema for subject '{subject}'")]
    UnknownSubject { subject: String },

    #[error("Avro error: {0}")]
    Avro(#[from] apache_avro::Error),

    #[error("Wire format error: {0}")]
    WireFormat(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid registry configuration: {0}")]
    InvalidConfig(String),
}

impl From<AvroError> for relay_types::Error {
    fn from(err: AvroError) -> Self {
        match err {
            AvroError::UnknownSubject { subject } => relay_types::Error::UnknownSubject { subject },
            AvroError::Http(_) | AvroError::Registry { .. } => {
                relay_types::Error::Registry(err.to_string())
            }
            AvroError::WireFormat(message) => relay_types::Error::WireFormat(message),
            AvroError::InvalidConfig(message) => relay_types::Error::InvalidConfig(message),
            AvroError::Avro(_) | AvroError::InvalidPayload(_) => {
                relay_types::Error::Avro(err.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AvroError>;
