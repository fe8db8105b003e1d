use thiserror::Error;

use crate::parsers::LogFormat;

/// Broad class of a [`ParseError`], for callers that only care about the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    StructuralMismatch,
    InvalidRequestLine,
    InvalidStatusCode,
    MalformedField,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse {format} log: {line}")]
    Mismatch { format: LogFormat, line: String },

    #[error("failed to parse apache log, missing status or size: {line}")]
    MissingFields { line: String },

    #[error("failed to parse ltsv log: {source}: {line}")]
    Decode {
        line: String,
        #[source]
        source: DecodeError,
    },

    #[error("failed to parse {format} log: {source}: {line}")]
    InvalidRequest {
        format: LogFormat,
        line: String,
        #[source]
        source: RequestError,
    },

    #[error("status in apache log is invalid: {status}, log: {line}")]
    InvalidStatus { status: String, line: String },

    #[error("malformed {field} field {value:?} in log: {line}")]
    InvalidField {
        field: &'static str,
        value: String,
        line: String,
    },
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::Mismatch { .. }
            | ParseError::MissingFields { .. }
            | ParseError::Decode { .. } => ErrorKind::StructuralMismatch,
            ParseError::InvalidRequest { .. } => ErrorKind::InvalidRequestLine,
            ParseError::InvalidStatus { .. } => ErrorKind::InvalidStatusCode,
            ParseError::InvalidField { .. } => ErrorKind::MalformedField,
        }
    }

    /// The raw line that failed to parse.
    pub fn line(&self) -> &str {
        match self {
            ParseError::Mismatch { line, .. }
            | ParseError::MissingFields { line }
            | ParseError::Decode { line, .. }
            | ParseError::InvalidRequest { line, .. }
            | ParseError::InvalidStatus { line, .. }
            | ParseError::InvalidField { line, .. } => line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("invalid request: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("not a ltsv field: {0:?}")]
    MalformedField(String),

    #[error("invalid ltsv label: {0:?}")]
    InvalidLabel(String),

    #[error("invalid ltsv value for label {label}: {value:?}")]
    InvalidValue { label: String, value: String },

    #[error("invalid number for label {label}: {value:?}")]
    InvalidNumber { label: String, value: String },

    #[error("missing required label: {0}")]
    MissingField(&'static str),
}
