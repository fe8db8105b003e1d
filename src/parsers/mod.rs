pub mod apache;
pub mod ltsv;
pub mod quoted;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use clap::ValueEnum;
use memchr::memchr_iter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ParseOptions;
use crate::error::ParseError;
use crate::record::{parse_clf_time, Record};

pub use apache::ApacheParser;
pub use ltsv::LtsvParser;
pub use quoted::take_quoted;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Apache combined log format
    #[value(alias = "combined")]
    Apache,
    /// Labeled tab-separated values
    Ltsv,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Apache => "apache",
            LogFormat::Ltsv => "ltsv",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "apache" | "combined" => Ok(LogFormat::Apache),
            "ltsv" => Ok(LogFormat::Ltsv),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

pub trait LogParser: Send + Sync {
    /// parse one access-log line into a record
    fn parse(&self, line: &str) -> Result<Record, ParseError>;
    fn format(&self) -> LogFormat;
}

/// Picks LTSV when the line carries one of its usual labels, Apache otherwise.
pub fn guess_format(line: &str) -> LogFormat {
    const LEADING: [&str; 3] = ["host:", "time:", "vhost:"];
    const INNER: [&str; 3] = ["\thost:", "\ttime:", "\treq:"];

    if LEADING.iter().any(|l| line.starts_with(l)) || INNER.iter().any(|l| line.contains(l)) {
        LogFormat::Ltsv
    } else {
        LogFormat::Apache
    }
}

pub fn parser_for(format: LogFormat, options: ParseOptions) -> Box<dyn LogParser> {
    match format {
        LogFormat::Apache => Box::new(ApacheParser::new(options)),
        LogFormat::Ltsv => Box::new(LtsvParser::new(options)),
    }
}

/// Guesses the format of `line` and parses it.
pub fn parse_line(line: &str, options: ParseOptions) -> Result<Record, ParseError> {
    match guess_format(line) {
        LogFormat::Apache => ApacheParser::new(options).parse(line),
        LogFormat::Ltsv => LtsvParser::new(options).parse(line),
    }
}

/// Parses every non-blank line of `input`, in order.
///
/// With no fixed `format` each line is guessed on its own.
pub fn parse_chunk(
    input: &str,
    format: Option<LogFormat>,
    options: ParseOptions,
) -> Vec<Result<Record, ParseError>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 80);
    let mut start = 0usize;
    let fixed = format.map(|f| parser_for(f, options));
    let mut push = |line: &str| {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return;
        }
        out.push(match &fixed {
            Some(parser) => parser.parse(line),
            None => parse_line(line, options),
        });
    };
    for nl in memchr_iter(b'\n', bytes) {
        push(&input[start..nl]);
        start = nl + 1;
    }
    if start < bytes.len() {
        push(&input[start..]);
    }
    out
}

/// Parses a CLF timestamp, zero-filling failures unless strict.
pub(crate) fn resolve_time(
    text: &str,
    options: ParseOptions,
    line: &str,
) -> Result<Option<DateTime<FixedOffset>>, ParseError> {
    match parse_clf_time(text) {
        Ok(t) => Ok(Some(t)),
        Err(e) if options.is_strict() => {
            debug!(error = %e, "rejecting malformed timestamp");
            Err(ParseError::InvalidField {
                field: "time",
                value: text.to_string(),
                line: line.to_string(),
            })
        }
        Err(e) => {
            debug!(error = %e, time = text, "tolerating malformed timestamp");
            Ok(None)
        }
    }
}

/// Parses a numeric token, zero-filling failures unless strict.
pub(crate) fn resolve_number<T>(
    field: &'static str,
    token: &str,
    options: ParseOptions,
    line: &str,
) -> Result<T, ParseError>
where
    T: FromStr + Default,
{
    match token.parse::<T>() {
        Ok(v) => Ok(v),
        Err(_) if options.is_strict() => Err(ParseError::InvalidField {
            field,
            value: token.to_string(),
            line: line.to_string(),
        }),
        Err(_) => {
            debug!(field, token, "tolerating non-numeric field");
            Ok(T::default())
        }
    }
}
