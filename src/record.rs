use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// `10/Oct/2023:13:55:36 -0700`
pub const CLF_TIME_LAYOUT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// One parsed access-log line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub virtual_host: String,
    pub host: String,
    pub user: String,
    /// `None` when the timestamp was missing or could not be parsed.
    pub time: Option<DateTime<FixedOffset>>,
    pub request: String,
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub status: u16,
    pub size: u64,
    pub referer: String,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_time_microsec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub forwarded_for: String,
}

impl Record {
    /// Splits `request` into method, path and protocol.
    ///
    /// Nothing is done when all three are already set, which happens for
    /// LTSV lines that log them as separate labels.
    pub fn break_down_request(&mut self) -> Result<(), RequestError> {
        if !self.method.is_empty() && !self.path.is_empty() && !self.protocol.is_empty() {
            return Ok(());
        }
        let mut parts = self.request.split_whitespace();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(path), Some(protocol), None) => {
                self.method = method.to_string();
                self.path = path.to_string();
                self.protocol = protocol.to_string();
                Ok(())
            }
            _ => Err(RequestError::Malformed(self.request.clone())),
        }
    }
}

pub fn parse_clf_time(text: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_str(text, CLF_TIME_LAYOUT)
}
