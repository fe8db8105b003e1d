use std::num::IntErrorKind;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use super::{resolve_number, resolve_time, take_quoted, LogFormat, LogParser};
use crate::config::ParseOptions;
use crate::error::ParseError;
use crate::record::Record;

// Whitespace, digits and word characters are ASCII-only, as in RE2's
// perl classes; the regex crate's `\s`, `\d` and `\w` are Unicode-aware.
static LOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:([^\t\n\x0C\r ]+)[\t\n\x0C\r ])?", // %v virtual host
        r"([^\t\n\x0C\r ]+)[\t\n\x0C\r ]",       // %h remote host
        r"-[\t\n\x0C\r ]",                       // %l remote logname
        r"([^\t\n\x0C\r ]+)[\t\n\x0C\r ]",       // %u remote user
        r"\[([0-9]{2}/[0-9A-Za-z_]{3}/[0-9]{2}(?:[0-9]{2}:){3}[0-9]{2} [-+][0-9]{4})\][\t\n\x0C\r ]", // %t
        r"(.*)", // "request" status size "referer" "user agent"
    ))
    .expect("apache log regex is valid")
});

/// Parser for the Apache combined log format, with an optional leading virtual host.
///
/// `[vhost ]host - user [10/Oct/2023:13:55:36 -0700] "GET / HTTP/1.1" 200 2326 "referer" "ua"`
#[derive(Debug, Clone, Copy, Default)]
pub struct ApacheParser {
    options: ParseOptions,
}

impl ApacheParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }
}

impl LogParser for ApacheParser {
    fn parse(&self, line: &str) -> Result<Record, ParseError> {
        let caps = LOG_RE.captures(line).ok_or_else(|| ParseError::Mismatch {
            format: LogFormat::Apache,
            line: line.to_string(),
        })?;
        let group = |i: usize| caps.get(i).map_or("", |m| m.as_str());

        let mut record = Record {
            virtual_host: group(1).to_string(),
            host: group(2).to_string(),
            user: group(3).to_string(),
            time: resolve_time(group(4), self.options, line)?,
            ..Default::default()
        };

        let (request, rest) = take_quoted(group(5));
        record.request = request;
        record
            .break_down_request()
            .map_err(|source| ParseError::InvalidRequest {
                format: LogFormat::Apache,
                line: line.to_string(),
                source,
            })?;

        let mut tokens = rest.split_whitespace();
        let (Some(status), Some(size)) = (tokens.next(), tokens.next()) else {
            return Err(ParseError::MissingFields {
                line: line.to_string(),
            });
        };

        // an overflowing number is out of range, not malformed
        let code: i64 = match status.parse::<i64>() {
            Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                i64::MAX
            }
            _ => resolve_number("status", status, self.options, line)?,
        };
        if !(100..600).contains(&code) {
            return Err(ParseError::InvalidStatus {
                status: status.to_string(),
                line: line.to_string(),
            });
        }
        record.status = code as u16;
        record.size = resolve_number("size", size, self.options, line)?;

        let (referer, rest) = take_quoted(rest);
        record.referer = referer;
        record.user_agent = take_quoted(rest).0;

        trace!(host = %record.host, status = record.status, "parsed apache line");
        Ok(record)
    }

    fn format(&self) -> LogFormat {
        LogFormat::Apache
    }
}
