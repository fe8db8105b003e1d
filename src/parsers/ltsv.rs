use std::str::FromStr;

use tracing::trace;

use super::{resolve_time, LogFormat, LogParser};
use crate::config::ParseOptions;
use crate::error::{DecodeError, ParseError};
use crate::record::Record;

/// A decoded LTSV line: the record fields plus the raw `time` label.
#[derive(Debug, Default)]
pub struct Decoded<'a> {
    pub record: Record,
    pub time: Option<&'a str>,
}

/// Maps `label:value` fields onto [`Record`] attributes.
///
/// Labels must be `[0-9A-Za-z_.-]+` and values may not hold NUL, CR or LF.
/// Labels match case-insensitively and unknown labels are skipped. `req` is
/// required unless `method`, `uri` and `protocol` are all given.
pub fn decode(line: &str) -> Result<Decoded<'_>, DecodeError> {
    let mut out = Decoded::default();
    let r = &mut out.record;

    for field in line.trim_end_matches(['\r', '\n']).split('\t') {
        if field.is_empty() {
            continue;
        }
        let (label, value) = field
            .split_once(':')
            .ok_or_else(|| DecodeError::MalformedField(field.to_string()))?;
        if label.is_empty() || !label.bytes().all(is_label_byte) {
            return Err(DecodeError::InvalidLabel(label.to_string()));
        }
        if !value.bytes().all(is_value_byte) {
            return Err(DecodeError::InvalidValue {
                label: label.to_string(),
                value: value.to_string(),
            });
        }

        match label.to_ascii_lowercase().as_str() {
            "vhost" => r.virtual_host = value.to_string(),
            "host" => r.host = value.to_string(),
            "user" => r.user = value.to_string(),
            "time" => out.time = Some(value),
            "req" => r.request = value.to_string(),
            "method" => r.method = value.to_string(),
            "uri" => r.path = value.to_string(),
            "protocol" => r.protocol = value.to_string(),
            "status" => r.status = number(label, value)?.unwrap_or_default(),
            "size" => r.size = number(label, value)?.unwrap_or_default(),
            "referer" => r.referer = value.to_string(),
            "ua" => r.user_agent = value.to_string(),
            "reqtime" => r.request_time = number(label, value)?,
            "reqtime_microsec" => r.request_time_microsec = number(label, value)?,
            "taken" => r.taken = number(label, value)?,
            "forwardedfor" => r.forwarded_for = value.to_string(),
            _ => {}
        }
    }

    let split_request = !r.method.is_empty() && !r.path.is_empty() && !r.protocol.is_empty();
    if r.request.is_empty() && !split_request {
        return Err(DecodeError::MissingField("req"));
    }
    Ok(out)
}

// label = 1*lbyte ; lbyte = [0-9A-Za-z_.-]
fn is_label_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

// fbyte = %x01-08 / %x0B / %x0C / %x0E-FF
fn is_value_byte(b: u8) -> bool {
    !matches!(b, 0x00 | b'\t' | b'\n' | b'\r')
}

/// `-` and empty values count as absent.
fn number<T: FromStr>(label: &str, value: &str) -> Result<Option<T>, DecodeError> {
    if value.is_empty() || value == "-" {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| DecodeError::InvalidNumber {
            label: label.to_string(),
            value: value.to_string(),
        })
}

/// Parser for LTSV access logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LtsvParser {
    options: ParseOptions,
}

impl LtsvParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }
}

impl LogParser for LtsvParser {
    fn parse(&self, line: &str) -> Result<Record, ParseError> {
        let Decoded { mut record, time } = decode(line).map_err(|source| ParseError::Decode {
            line: line.to_string(),
            source,
        })?;

        if let Some(time) = time {
            let time = time.trim_matches(['[', ']']);
            record.time = resolve_time(time, self.options, line)?;
        }

        record
            .break_down_request()
            .map_err(|source| ParseError::InvalidRequest {
                format: LogFormat::Ltsv,
                line: line.to_string(),
                source,
            })?;

        trace!(host = %record.host, status = record.status, "parsed ltsv line");
        Ok(record)
    }

    fn format(&self) -> LogFormat {
        LogFormat::Ltsv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RequestError};
    use chrono::{FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::error::Error as _;

    const SAMPLE: &str = "vhost:example.com\thost:192.0.2.1\tuser:frank\ttime:[10/Oct/2023:13:55:36 -0700]\treq:GET /index.html HTTP/1.1\tstatus:404\tsize:512\treferer:http://ref\tua:Mozilla/5.0 (X11)\treqtime:0.025\ttaken:25\tforwardedfor:203.0.113.9";

    #[test]
    fn parse_sample() {
        let r = LtsvParser::default().parse(SAMPLE).unwrap();
        let expected_time = FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2023, 10, 10, 13, 55, 36)
            .unwrap();
        assert_eq!(
            r,
            Record {
                virtual_host: "example.com".into(),
                host: "192.0.2.1".into(),
                user: "frank".into(),
                time: Some(expected_time),
                request: "GET /index.html HTTP/1.1".into(),
                method: "GET".into(),
                path: "/index.html".into(),
                protocol: "HTTP/1.1".into(),
                status: 404,
                size: 512,
                referer: "http://ref".into(),
                user_agent: "Mozilla/5.0 (X11)".into(),
                request_time: Some(0.025),
                request_time_microsec: None,
                taken: Some(25.0),
                forwarded_for: "203.0.113.9".into(),
            }
        );
    }

    #[test]
    fn missing_request_is_a_decode_failure() {
        let line = "host:192.0.2.1\ttime:[10/Oct/2023:13:55:36 -0700]\tstatus:200";
        let err = LtsvParser::default().parse(line).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
        assert!(err.to_string().contains("missing required label: req"));
        assert_eq!(err.line(), line);
        assert!(err.source().is_some());
    }

    #[test]
    fn split_request_labels_stand_in_for_req() {
        let line = "host:192.0.2.1\tmethod:PUT\turi:/items/1\tprotocol:HTTP/2.0\tstatus:204";
        let r = LtsvParser::default().parse(line).unwrap();
        assert_eq!(r.request, "");
        assert_eq!((r.method.as_str(), r.path.as_str()), ("PUT", "/items/1"));
        assert_eq!(r.protocol, "HTTP/2.0");
        assert_eq!(r.time, None);
    }

    #[test]
    fn bad_request_is_invalid_request_line() {
        let line = "host:192.0.2.1\treq:GARBAGE";
        let err = LtsvParser::default().parse(line).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequestLine);
        assert!(matches!(
            err,
            ParseError::InvalidRequest { source: RequestError::Malformed(ref r), .. } if r == "GARBAGE"
        ));
    }

    #[rstest]
    #[case("host:192.0.2.1\tno colon here\treq:GET / HTTP/1.1")]
    #[case(":orphan\treq:GET / HTTP/1.1")]
    #[case("a b:c\treq:GET / HTTP/1.1")]
    #[case("ラベル:x\treq:GET / HTTP/1.1")]
    #[case("host/name:x\treq:GET / HTTP/1.1")]
    #[case("req:GET / HTTP/1.1\tua:split\rline")]
    #[case("req:GET / HTTP/1.1\tua:nul\0byte")]
    #[case("req:GET / HTTP/1.1\tstatus:ok")]
    #[case("req:GET / HTTP/1.1\tsize:-3")]
    #[case("req:GET / HTTP/1.1\treqtime:fast")]
    #[case("")]
    fn decode_failures_are_structural(#[case] line: &str) {
        let err = LtsvParser::default().parse(line).unwrap_err();
        assert!(matches!(err, ParseError::Decode { .. }), "{err}");
    }

    #[test]
    fn invalid_label_is_named_in_the_error() {
        let err = decode("host:1.2.3.4\ta b:c\treq:GET / HTTP/1.1").unwrap_err();
        assert_eq!(err, DecodeError::InvalidLabel("a b".into()));
    }

    #[test]
    fn label_grammar_allows_dots_dashes_and_underscores() {
        let d = decode("x-forwarded.for_v2:1.2.3.4\treq:GET / HTTP/1.1").unwrap();
        assert_eq!(d.record.method, "");
    }

    #[test]
    fn dash_numbers_are_absent() {
        let r = LtsvParser::default()
            .parse("req:GET / HTTP/1.1\tstatus:-\tsize:-\treqtime:-")
            .unwrap();
        assert_eq!((r.status, r.size, r.request_time), (0, 0, None));
    }

    #[test]
    fn labels_are_case_insensitive_and_unknown_ignored() {
        let r = LtsvParser::default()
            .parse("HOST:10.1.1.1\tReq:GET / HTTP/1.0\tapptime:0.1\tvalue:with:colons")
            .unwrap();
        assert_eq!(r.host, "10.1.1.1");
        assert_eq!(r.method, "GET");
    }

    #[test]
    fn value_keeps_later_colons() {
        let d = decode("referer:http://example.com:8080/\treq:GET / HTTP/1.1\r\n").unwrap();
        assert_eq!(d.record.referer, "http://example.com:8080/");
        assert_eq!(d.record.protocol, "");
    }

    #[test]
    fn malformed_time_depends_on_mode() {
        let line = "time:[yesterday]\treq:GET / HTTP/1.1";
        let r = LtsvParser::default().parse(line).unwrap();
        assert_eq!(r.time, None);

        let err = LtsvParser::new(ParseOptions::strict()).parse(line).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedField);
    }

    #[test]
    fn unbracketed_time_is_accepted() {
        let r = LtsvParser::default()
            .parse("time:10/Oct/2023:13:55:36 +0000\treq:GET / HTTP/1.1")
            .unwrap();
        assert!(r.time.is_some());
    }
}
