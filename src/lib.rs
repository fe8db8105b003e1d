//! Access-log line parsing for the Apache combined log format and LTSV.
//!
//! ```
//! use axslog::{ApacheParser, LogParser};
//!
//! let line = r#"127.0.0.1 - frank [10/Oct/2023:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326 "-" "curl/8.0""#;
//! let record = ApacheParser::default().parse(line).unwrap();
//! assert_eq!(record.path, "/apache_pb.gif");
//! assert_eq!(record.status, 200);
//! ```

pub mod config;
pub mod error;
pub mod output;
pub mod parsers;
pub mod record;

pub use config::{ParseMode, ParseOptions};
pub use error::{DecodeError, ErrorKind, ParseError, RequestError};
pub use parsers::{
    guess_format, parse_chunk, parse_line, parser_for, take_quoted, ApacheParser, LogFormat,
    LogParser, LtsvParser,
};
pub use record::Record;
