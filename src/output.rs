use crate::record::Record;
use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const COLUMNS: [&str; 16] = [
    "time",
    "virtual_host",
    "host",
    "user",
    "request",
    "method",
    "path",
    "protocol",
    "status",
    "size",
    "referer",
    "user_agent",
    "request_time",
    "request_time_microsec",
    "taken",
    "forwarded_for",
];

pub enum Writer {
    Stdout(Box<dyn Write + Send>),
    JsonFile(BufWriter<File>, bool), // bool tracks if we've written the opening bracket
    JsonlFile(BufWriter<File>),
    CsvFile(BufWriter<File>, bool), // bool tracks if we've written headers
    TsvFile(BufWriter<File>, bool),
}

impl Writer {
    pub fn write_batch(&mut self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        match self {
            Writer::Stdout(writer) => {
                for record in records {
                    let serialized = serde_json::to_string(record)?;
                    writeln!(writer, "{}", serialized)?;
                }
            }
            Writer::JsonFile(writer, is_first) => {
                for record in records {
                    if *is_first {
                        write!(writer, "[")?;
                        *is_first = false;
                    } else {
                        write!(writer, ",")?;
                    }
                    let serialized = serde_json::to_string_pretty(record)?;
                    write!(writer, "\n{}", serialized)?;
                }
            }
            Writer::JsonlFile(writer) => {
                for record in records {
                    let serialized = serde_json::to_string(record)?;
                    writeln!(writer, "{}", serialized)?;
                }
            }
            Writer::CsvFile(writer, headers_written) => {
                if !*headers_written {
                    writeln!(writer, "{}", COLUMNS.join(","))?;
                    *headers_written = true;
                }
                for record in records {
                    let row: Vec<String> = columns(record).iter().map(|f| escape_csv_field(f)).collect();
                    writeln!(writer, "{}", row.join(","))?;
                }
            }
            Writer::TsvFile(writer, headers_written) => {
                if !*headers_written {
                    writeln!(writer, "{}", COLUMNS.join("\t"))?;
                    *headers_written = true;
                }
                for record in records {
                    let row: Vec<String> = columns(record).iter().map(|f| escape_tsv_field(f)).collect();
                    writeln!(writer, "{}", row.join("\t"))?;
                }
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        match self {
            Writer::JsonFile(ref mut writer, is_first) => {
                if is_first {
                    write!(writer, "[")?;
                }
                writeln!(writer, "\n]")?;
                writer.flush()?;
            }
            Writer::JsonlFile(ref mut writer)
            | Writer::CsvFile(ref mut writer, _)
            | Writer::TsvFile(ref mut writer, _) => {
                writer.flush()?;
            }
            Writer::Stdout(ref mut writer) => {
                writer.flush()?;
            }
        }
        Ok(())
    }
}

pub fn create_writer(output_arg: &str) -> Result<Writer> {
    match output_arg {
        "stdout" | "json" => Ok(Writer::Stdout(Box::new(io::stdout()))),
        path if path.ends_with(".json") => Ok(Writer::JsonFile(create_file(path)?, true)),
        path if path.ends_with(".jsonl") || path.ends_with(".ndjson") => {
            Ok(Writer::JsonlFile(create_file(path)?))
        }
        path if path.ends_with(".csv") => Ok(Writer::CsvFile(create_file(path)?, false)),
        path if path.ends_with(".tsv") => Ok(Writer::TsvFile(create_file(path)?, false)),
        path => {
            // Default to JSON file if it looks like a path
            if path.contains('/') || path.contains('\\') || path.contains('.') {
                Ok(Writer::JsonFile(create_file(path)?, true))
            } else {
                Err(anyhow!(
                    "Unknown output format: {}. Use 'stdout', 'json', or a file path",
                    output_arg
                ))
            }
        }
    }
}

fn create_file(file_path: &str) -> Result<BufWriter<File>> {
    if let Some(parent) = Path::new(file_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(file_path)?))
}

fn columns(record: &Record) -> [String; 16] {
    let float = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    [
        record.time.map(|t| t.to_rfc3339()).unwrap_or_default(),
        record.virtual_host.clone(),
        record.host.clone(),
        record.user.clone(),
        record.request.clone(),
        record.method.clone(),
        record.path.clone(),
        record.protocol.clone(),
        record.status.to_string(),
        record.size.to_string(),
        record.referer.clone(),
        record.user_agent.clone(),
        float(record.request_time),
        float(record.request_time_microsec),
        float(record.taken),
        record.forwarded_for.clone(),
    ]
}

fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn escape_tsv_field(field: &str) -> String {
    field
        .replace('\t', " ")
        .replace('\n', " ")
        .replace('\r', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Record {
        Record {
            host: "10.0.0.1".into(),
            user: "-".into(),
            request: "GET / HTTP/1.1".into(),
            method: "GET".into(),
            path: "/".into(),
            protocol: "HTTP/1.1".into(),
            status: 200,
            size: 12,
            referer: "-".into(),
            user_agent: "Mozilla/5.0 (X11; Linux), \"quoted\"\ttab".into(),
            request_time: Some(0.25),
            forwarded_for: "203.0.113.9".into(),
            ..Default::default()
        }
    }

    #[test]
    fn csv_escapes_delimiters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let path = path.to_str().unwrap();

        let mut w = create_writer(path).unwrap();
        w.write_batch(&[sample()]).unwrap();
        w.finish().unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(COLUMNS.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some(",,10.0.0.1,-,GET / HTTP/1.1,GET,/,HTTP/1.1,200,12,-,\"Mozilla/5.0 (X11; Linux), \"\"quoted\"\"\ttab\",0.25,,,203.0.113.9")
        );
    }

    #[test]
    fn tsv_flattens_tabs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let path = path.to_str().unwrap();

        let mut w = create_writer(path).unwrap();
        w.write_batch(&[sample()]).unwrap();
        w.finish().unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let row = text.lines().nth(1).unwrap();
        let cells: Vec<&str> = row.split('\t').collect();
        assert_eq!(cells.len(), COLUMNS.len());
        assert_eq!(cells[4], "GET / HTTP/1.1");
        assert!(cells[11].ends_with("\"quoted\" tab"));
        assert_eq!(&cells[12..], ["0.25", "", "", "203.0.113.9"]);
    }

    #[test]
    fn json_file_is_an_array_across_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let path = path.to_str().unwrap();

        let mut w = create_writer(path).unwrap();
        w.write_batch(&[sample()]).unwrap();
        w.write_batch(&[]).unwrap();
        w.write_batch(&[sample(), sample()]).unwrap();
        w.finish().unwrap();

        let parsed: Vec<Record> = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[2], sample());
    }

    #[test]
    fn empty_json_file_is_an_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let path = path.to_str().unwrap();

        create_writer(path).unwrap().finish().unwrap();
        let parsed: Vec<Record> = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn jsonl_writes_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ndjson");
        let path = path.to_str().unwrap();

        let mut w = create_writer(path).unwrap();
        w.write_batch(&[sample(), sample()]).unwrap();
        w.finish().unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.contains("\"status\":200")));
    }

    #[test]
    fn bare_word_output_is_rejected() {
        assert!(create_writer("xml").is_err());
    }
}
