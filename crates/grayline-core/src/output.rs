//! Machine-readable run output in JSON or JSON Lines.

use serde::Serialize;
use std::io::{self, Write};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON array
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// A writer that serializes records to JSON or JSONL.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// Create a new output writer.
    ///
    /// `pretty` only affects the JSON format; JSONL is always one object per line.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            items_written: 0,
        }
    }

    /// Write a single record followed by a newline.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        if self.pretty && self.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        self.items_written += 1;
        Ok(())
    }

    /// Write a batch: a JSON array, or one line per record.
    pub fn write_all<T: Serialize>(&mut self, items: &[T]) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, items)
                        .map_err(io::Error::other)?;
                } else {
                    serde_json::to_writer(&mut self.writer, items).map_err(io::Error::other)?;
                }
                writeln!(self.writer)?;
                self.items_written += items.len();
            }
            OutputFormat::JsonLines => {
                for item in items {
                    self.write(item)?;
                }
            }
        }
        Ok(())
    }

    /// Get the number of records written.
    pub fn items_written(&self) -> usize {
        self.items_written
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Consume the writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemOutcome, OutputRecord, ProcessingStats, RunSummary};
    use std::path::PathBuf;

    fn records() -> Vec<OutputRecord> {
        vec![
            OutputRecord::Item(ItemOutcome {
                index: 0,
                source: PathBuf::from("images/a.jpg"),
                success: true,
            }),
            OutputRecord::Summary(RunSummary {
                stats: ProcessingStats {
                    succeeded: 1,
                    ..Default::default()
                },
                failed_stage: None,
                failed_input: None,
                error: None,
            }),
        ]
    }

    #[test]
    fn test_write_jsonl_one_record_per_line() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::JsonLines, true);
        for record in &records() {
            writer.write(record).unwrap();
        }
        assert_eq!(writer.items_written(), 2);

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("{\"type\":\"item\""));
        assert!(lines[1].contains("\"type\":\"summary\""));
        assert!(lines[1].contains("\"succeeded\":1"));
    }

    #[test]
    fn test_write_all_json_array() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::Json, false);
        writer.write_all(&records()).unwrap();
        assert_eq!(writer.items_written(), 2);

        let output = String::from_utf8(writer.into_inner()).unwrap();
        assert!(output.starts_with('['));
        assert!(output.trim().ends_with(']'));

        let parsed: Vec<OutputRecord> = serde_json::from_str(&output).unwrap();
        assert!(matches!(&parsed[0], OutputRecord::Item(o) if o.success));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("JSONL"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("ndjson"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("yaml"), None);
    }
}
