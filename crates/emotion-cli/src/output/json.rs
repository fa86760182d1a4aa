//! JSON output adapter.

use std::io::{self, Write};
use std::sync::Mutex;

use anyhow::{Context, Result};
use emotion_core::{ImageResult, ResultOutput};
use serde::Serialize;

use super::OutputFormat;

/// Writes response documents as JSON Lines or as one JSON document.
///
/// In [`OutputFormat::Json`] mode results are held until [`flush`], which
/// writes them as a single array.
///
/// [`flush`]: ResultOutput::flush
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
    format: OutputFormat,
    pretty: bool,
    pending: Mutex<Vec<ImageResult>>,
}

impl JsonOutput {
    /// Creates a new JSON output writing to stdout.
    #[must_use]
    pub fn stdout(format: OutputFormat, pretty: bool) -> Self {
        Self::new(Box::new(io::stdout()), format, pretty)
    }

    /// Creates a new JSON output writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            format,
            pretty,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Writes any serializable value as a single JSON document.
    ///
    /// Used for the result array in `json` mode and for the `labels` and
    /// `metadata` commands.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_document<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        self.write_line(&json)
    }

    #[allow(clippy::significant_drop_tightening)]
    fn write_line(&self, line: &str) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writeln!(writer, "{line}").context("Failed to write output")?;
        Ok(())
    }
}

impl ResultOutput for JsonOutput {
    /// One compact line per result; `pretty` only applies to documents.
    fn write(&self, result: &ImageResult) -> Result<()> {
        match self.format {
            OutputFormat::Jsonl => {
                let json = serde_json::to_string(result)?;
                self.write_line(&json)
            }
            OutputFormat::Json => {
                self.pending
                    .lock()
                    .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?
                    .push(result.clone());
                Ok(())
            }
        }
    }

    #[allow(clippy::significant_drop_tightening)]
    fn flush(&self) -> Result<()> {
        if self.format == OutputFormat::Json {
            let pending = std::mem::take(
                &mut *self
                    .pending
                    .lock()
                    .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?,
            );
            self.write_document(&pending)?;
        }

        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use emotion_core::PredictResponse;

    use super::*;

    /// Writer that keeps its bytes reachable after being boxed.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn result(path: &str) -> ImageResult {
        ImageResult {
            path: path.into(),
            response: PredictResponse::ok(Vec::new()),
        }
    }

    #[test]
    fn test_jsonl_one_line_per_result() {
        let buf = SharedBuf::default();
        let output = JsonOutput::new(Box::new(buf.clone()), OutputFormat::Jsonl, true);

        output.write(&result("a.jpg")).unwrap();
        output.write(&result("b.jpg")).unwrap();
        output.flush().unwrap();

        let text = buf.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"path":"a.jpg","status":"ok","predictions":[]}"#
        );
    }

    #[test]
    fn test_document_pretty() {
        let buf = SharedBuf::default();
        let output = JsonOutput::new(Box::new(buf.clone()), OutputFormat::Jsonl, true);

        output.write_document(&[result("a.jpg")]).unwrap();

        let text = buf.text();
        assert!(text.starts_with("[\n"));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0]["path"], "a.jpg");
    }

    #[test]
    fn test_json_mode_writes_array_on_flush() {
        let buf = SharedBuf::default();
        let output = JsonOutput::new(Box::new(buf.clone()), OutputFormat::Json, false);

        output.write(&result("a.jpg")).unwrap();
        output.write(&result("b.jpg")).unwrap();
        assert!(buf.text().is_empty());

        output.flush().unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&buf.text()).unwrap();
        let items = parsed.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["path"], "b.jpg");
        assert_eq!(items[1]["status"], "ok");
    }

    #[test]
    fn test_json_mode_empty_batch_is_empty_array() {
        let buf = SharedBuf::default();
        let output = JsonOutput::new(Box::new(buf.clone()), OutputFormat::Json, false);

        output.flush().unwrap();

        assert_eq!(buf.text().trim(), "[]");
    }
}
