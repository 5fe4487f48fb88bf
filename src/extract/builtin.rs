use crate::config::ExtractionConfig;
use crate::crawler::DocumentKind;
use crate::extract::{docx_text, strip_rtf, xlsx_text, ExtractionError, Extractor};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Cap on decompressed parts and converter output unless configured
pub const DEFAULT_MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

/// Stderr kept for error messages
const MAX_STDERR_BYTES: u64 = 64 * 1024;

/// Extractor used by the CLI
///
/// Configured commands win over the in-process extractors, so a user can
/// plug in e.g. `antiword` for `.doc` or replace the docx reader entirely.
#[derive(Debug, Clone)]
pub struct BuiltinExtractor {
    commands: BTreeMap<String, Vec<String>>,
    timeout: Duration,
    max_part_bytes: u64,
}

impl BuiltinExtractor {
    pub fn new(commands: BTreeMap<String, Vec<String>>, timeout: Duration) -> Self {
        Self {
            commands,
            timeout,
            max_part_bytes: DEFAULT_MAX_PART_BYTES,
        }
    }

    /// Sets the decompression and converter output cap
    pub fn with_max_part_bytes(mut self, limit: u64) -> Self {
        self.max_part_bytes = limit;
        self
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.commands.clone(), Duration::from_secs(config.timeout_secs))
            .with_max_part_bytes(config.max_part_bytes)
    }
}

#[async_trait]
impl Extractor for BuiltinExtractor {
    async fn extract(&self, bytes: Vec<u8>, hint: &DocumentKind) -> Result<String, ExtractionError> {
        if let Some(command) = self.commands.get(hint.extension()) {
            return run_command(command, bytes, self.timeout, self.max_part_bytes).await;
        }

        let limit = self.max_part_bytes;
        match hint {
            DocumentKind::Txt | DocumentKind::Csv => Ok(decode_text(&bytes)),
            DocumentKind::Rtf => blocking(move || Ok(strip_rtf(&decode_text(&bytes)))).await,
            DocumentKind::Docx => blocking(move || docx_text(&bytes, limit)).await,
            DocumentKind::Xlsx => blocking(move || xlsx_text(&bytes, limit)).await,
            other => Err(ExtractionError::Unsupported(other.extension().to_string())),
        }
    }
}

async fn blocking<F>(work: F) -> Result<String, ExtractionError>
where
    F: FnOnce() -> Result<String, ExtractionError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ExtractionError::Task(e.to_string()))?
}

/// Decodes text files: UTF-16 with a BOM, otherwise lossy UTF-8
fn decode_text(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(body, u16::from_le_bytes);
    }
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(body, u16::from_be_bytes);
    }
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(body).into_owned()
}

fn decode_utf16(body: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Pipes the document into an external program and returns its stdout
///
/// Output beyond `max_output` bytes kills the program and fails the document.
async fn run_command(
    command: &[String],
    bytes: Vec<u8>,
    timeout: Duration,
    max_output: u64,
) -> Result<String, ExtractionError> {
    let Some((program, args)) = command.split_first() else {
        return Err(ExtractionError::Command {
            program: String::new(),
            message: "empty command".to_string(),
        });
    };
    let failed = |message: String| ExtractionError::Command {
        program: program.clone(),
        message,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| failed(format!("cannot start: {}", e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        tokio::spawn(async move {
            // The program may exit without reading everything
            let _ = stdin.write_all(&bytes).await;
        });
    }

    let stderr_task = child.stderr.take().map(|stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.take(MAX_STDERR_BYTES).read_to_end(&mut buf).await;
            buf
        })
    });

    let run = async {
        let mut stdout = Vec::new();
        if let Some(out) = child.stdout.take() {
            out.take(max_output.saturating_add(1)).read_to_end(&mut stdout).await?;
        }
        if stdout.len() as u64 > max_output {
            child.kill().await?;
            return Ok(None);
        }
        let status = child.wait().await?;
        Ok::<_, std::io::Error>(Some((status, stdout)))
    };

    let (status, stdout) = match tokio::time::timeout(timeout, run).await {
        Ok(Ok(Some(finished))) => finished,
        Ok(Ok(None)) => {
            return Err(failed(format!("output exceeds {} bytes", max_output)));
        }
        Ok(Err(e)) => return Err(failed(e.to_string())),
        Err(_) => {
            return Err(ExtractionError::Timeout {
                program: program.clone(),
                secs: timeout.as_secs(),
            })
        }
    };

    if !status.success() {
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };
        let stderr = String::from_utf8_lossy(&stderr);
        let message = stderr
            .lines()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim().to_string())
            .unwrap_or_else(|| format!("exited with {}", status));
        return Err(failed(message));
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(commands: &[(&str, &[&str])]) -> BuiltinExtractor {
        let commands = commands
            .iter()
            .map(|(ext, argv)| {
                (
                    ext.to_string(),
                    argv.iter().map(|a| a.to_string()).collect(),
                )
            })
            .collect();
        BuiltinExtractor::new(commands, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_plain_text_and_csv() {
        let e = extractor(&[]);
        let text = e
            .extract(b"\xEF\xBB\xBFname,ssn\nbob,123".to_vec(), &DocumentKind::Csv)
            .await
            .unwrap();
        assert_eq!(text, "name,ssn\nbob,123");

        let lossy = e
            .extract(b"ok \xff done".to_vec(), &DocumentKind::Txt)
            .await
            .unwrap();
        assert_eq!(lossy, "ok \u{FFFD} done");
    }

    #[tokio::test]
    async fn test_utf16_text() {
        let e = extractor(&[]);
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "hi".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(e.extract(bytes, &DocumentKind::Txt).await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_rtf() {
        let e = extractor(&[]);
        let text = e
            .extract(br"{\rtf1 Internal only\par}".to_vec(), &DocumentKind::Rtf)
            .await
            .unwrap();
        assert_eq!(text, "Internal only\n");
    }

    #[tokio::test]
    async fn test_unsupported_without_command() {
        let e = extractor(&[]);
        let err = e
            .extract(b"%PDF-1.4".to_vec(), &DocumentKind::Pdf)
            .await
            .unwrap_err();
        assert_eq!(err, ExtractionError::Unsupported("pdf".to_string()));
    }

    #[tokio::test]
    async fn test_corrupt_docx() {
        let e = extractor(&[]);
        let err = e
            .extract(b"not a zip".to_vec(), &DocumentKind::Docx)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Corrupt { ref kind, .. } if kind == "docx"));
    }

    #[tokio::test]
    async fn test_external_command() {
        let e = extractor(&[("pdf", &["cat"])]);
        let text = e
            .extract(b"piped through".to_vec(), &DocumentKind::Pdf)
            .await
            .unwrap();
        assert_eq!(text, "piped through");
    }

    #[tokio::test]
    async fn test_external_command_failure() {
        let e = extractor(&[("pdf", &["sh", "-c", "echo 'Syntax Error: broken' >&2; exit 1"])]);
        let err = e
            .extract(b"%PDF-".to_vec(), &DocumentKind::Pdf)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExtractionError::Command {
                program: "sh".to_string(),
                message: "Syntax Error: broken".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_program() {
        let e = extractor(&[("pdf", &["/nonexistent/pdftotext"])]);
        let err = e
            .extract(b"%PDF-".to_vec(), &DocumentKind::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Command { ref message, .. } if message.starts_with("cannot start")));
    }

    #[tokio::test]
    async fn test_command_output_capped() {
        let e = extractor(&[("pdf", &["sh", "-c", "yes aaaaaaaa | head -c 100000"])])
            .with_max_part_bytes(1024);
        let err = e
            .extract(b"%PDF-".to_vec(), &DocumentKind::Pdf)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExtractionError::Command {
                program: "sh".to_string(),
                message: "output exceeds 1024 bytes".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_oversized_docx_rejected() {
        use std::io::{Cursor, Write};

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<w:document><w:body><w:p><w:r><w:t>").unwrap();
        writer.write_all(&vec![b'a'; 2 * 1024 * 1024]).unwrap();
        writer.write_all(b"</w:t></w:r></w:p></w:body></w:document>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let e = extractor(&[]).with_max_part_bytes(64 * 1024);
        let err = e.extract(bytes, &DocumentKind::Docx).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Corrupt { ref kind, .. } if kind == "docx"));
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let mut e = extractor(&[("pdf", &["sleep", "5"])]);
        e.timeout = Duration::from_millis(100);
        let err = e
            .extract(Vec::new(), &DocumentKind::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout { .. }));
    }
}
