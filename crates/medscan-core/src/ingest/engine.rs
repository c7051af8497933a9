use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Command not found: {0}")]
    ToolNotFound(String),
    #[error("{tool} failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Output from an external command
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run an engine binary found on PATH, capturing its output
pub async fn run_tool<I, A>(program: &str, args: I) -> EngineResult<CommandOutput>
where
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let binary =
        which::which(program).map_err(|_| EngineError::ToolNotFound(program.to_string()))?;

    let output = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    Ok(CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

fn require_success(tool: &str, output: CommandOutput) -> EngineResult<String> {
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(EngineError::CommandFailed {
            tool: tool.to_string(),
            code: output.status.code(),
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// Image to text
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path) -> EngineResult<String>;
}

/// PDF text layer access
#[async_trait::async_trait]
pub trait PdfTextEngine: Send + Sync {
    async fn is_encrypted(&self, pdf: &Path) -> EngineResult<bool>;

    async fn text_layer(&self, pdf: &Path) -> EngineResult<String>;
}

/// OCR through the `tesseract` command-line tool
pub struct TesseractOcr {
    language: String,
    tessdata_dir: Option<PathBuf>,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>, tessdata_dir: Option<PathBuf>) -> Self {
        Self {
            language: language.into(),
            tessdata_dir,
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("eng", None)
    }
}

#[async_trait::async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &Path) -> EngineResult<String> {
        let mut args = vec![
            image.as_os_str().to_os_string(),
            "stdout".into(),
            "-l".into(),
            self.language.clone().into(),
        ];
        if let Some(ref dir) = self.tessdata_dir {
            args.push("--tessdata-dir".into());
            args.push(dir.as_os_str().to_os_string());
        }

        let output = run_tool("tesseract", &args).await?;
        require_success("tesseract", output)
    }
}

/// PDF handling through poppler's `pdfinfo` and `pdftotext`
#[derive(Default)]
pub struct PopplerPdf;

impl PopplerPdf {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl PdfTextEngine for PopplerPdf {
    async fn is_encrypted(&self, pdf: &Path) -> EngineResult<bool> {
        let output = run_tool("pdfinfo", [pdf.as_os_str()]).await?;

        // A user password stops pdfinfo before it can print anything
        if !output.status.success() && output.stderr.contains("Incorrect password") {
            return Ok(true);
        }

        let info = require_success("pdfinfo", output)?;
        Ok(parse_encrypted_flag(&info))
    }

    async fn text_layer(&self, pdf: &Path) -> EngineResult<String> {
        let output = run_tool(
            "pdftotext",
            [
                OsStr::new("-layout"),
                OsStr::new("-enc"),
                OsStr::new("UTF-8"),
                pdf.as_os_str(),
                OsStr::new("-"),
            ],
        )
        .await?;
        require_success("pdftotext", output)
    }
}

fn parse_encrypted_flag(info: &str) -> bool {
    info.lines()
        .find_map(|line| line.strip_prefix("Encrypted:"))
        .is_some_and(|value| value.trim_start().starts_with("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encrypted_flag() {
        let plain = "Producer:       LibreOffice\nEncrypted:      no\nPages:          2\n";
        let locked = "Encrypted:      yes (print:yes copy:no change:no addNotes:no)\nPages: 1\n";

        assert!(!parse_encrypted_flag(plain));
        assert!(parse_encrypted_flag(locked));
        assert!(!parse_encrypted_flag("Pages: 1\n"));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let result = run_tool("medscan-definitely-not-installed", ["--version"]).await;

        assert!(matches!(result, Err(EngineError::ToolNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_require_success_reports_stderr() {
        use std::os::unix::process::ExitStatusExt;

        let output = CommandOutput {
            status: ExitStatus::from_raw(1 << 8),
            stdout: String::new(),
            stderr: "Error opening data file\n".into(),
        };

        let err = require_success("tesseract", output).unwrap_err();
        assert!(err.to_string().contains("Error opening data file"));
    }
}
