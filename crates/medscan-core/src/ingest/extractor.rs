use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

use super::engine::{EngineError, OcrEngine, PdfTextEngine, PopplerPdf, TesseractOcr};
use crate::config::Config;
use crate::document::{ExtractedText, ExtractionStatus, FileFormat};

/// Turns uploaded bytes into plain text.
///
/// Never fails: every problem is reported through [`ExtractionStatus`]. The
/// bytes are decoded into a scratch file for the engines to read, and that
/// file is removed on every exit path, cancellation included.
pub struct TextExtractor {
    ocr: Arc<dyn OcrEngine>,
    pdf: Arc<dyn PdfTextEngine>,
    scratch_dir: PathBuf,
}

impl TextExtractor {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        pdf: Arc<dyn PdfTextEngine>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ocr,
            pdf,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Tesseract and poppler, configured from `config`
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(TesseractOcr::new(
                config.ocr_language.clone(),
                config.tessdata_dir.clone(),
            )),
            Arc::new(PopplerPdf::new()),
            config.scratch_dir.clone(),
        )
    }

    pub async fn extract(&self, bytes: &[u8], filename: &str) -> ExtractedText {
        let Some(format) = FileFormat::from_filename(filename) else {
            tracing::warn!("Unsupported file type: {}", filename);
            return ExtractedText::failed(ExtractionStatus::UnsupportedFormat);
        };

        let scratch = match self.write_scratch(bytes, format).await {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Could not stage {} for extraction: {}", filename, e);
                return ExtractedText::failed(ExtractionStatus::EngineFailure);
            }
        };

        let extracted = if format.is_image() {
            self.extract_image(scratch.path()).await
        } else {
            self.extract_pdf(scratch.path()).await
        };

        if let Err(e) = scratch.close() {
            tracing::warn!("Failed to remove scratch copy of {}: {}", filename, e);
        }

        match extracted {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Text extraction failed for {}: {}", filename, e);
                ExtractedText::failed(ExtractionStatus::EngineFailure)
            }
        }
    }

    async fn extract_image(&self, path: &Path) -> Result<ExtractedText, EngineError> {
        let text = self.ocr.recognize(path).await?;
        Ok(ExtractedText::ok(text))
    }

    async fn extract_pdf(&self, path: &Path) -> Result<ExtractedText, EngineError> {
        if self.pdf.is_encrypted(path).await? {
            tracing::info!("Refusing encrypted PDF");
            return Ok(ExtractedText::failed(ExtractionStatus::EncryptedSource));
        }

        let text = self.pdf.text_layer(path).await?;
        Ok(ExtractedText::ok(text))
    }

    async fn write_scratch(
        &self,
        bytes: &[u8],
        format: FileFormat,
    ) -> std::io::Result<NamedTempFile> {
        let dir = self.scratch_dir.clone();
        let data = bytes.to_vec();
        let suffix = format!(".{}", format.extension());

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir)?;
            let mut file = tempfile::Builder::new()
                .prefix("medscan-")
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            file.write_all(&data)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::super::engine::EngineResult;
    use super::*;
    use std::sync::Mutex;

    /// Engine double that records the paths it was handed
    pub(crate) struct FakeEngine {
        pub ocr_text: Option<String>,
        pub pdf_text: Option<String>,
        pub encrypted: bool,
        pub seen: Mutex<Vec<(PathBuf, bool)>>,
    }

    impl FakeEngine {
        pub(crate) fn reading(text: &str) -> Self {
            Self {
                ocr_text: Some(text.to_string()),
                pdf_text: Some(text.to_string()),
                encrypted: false,
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn broken() -> Self {
            Self {
                ocr_text: None,
                pdf_text: None,
                encrypted: false,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, path: &Path) {
            self.seen
                .lock()
                .unwrap()
                .push((path.to_path_buf(), path.exists()));
        }

        fn answer(text: Option<&String>) -> EngineResult<String> {
            text.cloned().ok_or_else(|| EngineError::CommandFailed {
                tool: "fake".into(),
                code: Some(1),
                stderr: "engine exploded".into(),
            })
        }
    }

    #[async_trait::async_trait]
    impl OcrEngine for FakeEngine {
        async fn recognize(&self, image: &Path) -> EngineResult<String> {
            self.record(image);
            Self::answer(self.ocr_text.as_ref())
        }
    }

    #[async_trait::async_trait]
    impl PdfTextEngine for FakeEngine {
        async fn is_encrypted(&self, pdf: &Path) -> EngineResult<bool> {
            self.record(pdf);
            Ok(self.encrypted)
        }

        async fn text_layer(&self, pdf: &Path) -> EngineResult<String> {
            self.record(pdf);
            Self::answer(self.pdf_text.as_ref())
        }
    }

    fn extractor(engine: &Arc<FakeEngine>, scratch: &Path) -> TextExtractor {
        TextExtractor::new(engine.clone(), engine.clone(), scratch)
    }

    fn scratch_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
    }

    #[tokio::test]
    async fn test_image_ocr() {
        let scratch = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::reading("PARACETAMOL 500mg"));

        let result = extractor(&engine, scratch.path())
            .extract(b"\x89PNG", "label.png")
            .await;

        assert_eq!(result, ExtractedText::ok("PARACETAMOL 500mg".into()));
        let seen = engine.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].1, "engine must see the scratch copy");
        assert!(seen[0].0.to_string_lossy().ends_with(".png"));
        assert!(!seen[0].0.exists());
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn test_engine_failure_is_contained() {
        let scratch = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::broken());
        let extractor = extractor(&engine, scratch.path());

        for name in ["a.jpg", "b.jpeg", "c.png", "d.webp", "e.JPG"] {
            let result = extractor.extract(b"bytes", name).await;
            assert_eq!(result.status, ExtractionStatus::EngineFailure, "{name}");
            assert!(result.text.is_empty());
        }
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let scratch = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::reading("never"));

        let result = extractor(&engine, scratch.path())
            .extract(b"PK\x03\x04", "report.docx")
            .await;

        assert_eq!(result, ExtractedText::failed(ExtractionStatus::UnsupportedFormat));
        assert!(engine.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pdf_text_layer() {
        let scratch = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::reading("Hemoglobin 13.5 g/dL"));

        let result = extractor(&engine, scratch.path())
            .extract(b"%PDF-1.7", "cbc.pdf")
            .await;

        assert!(result.is_ok());
        assert_eq!(result.text, "Hemoglobin 13.5 g/dL");
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn test_encrypted_pdf_skips_extraction() {
        let scratch = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine {
            encrypted: true,
            ..FakeEngine::reading("secret")
        });

        let result = extractor(&engine, scratch.path())
            .extract(b"%PDF-1.7", "locked.pdf")
            .await;

        assert_eq!(result, ExtractedText::failed(ExtractionStatus::EncryptedSource));
        // only the encryption probe ran, no text layer and no OCR
        assert_eq!(engine.seen.lock().unwrap().len(), 1);
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn test_unwritable_scratch_dir() {
        let scratch = tempfile::tempdir().unwrap();
        let blocker = scratch.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let engine = Arc::new(FakeEngine::reading("text"));

        let result = extractor(&engine, &blocker.join("sub"))
            .extract(b"bytes", "label.png")
            .await;

        assert_eq!(result.status, ExtractionStatus::EngineFailure);
    }
}
