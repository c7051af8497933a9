mod engine;
mod extractor;
mod pipeline;
mod structuring;

pub use engine::{
    run_tool, CommandOutput, EngineError, EngineResult, OcrEngine, PdfTextEngine, PopplerPdf,
    TesseractOcr,
};
pub use extractor::TextExtractor;
pub use pipeline::{ExtractionPipeline, IngestState, ScanOutcome};
pub use structuring::{
    sanitize, DomainPrompt, Structurer, StructuringClient, StructuringError,
    GENERIC_FAILURE_MESSAGE, NO_CONTENT_MESSAGE, RATE_LIMIT_MESSAGE, TIMEOUT_MESSAGE,
};
