//! OCR engine abstraction and provider selection.
//!
//! Recognition runs out-of-band (it can take seconds) and its completion
//! re-enters the engine as a queued event, so a slow provider never blocks
//! presence processing.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use crate::config::OcrConfig;

pub mod providers;

pub use providers::{HttpOcrProvider, TesseractCliProvider};

#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Recognize text in the image at `image_path`. `languages` is the
    /// engine-specific hint, e.g. "eng+chi_sim".
    async fn recognize(&self, image_path: &Path, languages: &str) -> Result<String>;
}

/// Build the OCR engine the config asks for.
pub fn build_engine(config: &OcrConfig) -> Result<Box<dyn OcrEngine>> {
    let engine: Box<dyn OcrEngine> = match config.provider.as_str() {
        "tesseract-cli" => Box::new(TesseractCliProvider::new(config.command_path.clone())?),
        "http-api" => {
            let endpoint = match &config.api_endpoint {
                Some(endpoint) if !endpoint.is_empty() => endpoint.clone(),
                _ => bail!("api_endpoint is required for the http-api OCR provider"),
            };
            Box::new(HttpOcrProvider::new(endpoint, config.api_key.clone()))
        }
        other => bail!(
            "Unknown OCR provider '{}'. Supported providers: tesseract-cli, http-api",
            other
        ),
    };

    info!("Using {} for OCR", engine.name());
    Ok(engine)
}
