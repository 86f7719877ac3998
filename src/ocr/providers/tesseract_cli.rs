//! Local OCR via the tesseract command-line binary.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use which::which;

use super::super::OcrEngine;

pub struct TesseractCliProvider {
    command_path: PathBuf,
}

impl TesseractCliProvider {
    /// `command_path` overrides binary discovery; otherwise `tesseract` must
    /// be on PATH.
    pub fn new(command_path: Option<String>) -> Result<Self> {
        let command_path = match command_path {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => which("tesseract")
                .context("tesseract binary not found in PATH; install it or set ocr.command_path")?,
        };

        info!("Using tesseract binary at {:?}", command_path);
        Ok(Self { command_path })
    }

    async fn run(&self, image_path: &Path, languages: &str) -> Result<String> {
        debug!("Running tesseract on {:?} (lang {})", image_path, languages);

        let output = tokio::process::Command::new(&self.command_path)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(languages)
            .output()
            .await
            .context("Failed to execute tesseract")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tesseract exited with {}: {}", output.status, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for TesseractCliProvider {
    fn name(&self) -> &'static str {
        "tesseract CLI"
    }

    async fn recognize(&self, image_path: &Path, languages: &str) -> Result<String> {
        match self.run(image_path, languages).await {
            Ok(text) => Ok(text),
            // Combined language packs are often missing; retry english-only
            // before giving up.
            Err(err) if languages != "eng" => {
                warn!("OCR with '{}' failed ({err:#}); retrying with eng", languages);
                self.run(image_path, "eng").await
            }
            Err(err) => Err(err),
        }
    }
}
