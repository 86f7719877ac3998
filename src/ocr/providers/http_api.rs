//! OCR via a remote recognition API.
//!
//! Sends the image as base64 in a JSON body and expects the recognized text
//! back. Useful when the host has no local tesseract install.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error};

use super::super::OcrEngine;

#[derive(Debug, Serialize)]
struct RecognizeRequest {
    image: String,
    languages: String,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    text: String,
}

pub struct HttpOcrProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpOcrProvider {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl OcrEngine for HttpOcrProvider {
    fn name(&self) -> &'static str {
        "HTTP OCR API"
    }

    async fn recognize(&self, image_path: &Path, languages: &str) -> Result<String> {
        let bytes = tokio::fs::read(image_path)
            .await
            .context("Failed to read image for OCR")?;

        debug!(
            "Submitting {} bytes to OCR endpoint {}",
            bytes.len(),
            self.endpoint
        );

        let body = RecognizeRequest {
            image: base64::engine::general_purpose::STANDARD.encode(&bytes),
            languages: languages.to_string(),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", key);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach OCR endpoint")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read OCR response body")?;

        if !status.is_success() {
            error!("OCR request failed with status {}: {}", status, response_text);
            anyhow::bail!("OCR request failed with status {status}: {response_text}");
        }

        let parsed: RecognizeResponse =
            serde_json::from_str(&response_text).context("Failed to parse OCR response")?;

        Ok(parsed.text)
    }
}
