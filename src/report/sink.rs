//! Report delivery.
//!
//! The sink is a webhook with no idempotency key, so duplicate-publish
//! avoidance stays with the engine: a sink call either fully succeeds or the
//! engine treats the publish as failed and leaves state untouched.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver the rendered report, optionally attaching the screenshot it
    /// was reconciled from.
    async fn publish(&self, content: &str, attachment: Option<&Path>) -> Result<()>;
}

/// Pushes reports to a chat webhook as a multipart form: a `payload_json`
/// part with the message content plus an optional image file part.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl ReportSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn publish(&self, content: &str, attachment: Option<&Path>) -> Result<()> {
        let payload = serde_json::json!({ "content": content });
        let mut form = reqwest::multipart::Form::new()
            .text("payload_json", payload.to_string());

        if let Some(path) = attachment {
            debug!("Attaching screenshot {:?} to report", path);
            let bytes = tokio::fs::read(path)
                .await
                .context("Failed to read report attachment")?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attendance.png".to_string());
            form = form.part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );
        }

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach report webhook")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Webhook rejected report with status {status}: {body}");
        }

        info!("Report published ({} chars)", content.len());
        Ok(())
    }
}

/// Stands in when no webhook is configured; every publish fails loudly
/// instead of silently dropping reports.
pub struct DisabledSink;

#[async_trait]
impl ReportSink for DisabledSink {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn publish(&self, _content: &str, _attachment: Option<&Path>) -> Result<()> {
        Err(anyhow!(
            "No report webhook configured; set report.webhook_url in config"
        ))
    }
}

/// Build the sink the config asks for.
pub fn build_sink(webhook_url: Option<&str>) -> Box<dyn ReportSink> {
    match webhook_url {
        Some(url) if !url.is_empty() => Box::new(WebhookSink::new(url.to_string())),
        _ => Box::new(DisabledSink),
    }
}
