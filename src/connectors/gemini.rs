//! Model-backed transformation
//!
//! Two prompts per item against the `generateContent` endpoint: one for the
//! summary, one for the full content. [`UrlTransformer`] hands the model the
//! item URL; [`UploadTransformer`] downloads the media first and pushes it
//! through the Files API.
//!
//! Clients are built with zero HTTP-level retries: throttling has to reach
//! the retry driver as an error, not be absorbed here.

use crate::auth::AuthConfig;
use crate::config::{render_id, PipelineConfig, TransformConfig};
use crate::connector::Transformer;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use crate::types::{Item, TransformOutput};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default API root
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Metadata of an uploaded file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Resource name, `files/<id>`
    pub name: String,
    /// URI to reference in prompts
    #[serde(default)]
    pub uri: String,
    /// MIME type as stored
    #[serde(default)]
    pub mime_type: Option<String>,
    /// `PROCESSING`, `ACTIVE` or `FAILED`
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(Error::transform(format!("prompt blocked: {reason}")));
        }
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::transform("model returned no candidates"))?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(Error::transform(format!(
                "model returned no text (finish reason {reason})"
            )));
        }
        Ok(text)
    }
}

// ============================================================================
// Shared Client
// ============================================================================

/// What the model should look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// File or item URI
    pub uri: String,
    /// MIME type, when known
    pub mime_type: Option<String>,
}

/// Thin `generateContent` / Files API client
#[derive(Debug)]
pub struct GeminiClient {
    http: HttpClient,
    model: String,
}

impl GeminiClient {
    /// Create a client against the public API
    pub fn new(api_key: &str, model: impl Into<String>) -> Result<Self> {
        Self::with_base_url(GEMINI_API_BASE, api_key, model)
    }

    /// Create a client against another API root
    pub fn with_base_url(base_url: &str, api_key: &str, model: impl Into<String>) -> Result<Self> {
        let builder = HttpClientConfig::builder()
            .base_url(base_url)
            .timeout(Duration::from_secs(600))
            .max_retries(0);
        let http = HttpClient::with_config(AuthConfig::query_key("key", api_key).apply(builder).build())?;
        Ok(Self {
            http,
            model: model.into(),
        })
    }

    /// Run one prompt against a file
    pub async fn generate(&self, file: &FileRef, prompt: &str) -> Result<String> {
        let mut file_data = json!({ "fileUri": file.uri });
        if let Some(mime) = &file.mime_type {
            file_data["mimeType"] = json!(mime);
        }
        let body = json!({
            "contents": [{
                "parts": [
                    { "fileData": file_data },
                    { "text": prompt }
                ]
            }]
        });
        let path = format!("v1beta/models/{}:generateContent", self.model);
        let response: GenerateResponse = self.http.post_json(&path, body).await?;
        response.into_text()
    }

    /// Summary and content for one file
    pub async fn summarize(
        &self,
        file: &FileRef,
        summary_prompt: &str,
        content_prompt: &str,
    ) -> Result<TransformOutput> {
        let summary = self.generate(file, summary_prompt).await?;
        let content = self.generate(file, content_prompt).await?;
        Ok(TransformOutput {
            summary: summary.trim().to_string(),
            content,
        })
    }

    /// Upload bytes through the resumable Files API
    pub async fn upload(&self, display_name: &str, mime_type: &str, data: bytes::Bytes) -> Result<UploadedFile> {
        let start = self
            .http
            .request(
                Method::POST,
                "upload/v1beta/files",
                RequestConfig::new()
                    .header("X-Goog-Upload-Protocol", "resumable")
                    .header("X-Goog-Upload-Command", "start")
                    .header("X-Goog-Upload-Header-Content-Length", data.len().to_string())
                    .header("X-Goog-Upload-Header-Content-Type", mime_type)
                    .json(json!({ "file": { "display_name": display_name } })),
            )
            .await?;
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| Error::transform("upload start returned no upload URL"))?;

        let response: UploadResponse = self
            .http
            .request_json(
                Method::POST,
                &upload_url,
                RequestConfig::new()
                    .header("X-Goog-Upload-Offset", "0")
                    .header("X-Goog-Upload-Command", "upload, finalize")
                    .bytes(data),
            )
            .await?;
        Ok(response.file)
    }

    /// Current metadata of an uploaded file
    pub async fn file(&self, name: &str) -> Result<UploadedFile> {
        self.http
            .get_json(&format!("v1beta/{name}"), RequestConfig::new())
            .await
    }

    /// Delete an uploaded file
    pub async fn delete_file(&self, name: &str) -> Result<()> {
        self.http.delete(&format!("v1beta/{name}")).await?;
        Ok(())
    }
}

// ============================================================================
// URL Transformer
// ============================================================================

/// Points the model at the item's public URL
#[derive(Debug)]
pub struct UrlTransformer {
    client: GeminiClient,
    summary_prompt: String,
    content_prompt: String,
    item_url_template: String,
}

impl UrlTransformer {
    /// Create a transformer from pipeline settings
    pub fn new(client: GeminiClient, config: &PipelineConfig) -> Self {
        Self {
            client,
            summary_prompt: config.transform.summary_prompt.clone(),
            content_prompt: config.transform.content_prompt.clone(),
            item_url_template: config.item_url_template.clone(),
        }
    }
}

#[async_trait]
impl Transformer for UrlTransformer {
    fn name(&self) -> &'static str {
        "gemini-url"
    }

    async fn transform(&self, item: &Item) -> Result<TransformOutput> {
        let uri = item
            .url
            .clone()
            .unwrap_or_else(|| render_id(&self.item_url_template, &item.id));
        debug!(id = %item.id, uri = %uri, "Transforming from URL");
        let file = FileRef {
            uri,
            mime_type: None,
        };
        self.client
            .summarize(&file, &self.summary_prompt, &self.content_prompt)
            .await
    }
}

// ============================================================================
// Upload Transformer
// ============================================================================

/// Downloads media, uploads it, and prompts against the uploaded file
#[derive(Debug)]
pub struct UploadTransformer {
    client: GeminiClient,
    media: HttpClient,
    media_url_template: String,
    mime_type: String,
    summary_prompt: String,
    content_prompt: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl UploadTransformer {
    /// Create a transformer from transform settings
    pub fn new(client: GeminiClient, config: &TransformConfig) -> Result<Self> {
        let media_url_template = config
            .media_url_template
            .clone()
            .ok_or_else(|| Error::missing_field("transform.media_url_template"))?;
        let media = HttpClient::with_config(
            HttpClientConfig::builder()
                .timeout(Duration::from_secs(600))
                .max_retries(2)
                .build(),
        )?;
        Ok(Self {
            client,
            media,
            media_url_template,
            mime_type: config.media_mime_type.clone(),
            summary_prompt: config.summary_prompt.clone(),
            content_prompt: config.content_prompt.clone(),
            poll_interval: Duration::from_secs(2),
            max_polls: 150,
        })
    }

    /// Set how often and how long to wait for an upload to become active
    #[must_use]
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    async fn wait_until_active(&self, mut file: UploadedFile) -> Result<UploadedFile> {
        let mut polls = 0;
        loop {
            match file.state.as_deref() {
                Some("ACTIVE") | None => return Ok(file),
                Some("FAILED") => {
                    return Err(Error::transform(format!("processing of {} failed", file.name)));
                }
                Some(_) if polls >= self.max_polls => {
                    return Err(Error::transform(format!(
                        "{} still processing after {polls} polls",
                        file.name
                    )));
                }
                Some(_) => {
                    tokio::time::sleep(self.poll_interval).await;
                    file = self.client.file(&file.name).await?;
                    polls += 1;
                }
            }
        }
    }

    async fn transform_uploaded(&self, file: UploadedFile) -> Result<TransformOutput> {
        let file = self.wait_until_active(file).await?;
        let file_ref = FileRef {
            uri: file.uri,
            mime_type: Some(file.mime_type.unwrap_or_else(|| self.mime_type.clone())),
        };
        self.client
            .summarize(&file_ref, &self.summary_prompt, &self.content_prompt)
            .await
    }
}

#[async_trait]
impl Transformer for UploadTransformer {
    fn name(&self) -> &'static str {
        "gemini-upload"
    }

    async fn transform(&self, item: &Item) -> Result<TransformOutput> {
        let media_url = render_id(&self.media_url_template, &item.id);
        let data = self.media.get_bytes(&media_url).await?;
        info!(id = %item.id, bytes = data.len(), "Downloaded media");

        let uploaded = self.client.upload(&item.id, &self.mime_type, data).await?;
        let name = uploaded.name.clone();
        let result = self.transform_uploaded(uploaded).await;

        if let Err(e) = self.client.delete_file(&name).await {
            warn!(id = %item.id, file = %name, "Failed to delete uploaded file: {e}");
        }
        result
    }
}
