//! Generic HTTP describer.
//!
//! Posts the segment file and the instruction as a multipart form to a configured
//! endpoint and expects `{"text": "..."}` back.

use super::{upload_file_name, Describer};
use crate::error::{LecternError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Deserialize)]
struct DescribeResponse {
    text: String,
}

/// Describer backed by a multimodal HTTP endpoint.
pub struct HttpDescriber {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
    model: String,
}

impl HttpDescriber {
    pub fn new(endpoint: &str, token: Option<String>, model: &str) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), endpoint, token, model)
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoint: &str,
        token: Option<String>,
        model: &str,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| LecternError::Config(format!("Invalid describer endpoint '{}': {}", endpoint, e)))?;

        Ok(Self {
            client,
            endpoint,
            token: token.filter(|t| !t.is_empty()),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Describer for HttpDescriber {
    #[instrument(skip(self, instruction), fields(media_path = %media_path.display()))]
    async fn describe(&self, media_path: &Path, instruction: &str) -> Result<String> {
        let file_bytes = tokio::fs::read(media_path).await?;
        debug!("Uploading {} bytes to {}", file_bytes.len(), self.endpoint);

        let part = Part::bytes(file_bytes)
            .file_name(upload_file_name(media_path))
            .mime_str(mime_for(media_path))?;

        let form = Form::new()
            .text("model", self.model.clone())
            .text("instruction", instruction.to_string())
            .part("file", part);

        let mut request = self.client.post(self.endpoint.clone()).multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response: DescribeResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Content type for a segment file, by extension.
fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        Some("ts") => "video/mp2t",
        _ => "application/octet-stream",
    }
}
