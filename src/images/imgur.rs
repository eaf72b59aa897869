//! Imgur-backed image host.

use super::{ImageHost, ImageUpload};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Uploads images to Imgur's anonymous upload API.
pub struct ImgurClient {
    client: Client,
    endpoint: String,
    client_id: String,
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    image: String,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: serde_json::Value,
}

impl ImgurClient {
    /// Build a client with an explicit request timeout.
    pub fn new(endpoint: impl Into<String>, client_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            client_id: client_id.into(),
        })
    }
}

#[async_trait]
impl ImageHost for ImgurClient {
    async fn upload(&self, image: &ImageUpload) -> Result<String> {
        let request = UploadRequest {
            image: STANDARD.encode(&image.data),
            kind: "base64",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::AUTHORIZATION, format!("Client-ID {}", self.client_id))
            .header(header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;

        parse_upload_response(status, &body)
    }
}

fn map_transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Upload("Image host timed out".to_string())
    } else {
        AppError::Upload(format!("Image host unreachable: {}", e))
    }
}

/// Turn an Imgur response into the hosted link or an upload error.
fn parse_upload_response(status: StatusCode, body: &[u8]) -> Result<String> {
    let decoded: std::result::Result<UploadResponse, _> = serde_json::from_slice(body);

    let response = match decoded {
        Ok(response) => response,
        Err(_) if !status.is_success() => {
            return Err(AppError::Upload(format!("Image host returned {}", status)));
        }
        Err(e) => {
            return Err(AppError::Upload(format!(
                "Malformed image host response: {}",
                e
            )));
        }
    };

    if !status.is_success() || !response.success {
        let detail = error_detail(&response.data)
            .unwrap_or_else(|| format!("Image host returned {}", status));
        return Err(AppError::Upload(detail));
    }

    response
        .data
        .get("link")
        .and_then(|link| link.as_str())
        .filter(|link| !link.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Upload("Image host response has no link".to_string()))
}

/// Imgur reports `data.error` either as a string or as `{ "message": ... }`.
fn error_detail(data: &serde_json::Value) -> Option<String> {
    match data.get("error")? {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Object(fields) => fields
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
