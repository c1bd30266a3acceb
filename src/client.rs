use reqwest::header::CONTENT_DISPOSITION;
use serde::de::DeserializeOwned;

use crate::api::REPORT_FILENAME;
use crate::error::ClientError;
use crate::models::{
    EndResponse, ErrorBody, Reason, Reply, ResetRequest, ResetResponse, StartRequest, StartResponse,
    StatsResponse,
};

/// A file handed back by `GET /download`
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The delay backend as seen by the page.
/// Backend-reported errors come back as `Reply::Failure`; `Err` means no
/// usable reply arrived at all.
#[allow(async_fn_in_trait)]
pub trait DelayApi {
    async fn start(&self, reason: Reason) -> Result<Reply<StartResponse>, ClientError>;
    async fn end(&self) -> Result<Reply<EndResponse>, ClientError>;
    async fn reset(&self, password: &str) -> Result<Reply<ResetResponse>, ClientError>;
    async fn stats(&self) -> Result<StatsResponse, ClientError>;
    async fn download(&self) -> Result<Download, ClientError>;
}

/// `DelayApi` over HTTP
pub struct HttpDelayApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDelayApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decodes the body whatever the status: 4xx and 5xx replies still carry
    /// `{error}`. Only a body that is not a reply at all becomes an `Err`.
    async fn reply<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Reply<T>, ClientError> {
        let status = response.status();
        let body = response.bytes().await?;
        match serde_json::from_slice::<Reply<T>>(&body) {
            Ok(reply) => Ok(reply),
            Err(_) if !status.is_success() => Err(ClientError::Status {
                status: status.as_u16(),
            }),
            Err(e) => Err(ClientError::Decode(e)),
        }
    }

    /// Turns a failed status into `Server` when the body names the error
    async fn failure(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        match response.json::<ErrorBody>().await {
            Ok(body) => ClientError::Server(body.error),
            Err(_) => ClientError::Status { status },
        }
    }
}

impl DelayApi for HttpDelayApi {
    async fn start(&self, reason: Reason) -> Result<Reply<StartResponse>, ClientError> {
        let body = StartRequest {
            reason: Some(reason.as_str().to_string()),
        };
        let response = self.client.post(self.url("/start")).json(&body).send().await?;
        Self::reply(response).await
    }

    async fn end(&self) -> Result<Reply<EndResponse>, ClientError> {
        let response = self.client.post(self.url("/end")).send().await?;
        Self::reply(response).await
    }

    async fn reset(&self, password: &str) -> Result<Reply<ResetResponse>, ClientError> {
        let body = ResetRequest {
            password: Some(password.to_string()),
        };
        let response = self.client.post(self.url("/reset")).json(&body).send().await?;
        Self::reply(response).await
    }

    async fn stats(&self) -> Result<StatsResponse, ClientError> {
        let response = self.client.get(self.url("/stats")).send().await?;
        match Self::reply::<StatsResponse>(response).await? {
            Reply::Success(stats) => Ok(stats),
            Reply::Failure { error } => Err(ClientError::Server(error)),
        }
    }

    async fn download(&self) -> Result<Download, ClientError> {
        let response = self.client.get(self.url("/download")).send().await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_filename)
            .unwrap_or_else(|| REPORT_FILENAME.to_string());
        let bytes = response.bytes().await?.to_vec();

        Ok(Download { filename, bytes })
    }
}

/// Pulls `filename` out of a `Content-Disposition` value, keeping only the
/// final path component.
fn attachment_filename(disposition: &str) -> Option<String> {
    let value = disposition
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?;
    let name = value.trim_matches('"');
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if name.is_empty() || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}
