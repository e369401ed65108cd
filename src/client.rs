//! One-shot REST operations against the generation backend
//!
//! Everything here is a single request/response exchange: uploading a file,
//! submitting a prompt, fetching a final result. Nothing retries
//! automatically: a rejected submission is surfaced to the caller, who
//! decides whether to resubmit. The periodic status/log fetches used by the
//! [`TaskMonitor`](crate::monitor::TaskMonitor) go through the
//! [`TaskPoller`] impl at the bottom of this module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::poller::{LogsUpdate, StatusUpdate, TaskPoller};
use crate::types::{CategoryKey, FileRef, TaskHandle, TaskId};

/// Backend acknowledgement for an uploaded file
#[derive(Clone, Debug, Deserialize)]
pub struct UploadReceipt {
    /// Filename under which the backend stored the upload
    pub filename: String,
}

/// Final generated content for a completed task
#[derive(Clone, Debug, Deserialize)]
pub struct GeneratedOutput {
    /// The generated RTL text
    pub output: String,
}

/// Backend health report
#[derive(Clone, Debug, Deserialize)]
pub struct BackendHealth {
    /// Overall backend status string (e.g. "healthy")
    pub status: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    task_id: String,
}

/// HTTP client for the generation backend's REST surface
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GenerationClient {
    /// Build a client from the given configuration
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    /// Resolve an endpoint by appending path segments to the base URL
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut parts = url.path_segments_mut().map_err(|()| Error::Config {
                message: format!("base URL {} cannot carry a path", self.base_url),
            })?;
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }

    /// Upload one file for a module/category pair (multipart POST `/upload`)
    pub async fn upload_file(
        &self,
        module: &str,
        category: CategoryKey,
        file: &FileRef,
    ) -> Result<UploadReceipt> {
        let url = self.endpoint(&["upload"])?;
        let part = reqwest::multipart::Part::bytes(file.payload().to_vec())
            .file_name(file.name().to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("module", module.to_string())
            .text("category", category.as_str());

        let response = self.http.post(url).multipart(form).send().await?;
        let response = check_status(response).await?;
        let receipt: UploadReceipt = response.json().await?;
        tracing::debug!(
            module,
            category = %category,
            filename = %receipt.filename,
            "file uploaded"
        );
        Ok(receipt)
    }

    /// Submit a generation prompt and obtain a handle for the created task
    ///
    /// Fails with [`Error::Submission`] if the backend rejects the request;
    /// never retried automatically.
    pub async fn submit_prompt(&self, prompt: &str) -> Result<TaskHandle> {
        let url = self.endpoint(&["generate"])?;
        let response = self
            .http
            .post(url)
            .json(&GenerateRequest { prompt })
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: GenerateResponse = response.json().await?;
        let handle = TaskHandle::new(TaskId::new(body.task_id));
        tracing::debug!(task_id = %handle.id, "generation task created");
        Ok(handle)
    }

    /// Fetch the current status and progress for a task (GET `/status/{id}`)
    pub async fn fetch_status(&self, id: &TaskId) -> Result<StatusUpdate> {
        let url = self.endpoint(&["status", id.as_str()])?;
        let response = check_status(self.http.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Fetch the full accumulated log text for a task (GET `/logs/{id}`)
    pub async fn fetch_logs(&self, id: &TaskId) -> Result<LogsUpdate> {
        let url = self.endpoint(&["logs", id.as_str()])?;
        let response = check_status(self.http.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Fetch the final generated output for a task (GET `/result/{id}`)
    pub async fn fetch_result(&self, handle: &TaskHandle) -> Result<GeneratedOutput> {
        let url = self.endpoint(&["result", handle.id.as_str()])?;
        let response = check_status(self.http.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    /// The addressable location of a task's downloadable package
    ///
    /// Hands out the locator only; the bytes are fetched by whatever native
    /// download mechanism the caller uses.
    pub fn download_url(&self, handle: &TaskHandle) -> Result<Url> {
        self.endpoint(&["download", handle.id.as_str()])
    }

    /// Check backend health (GET `/health`)
    pub async fn health(&self) -> Result<BackendHealth> {
        let url = self.endpoint(&["health"])?;
        let response = check_status(self.http.get(url).send().await?).await?;
        Ok(response.json().await?)
    }
}

/// Map a non-2xx response to [`Error::Submission`] with its body preserved
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Submission { status, body })
}

#[async_trait]
impl TaskPoller for GenerationClient {
    async fn fetch_status(&self, id: &TaskId) -> Result<StatusUpdate> {
        GenerationClient::fetch_status(self, id).await
    }

    async fn fetch_logs(&self, id: &TaskId) -> Result<LogsUpdate> {
        GenerationClient::fetch_logs(self, id).await
    }
}
