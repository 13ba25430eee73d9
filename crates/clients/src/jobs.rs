use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use joey_core::api::{GenerationRequest, JobApi, JobStatus, JobStatusReport, PublishReceipt};
use joey_core::ApiError;

/// HTTP adapter for the article generation pipeline.
pub struct JobServiceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

#[derive(Deserialize)]
struct StatusWire {
    status: String,
    #[serde(default)]
    progress: u8,
    #[serde(default)]
    current_step: String,
    #[serde(default)]
    error: Option<String>,
}

impl JobServiceClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder =
            self.http.request(method, format!("{}{path}", self.base_url.trim_end_matches('/')));
        if let Some(key) = &self.api_key {
            builder = builder.header("X-API-Key", key.expose_secret());
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response =
            builder.send().await.map_err(|error| ApiError::Upstream(error.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            return Err(ApiError::Upstream(format!("job service returned {status}")));
        }
        response.json().await.map_err(|error| ApiError::Upstream(error.to_string()))
    }
}

fn parse_status(raw: &str) -> JobStatus {
    match raw {
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "running" | "in_progress" => JobStatus::Running,
        _ => JobStatus::Queued,
    }
}

#[async_trait]
impl JobApi for JobServiceClient {
    async fn start_generation(&self, request: &GenerationRequest) -> Result<String, ApiError> {
        let mut payload = json!({
            "domain": request.domain,
            "topic": request.topic,
            "target_keyword": request.target_keyword,
        });
        if let Some(context) = &request.context {
            payload["context"] = json!(context);
        }

        let body =
            self.send(self.request(reqwest::Method::POST, "/api/pipeline/generate").json(&payload))
                .await?;
        let job_id = body
            .get("job_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Upstream("no job_id returned from generate".to_owned()))?
            .to_owned();
        info!(event_name = "clients.generation_started", %job_id, "generation job started");
        Ok(job_id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatusReport, ApiError> {
        let body = self
            .send(self.request(reqwest::Method::GET, &format!("/api/pipeline/status/{job_id}")))
            .await?;
        let wire: StatusWire = serde_json::from_value(body)
            .map_err(|error| ApiError::Upstream(format!("malformed status payload: {error}")))?;
        Ok(JobStatusReport {
            job_id: job_id.to_owned(),
            status: parse_status(&wire.status),
            progress: wire.progress.min(100),
            current_step: wire.current_step,
            error: wire.error,
        })
    }

    async fn result(&self, job_id: &str) -> Result<Value, ApiError> {
        let body = self
            .send(self.request(reqwest::Method::GET, &format!("/api/pipeline/result/{job_id}")))
            .await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn publish(&self, job_id: &str) -> Result<PublishReceipt, ApiError> {
        let body = self
            .send(self.request(reqwest::Method::POST, &format!("/api/pipeline/publish/{job_id}")))
            .await?;

        if body.get("status").and_then(Value::as_str) != Some("success") {
            let detail = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("publish did not succeed")
                .to_owned();
            return Err(ApiError::Upstream(detail));
        }

        let data = body.get("data").cloned().unwrap_or(Value::Null);
        Ok(PublishReceipt {
            preview_url: data.get("preview_url").and_then(Value::as_str).map(str::to_owned),
            pr_url: data.get("pr_url").and_then(Value::as_str).map(str::to_owned),
        })
    }
}
