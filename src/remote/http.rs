//! HTTP implementation of the backend boundary.

use async_trait::async_trait;
use serde_json::json;

use super::{AdminReport, RenderBackend, StatusPayload, SubmitResponse};
use crate::error::{Error, Result};

/// Backend client over plain HTTP.
///
/// Paths are fixed relative to the base URL; per-call deadlines are applied
/// by the callers (monitor, dispatcher, health prober), not here.
#[derive(Debug, Clone)]
pub struct HttpRenderBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRenderBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(Error::Backend {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RenderBackend for HttpRenderBackend {
    async fn submit_command(&self, command: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url("/api/commands"))
            .json(&json!({ "command": command }))
            .send()
            .await?;
        let body: SubmitResponse = Self::check(response).await?.json().await?;
        body.task_id.ok_or(Error::MissingTaskId)
    }

    async fn task_status(&self, task_id: &str) -> Result<StatusPayload> {
        let response = self
            .client
            .get(self.url(&format!("/api/tasks/{task_id}/status")))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn cancel_task(&self, task_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/api/tasks/{task_id}/cancel")))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn probe_liveness(&self) -> Result<()> {
        let response = self.client.get(self.url("/api/health")).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn notify_admin(&self, report: &AdminReport) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/admin/notify"))
            .json(report)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let backend = HttpRenderBackend::new("http://localhost:8080/");
        assert_eq!(
            backend.url("/api/health"),
            "http://localhost:8080/api/health"
        );
    }
}
