//! GitHub repository API client
//!
//! Lists branches and triggers `workflow_dispatch` runs.

mod error;

pub use error::RepoError;

use crate::runtime::RepoClient;
use crate::state_machine::state::DispatchRequest;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const ACCEPT_GITHUB_V3: &str = "application/vnd.github.v3+json";

/// Default per-request timeout for repository calls
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A branch as returned by `GET /branches`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Branch {
    pub name: String,
}

/// Body of `POST /actions/workflows/{file}/dispatches`
#[derive(Debug, Serialize)]
struct WorkflowDispatchBody<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    inputs: WorkflowInputs<'a>,
}

#[derive(Debug, Serialize)]
struct WorkflowInputs<'a> {
    mode: &'a str,
    image_tag: &'a str,
}

impl<'a> WorkflowDispatchBody<'a> {
    fn from_request(request: &'a DispatchRequest) -> Self {
        Self {
            git_ref: &request.branch,
            inputs: WorkflowInputs {
                mode: request.mode.as_str(),
                image_tag: request.tag.as_str(),
            },
        }
    }
}

/// Client for one repository, e.g. `https://api.github.com/repos/owner/name`
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: String,
    workflow_file: String,
}

impl GitHubClient {
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        workflow_file: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RepoError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            workflow_file: workflow_file.into(),
        })
    }

    fn branches_url(&self) -> String {
        format!("{}/branches", self.base_url)
    }

    fn dispatch_url(&self) -> String {
        format!(
            "{}/actions/workflows/{}/dispatches",
            self.base_url, self.workflow_file
        )
    }

    /// Send an authenticated request and return the body of a 2xx response
    async fn send(&self, request: RequestBuilder, url: &str) -> Result<String, RepoError> {
        let response = request
            .header(reqwest::header::ACCEPT, ACCEPT_GITHUB_V3)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| RepoError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RepoError::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(RepoError::Http {
                status,
                url: url.to_string(),
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl RepoClient for GitHubClient {
    async fn list_branches(&self) -> Result<Vec<Branch>, RepoError> {
        let url = self.branches_url();
        let body = self.send(self.client.get(&url), &url).await?;
        serde_json::from_str(&body).map_err(|e| RepoError::Decode {
            url,
            message: format!("{e} - body: {body}"),
        })
    }

    async fn dispatch_workflow(&self, request: &DispatchRequest) -> Result<(), RepoError> {
        let url = self.dispatch_url();
        let body = WorkflowDispatchBody::from_request(request);
        self.send(self.client.post(&url).json(&body), &url).await?;
        Ok(())
    }
}

/// Logging wrapper for repository clients
pub struct LoggingRepoClient<R> {
    inner: R,
}

impl<R: RepoClient> LoggingRepoClient<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

fn log_failure(operation: &str, duration: Duration, error: &RepoError) {
    match error {
        RepoError::Http { status, url, body } => tracing::error!(
            operation,
            duration_ms = %duration.as_millis(),
            status = %status,
            url = %url,
            body = %body,
            "HTTP error occurred"
        ),
        other => tracing::error!(
            operation,
            duration_ms = %duration.as_millis(),
            error = %other,
            "Other error occurred"
        ),
    }
}

#[async_trait]
impl<R: RepoClient> RepoClient for LoggingRepoClient<R> {
    async fn list_branches(&self) -> Result<Vec<Branch>, RepoError> {
        let start = Instant::now();
        let result = self.inner.list_branches().await;
        let duration = start.elapsed();

        match &result {
            Ok(branches) => tracing::info!(
                duration_ms = %duration.as_millis(),
                count = branches.len(),
                "Branches listed"
            ),
            Err(e) => log_failure("list_branches", duration, e),
        }
        result
    }

    async fn dispatch_workflow(&self, request: &DispatchRequest) -> Result<(), RepoError> {
        let start = Instant::now();
        let result = self.inner.dispatch_workflow(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(()) => tracing::info!(
                duration_ms = %duration.as_millis(),
                branch = %request.branch,
                mode = %request.mode,
                tag = %request.tag,
                "Workflow started."
            ),
            Err(e) => log_failure("dispatch_workflow", duration, e),
        }
        result
    }
}
