// crates/cosmo-tester-core/src/rest.rs
// ============================================================================
// Module: Manager REST Client
// Description: Trait boundary and blocking HTTP client for the manager API.
// Purpose: Query manager status, entity collections, executions and events.
// Dependencies: reqwest, serde, serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! The manager REST API is an external collaborator reached through the
//! [`ManagerClient`] trait. [`HttpManagerClient`] implements it against the
//! v2 API with reqwest's blocking client; tests substitute in-memory fakes.
//! Entities that the harness only compares (blueprints, deployments, node
//! instances, plugins, events) stay as raw JSON objects keyed by `id`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cosmo_tester_config::Credentials;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// API prefix for every request.
const API_PREFIX: &str = "api/v2/";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Manager status label for a healthy manager.
pub const STATUS_RUNNING: &str = "running";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the REST boundary.
#[derive(Debug, Error)]
pub enum RestError {
    /// The management endpoint could not be turned into a URL.
    #[error("invalid management endpoint {endpoint}: {detail}")]
    InvalidEndpoint {
        /// Endpoint as configured.
        endpoint: String,
        /// Parse failure detail.
        detail: String,
    },
    /// The request could not be sent or the connection failed.
    #[error("request to {url} failed: {detail}")]
    Request {
        /// Request URL.
        url: String,
        /// Transport failure detail.
        detail: String,
    },
    /// The manager answered with a non-success status.
    #[error("request to {url} returned HTTP {status}: {body}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// The response body did not match the expected shape.
    #[error("response from {url} could not be decoded: {detail}")]
    Decode {
        /// Request URL.
        url: String,
        /// Decode failure detail.
        detail: String,
    },
    /// The entity does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind.
        kind: &'static str,
        /// Entity identifier.
        id: String,
    },
}

// ============================================================================
// SECTION: Models
// ============================================================================

/// Manager status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStatus {
    /// Status label (`running` when healthy).
    pub status: String,
    /// Per-service details.
    #[serde(default)]
    pub services: Vec<Value>,
}

impl ManagerStatus {
    /// Returns whether the manager reports `running`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == STATUS_RUNNING
    }
}

/// Execution lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Queued, not started.
    Pending,
    /// Running.
    Started,
    /// Cancellation requested.
    Cancelling,
    /// Forced cancellation requested.
    ForceCancelling,
    /// Cancelled (end state).
    Cancelled,
    /// Completed successfully (end state).
    Terminated,
    /// Failed (end state).
    Failed,
    /// Status label this harness does not know.
    Other(String),
}

impl ExecutionStatus {
    /// Parses a status label.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "pending" => Self::Pending,
            "started" => Self::Started,
            "cancelling" => Self::Cancelling,
            "force_cancelling" => Self::ForceCancelling,
            "cancelled" => Self::Cancelled,
            "terminated" => Self::Terminated,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the status label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Cancelling => "cancelling",
            Self::ForceCancelling => "force_cancelling",
            Self::Cancelled => "cancelled",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
            Self::Other(label) => label,
        }
    }

    /// Returns whether the status is final.
    #[must_use]
    pub const fn is_end_state(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Terminated | Self::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow execution record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Execution identifier.
    pub id: String,
    /// Workflow identifier.
    #[serde(default)]
    pub workflow_id: String,
    /// Deployment the execution belongs to, if any.
    #[serde(default)]
    pub deployment_id: Option<String>,
    /// Raw status label.
    pub status: String,
    /// Error text for failed executions.
    #[serde(default)]
    pub error: String,
}

impl Execution {
    /// Returns the parsed status.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        ExecutionStatus::from_label(&self.status)
    }
}

/// Snapshot record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot identifier.
    pub id: String,
    /// Status label (`creating`, `created`, `failed`).
    pub status: String,
    /// Error text for failed snapshots.
    #[serde(default)]
    pub error: Option<String>,
}

/// Paged list envelope.
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    /// Page items.
    items: Vec<T>,
}

/// Returns the `id` field of a raw entity.
#[must_use]
pub fn entity_id(entity: &Value) -> Option<&str> {
    entity.get("id").and_then(Value::as_str)
}

// ============================================================================
// SECTION: Client Seam
// ============================================================================

/// Manager REST operations used by the harness.
pub trait ManagerClient: Send + Sync {
    /// Returns the manager status.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn status(&self) -> Result<ManagerStatus, RestError>;

    /// Lists blueprints.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn blueprints(&self) -> Result<Vec<Value>, RestError>;

    /// Lists deployments.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn deployments(&self) -> Result<Vec<Value>, RestError>;

    /// Lists node instances of one deployment.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn node_instances(&self, deployment_id: &str) -> Result<Vec<Value>, RestError>;

    /// Fetches one execution.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn execution(&self, execution_id: &str) -> Result<Execution, RestError>;

    /// Lists executions, optionally filtered by deployment.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn executions(&self, deployment_id: Option<&str>) -> Result<Vec<Execution>, RestError>;

    /// Starts a workflow execution.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn start_execution(
        &self,
        deployment_id: &str,
        workflow_id: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Execution, RestError>;

    /// Returns up to `batch_size` events of an execution.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn events(
        &self,
        execution_id: &str,
        batch_size: usize,
        include_logs: bool,
    ) -> Result<Vec<Value>, RestError>;

    /// Fetches one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn snapshot(&self, snapshot_id: &str) -> Result<Snapshot, RestError>;

    /// Lists snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn snapshots(&self) -> Result<Vec<Snapshot>, RestError>;

    /// Starts snapshot creation and returns the creating execution.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn create_snapshot(&self, snapshot_id: &str, include_metrics: bool)
    -> Result<Execution, RestError>;

    /// Starts a snapshot restore and returns the restoring execution.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn restore_snapshot(&self, snapshot_id: &str, force: bool) -> Result<Execution, RestError>;

    /// Deletes a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), RestError>;

    /// Deletes a deployment.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn delete_deployment(&self, deployment_id: &str, ignore_live_nodes: bool)
    -> Result<(), RestError>;

    /// Deletes a blueprint.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn delete_blueprint(&self, blueprint_id: &str) -> Result<(), RestError>;

    /// Lists plugins.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn plugins(&self) -> Result<Vec<Value>, RestError>;

    /// Deletes a plugin.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails.
    fn delete_plugin(&self, plugin_id: &str) -> Result<(), RestError>;
}

/// Shared handle to a manager client.
pub type SharedClient = Arc<dyn ManagerClient>;

/// Builds clients for a management endpoint.
pub trait ManagerClientFactory: Send + Sync {
    /// Connects to the manager at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the endpoint is invalid or the client cannot
    /// be built.
    fn connect(&self, endpoint: &str) -> Result<SharedClient, RestError>;
}

// ============================================================================
// SECTION: HTTP Client
// ============================================================================

/// Blocking HTTP implementation of [`ManagerClient`].
#[derive(Debug, Clone)]
pub struct HttpManagerClient {
    /// Base URL ending in `/`.
    base: Url,
    /// HTTP client.
    client: Client,
    /// Basic-auth credentials.
    credentials: Option<Credentials>,
}

impl HttpManagerClient {
    /// Creates a client for an endpoint (`10.0.0.5` or `https://host:port`).
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the endpoint is invalid or the client cannot
    /// be built.
    pub fn new(
        endpoint: &str,
        credentials: Option<Credentials>,
        trust_all: bool,
        timeout: Duration,
    ) -> Result<Self, RestError> {
        let base = base_url(endpoint)?;
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(trust_all)
            .build()
            .map_err(|err| RestError::Request {
                url: base.to_string(),
                detail: err.to_string(),
            })?;
        Ok(Self {
            base,
            client,
            credentials,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolves API path segments with query pairs.
    ///
    /// Each segment is percent-encoded, so ids never alter the path.
    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, RestError> {
        let invalid = |detail: String| RestError::InvalidEndpoint {
            endpoint: self.base.to_string(),
            detail,
        };
        let mut url = self.base.join(API_PREFIX).map_err(|err| invalid(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("endpoint cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Applies credentials and sends a request.
    fn send(&self, request: RequestBuilder, url: &Url) -> Result<reqwest::blocking::Response, RestError> {
        let request = match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => request,
        };
        let response = request.send().map_err(|err| RestError::Request {
            url: url.to_string(),
            detail: err.to_string(),
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(RestError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    /// Decodes a JSON response body.
    fn decode<T: DeserializeOwned>(
        response: reqwest::blocking::Response,
        url: &Url,
    ) -> Result<T, RestError> {
        response.json::<T>().map_err(|err| RestError::Decode {
            url: url.to_string(),
            detail: err.to_string(),
        })
    }

    /// Sends a GET and decodes the body.
    fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, RestError> {
        let url = self.url(segments, query)?;
        let response = self.send(self.client.get(url.clone()), &url)?;
        Self::decode(response, &url)
    }

    /// Sends a GET for a paged collection and returns its items.
    fn list<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, RestError> {
        Ok(self.get::<ListResponse<T>>(&[collection], query)?.items)
    }

    /// Sends a GET for one entity, mapping 404 to [`RestError::NotFound`].
    fn get_entity<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        collection: &str,
        id: &str,
    ) -> Result<T, RestError> {
        not_found_as(self.get(&[collection, id], &[]), kind, id)
    }

    /// Sends a request with a JSON body and decodes the response.
    fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
        body: &Value,
    ) -> Result<T, RestError> {
        let response = self.send(request.json(body), url)?;
        Self::decode(response, url)
    }

    /// Sends a DELETE for one entity, mapping 404 to [`RestError::NotFound`].
    fn delete(
        &self,
        kind: &'static str,
        collection: &str,
        id: &str,
        query: &[(&str, &str)],
    ) -> Result<(), RestError> {
        let url = self.url(&[collection, id], query)?;
        let sent = self.send(self.client.delete(url.clone()), &url).map(|_| ());
        not_found_as(sent, kind, id)
    }
}

/// Maps an HTTP 404 to [`RestError::NotFound`] for `kind` `id`.
fn not_found_as<T>(
    result: Result<T, RestError>,
    kind: &'static str,
    id: &str,
) -> Result<T, RestError> {
    match result {
        Err(RestError::Status {
            status: 404, ..
        }) => Err(RestError::NotFound {
            kind,
            id: id.to_string(),
        }),
        other => other,
    }
}

impl ManagerClient for HttpManagerClient {
    fn status(&self) -> Result<ManagerStatus, RestError> {
        self.get(&["status"], &[])
    }

    fn blueprints(&self) -> Result<Vec<Value>, RestError> {
        self.list("blueprints", &[])
    }

    fn deployments(&self) -> Result<Vec<Value>, RestError> {
        self.list("deployments", &[])
    }

    fn node_instances(&self, deployment_id: &str) -> Result<Vec<Value>, RestError> {
        self.list("node-instances", &[("deployment_id", deployment_id)])
    }

    fn execution(&self, execution_id: &str) -> Result<Execution, RestError> {
        self.get_entity("execution", "executions", execution_id)
    }

    fn executions(&self, deployment_id: Option<&str>) -> Result<Vec<Execution>, RestError> {
        match deployment_id {
            Some(deployment_id) => self.list("executions", &[("deployment_id", deployment_id)]),
            None => self.list("executions", &[]),
        }
    }

    fn start_execution(
        &self,
        deployment_id: &str,
        workflow_id: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Execution, RestError> {
        let url = self.url(&["executions"], &[])?;
        let body = json!({
            "deployment_id": deployment_id,
            "workflow_id": workflow_id,
            "parameters": parameters,
        });
        self.send_json(self.client.post(url.clone()), &url, &body)
    }

    fn events(
        &self,
        execution_id: &str,
        batch_size: usize,
        include_logs: bool,
    ) -> Result<Vec<Value>, RestError> {
        let size = batch_size.to_string();
        let mut query = vec![
            ("execution_id", execution_id),
            ("_offset", "0"),
            ("_size", size.as_str()),
            ("type", "cloudify_event"),
        ];
        if include_logs {
            query.push(("type", "cloudify_log"));
        }
        self.list("events", &query)
    }

    fn snapshot(&self, snapshot_id: &str) -> Result<Snapshot, RestError> {
        self.get_entity("snapshot", "snapshots", snapshot_id)
    }

    fn snapshots(&self) -> Result<Vec<Snapshot>, RestError> {
        self.list("snapshots", &[])
    }

    fn create_snapshot(
        &self,
        snapshot_id: &str,
        include_metrics: bool,
    ) -> Result<Execution, RestError> {
        let url = self.url(&["snapshots", snapshot_id], &[])?;
        let body = json!({
            "include_metrics": include_metrics,
            "include_credentials": true,
        });
        self.send_json(self.client.put(url.clone()), &url, &body)
    }

    fn restore_snapshot(&self, snapshot_id: &str, force: bool) -> Result<Execution, RestError> {
        let url = self.url(&["snapshots", snapshot_id, "restore"], &[])?;
        let body = json!({
            "recreate_deployments_envs": true,
            "force": force,
        });
        self.send_json(self.client.post(url.clone()), &url, &body)
    }

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), RestError> {
        self.delete("snapshot", "snapshots", snapshot_id, &[])
    }

    fn delete_deployment(
        &self,
        deployment_id: &str,
        ignore_live_nodes: bool,
    ) -> Result<(), RestError> {
        let flag = if ignore_live_nodes { "true" } else { "false" };
        self.delete("deployment", "deployments", deployment_id, &[("ignore_live_nodes", flag)])
    }

    fn delete_blueprint(&self, blueprint_id: &str) -> Result<(), RestError> {
        self.delete("blueprint", "blueprints", blueprint_id, &[])
    }

    fn plugins(&self) -> Result<Vec<Value>, RestError> {
        self.list("plugins", &[])
    }

    fn delete_plugin(&self, plugin_id: &str) -> Result<(), RestError> {
        self.delete("plugin", "plugins", plugin_id, &[])
    }
}

/// Turns a bare host or a URL into a base URL ending in `/`.
fn base_url(endpoint: &str) -> Result<Url, RestError> {
    let trimmed = endpoint.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let mut url = Url::parse(&candidate).map_err(|err| RestError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        detail: err.to_string(),
    })?;
    if url.host_str().is_none() {
        return Err(RestError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            detail: "missing host".to_string(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Builds [`HttpManagerClient`] instances with shared settings.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    /// Basic-auth credentials.
    credentials: Option<Credentials>,
    /// Accept any TLS certificate.
    trust_all: bool,
    /// Per-request timeout.
    timeout: Duration,
}

impl HttpClientFactory {
    /// Creates a factory.
    #[must_use]
    pub const fn new(credentials: Option<Credentials>, trust_all: bool) -> Self {
        Self {
            credentials,
            trust_all,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Returns a factory using the given per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ManagerClientFactory for HttpClientFactory {
    fn connect(&self, endpoint: &str) -> Result<SharedClient, RestError> {
        let client =
            HttpManagerClient::new(endpoint, self.credentials.clone(), self.trust_all, self.timeout)?;
        Ok(Arc::new(client))
    }
}
