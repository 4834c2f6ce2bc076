//! Async client entry point.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::bridge::BridgeClient;
use crate::config::ClientConfig;
use crate::constitution::ConstitutionClient;
use crate::error::Result;
use crate::memory::MemoryClient;
use crate::transport::Transport;
use crate::types::{
    Alert, DirectoryListing, EvaluationRequest, EvaluationResult, HealthStatus, Memory,
    MemoryQueryResult, OmegaScore, Proposal, ProposalReceipt, QueryRequest, RecordRequest,
};

/// Async client for the Bravo Zero platform.
///
/// Clones share one connection pool. Closing any clone closes all of them.
///
/// ```rust,ignore
/// let client = AsyncClient::from_env()?;
/// let result = client
///     .evaluate("read_file", json!({"path": "/project/src/main.py"}))
///     .await?;
/// if result.is_permitted() {
///     let source = client.read_file("/project/src/main.py").await?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AsyncClient {
    transport: Arc<Transport>,
    constitution: ConstitutionClient,
    memory: MemoryClient,
    bridge: BridgeClient,
}

/// Closes the transport when dropped.
struct CloseGuard(Arc<Transport>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl AsyncClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(Transport::new(&config)?);
        Ok(Self {
            constitution: ConstitutionClient::new(transport.clone()),
            memory: MemoryClient::new(transport.clone()),
            bridge: BridgeClient::new(transport.clone()),
            transport,
        })
    }

    /// Build a client from `BRAVOZERO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Open a client, run `body` with it, and close it afterwards.
    ///
    /// The client is closed on every exit path: success, error, panic, or the
    /// returned future being dropped early.
    pub async fn scoped<F, Fut, T>(config: ClientConfig, body: F) -> Result<T>
    where
        F: FnOnce(AsyncClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = Self::new(config)?;
        let _guard = CloseGuard(client.transport.clone());
        body(client).await
    }

    pub fn constitution(&self) -> &ConstitutionClient {
        &self.constitution
    }

    pub fn memory(&self) -> &MemoryClient {
        &self.memory
    }

    pub fn bridge(&self) -> &BridgeClient {
        &self.bridge
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.transport.agent_id()
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Release the client. Later calls on any clone fail with
    /// [`crate::Error::Closed`].
    pub fn close(&self) {
        self.transport.close();
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    // Shortcuts for the common calls.

    /// Evaluate `action` with a JSON object as context.
    pub async fn evaluate(&self, action: &str, context: Value) -> Result<EvaluationResult> {
        self.constitution
            .evaluate(EvaluationRequest::new(action).context(context))
            .await
    }

    pub async fn get_omega(&self) -> Result<OmegaScore> {
        self.constitution.get_omega().await
    }

    pub async fn get_health(&self) -> Result<HealthStatus> {
        self.constitution.get_health().await
    }

    pub async fn get_alerts(&self) -> Result<Vec<Alert>> {
        self.constitution.get_alerts().await
    }

    pub async fn submit_proposal(
        &self,
        title: &str,
        description: &str,
        category: &str,
    ) -> Result<ProposalReceipt> {
        self.constitution
            .submit_proposal(Proposal::new(title, description, category))
            .await
    }

    pub async fn record<I, S>(&self, content: &str, importance: f64, tags: I) -> Result<Memory>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.memory
            .record(RecordRequest::new(content).importance(importance).tags(tags))
            .await
    }

    pub async fn query(&self, query: &str, limit: usize) -> Result<MemoryQueryResult> {
        self.memory.query(QueryRequest::new(query).limit(limit)).await
    }

    pub async fn list_files(&self, path: &str) -> Result<DirectoryListing> {
        self.bridge.list_files(path).await
    }

    pub async fn read_file(&self, path: &str) -> Result<String> {
        self.bridge.read_file(path).await
    }
}
