//! Blocking client.
//!
//! Wraps [`AsyncClient`] with a private current-thread runtime. Do not call
//! it from inside an async runtime: `block_on` panics there. Async code should
//! use [`AsyncClient`] directly.

use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use crate::bridge::{BridgeClient, ListOptions};
use crate::client::AsyncClient;
use crate::config::ClientConfig;
use crate::constitution::ConstitutionClient;
use crate::error::Result;
use crate::memory::{MemoryClient, RelatedQuery};
use crate::types::{
    Alert, DirectoryListing, Edge, EvaluationRequest, EvaluationResult, FileInfo, HealthStatus,
    Memory, MemoryQueryResult, MemoryUpdate, OmegaScore, Proposal, ProposalReceipt, QueryRequest,
    RecordRequest, SyncStatus,
};

/// Blocking client for the Bravo Zero platform.
///
/// ```rust,ignore
/// let client = bravozero::Client::from_env()?;
/// let omega = client.get_omega()?;
/// println!("Omega: {:.2} ({})", omega.omega, omega.trend);
/// ```
#[derive(Debug)]
pub struct Client {
    runtime: Runtime,
    inner: AsyncClient,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let inner = AsyncClient::new(config)?;
        Ok(Self { runtime, inner })
    }

    /// Build a client from `BRAVOZERO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn constitution(&self) -> Constitution<'_> {
        Constitution {
            runtime: &self.runtime,
            client: self.inner.constitution(),
        }
    }

    pub fn memory(&self) -> Memories<'_> {
        Memories {
            runtime: &self.runtime,
            client: self.inner.memory(),
        }
    }

    pub fn bridge(&self) -> Bridge<'_> {
        Bridge {
            runtime: &self.runtime,
            client: self.inner.bridge(),
        }
    }

    /// The async client this one drives.
    pub fn as_async(&self) -> &AsyncClient {
        &self.inner
    }

    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn evaluate(&self, action: &str, context: Value) -> Result<EvaluationResult> {
        self.runtime.block_on(self.inner.evaluate(action, context))
    }

    pub fn get_omega(&self) -> Result<OmegaScore> {
        self.runtime.block_on(self.inner.get_omega())
    }

    pub fn get_health(&self) -> Result<HealthStatus> {
        self.runtime.block_on(self.inner.get_health())
    }

    pub fn get_alerts(&self) -> Result<Vec<Alert>> {
        self.runtime.block_on(self.inner.get_alerts())
    }

    pub fn submit_proposal(
        &self,
        title: &str,
        description: &str,
        category: &str,
    ) -> Result<ProposalReceipt> {
        self.runtime
            .block_on(self.inner.submit_proposal(title, description, category))
    }

    pub fn record<I, S>(&self, content: &str, importance: f64, tags: I) -> Result<Memory>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runtime
            .block_on(self.inner.record(content, importance, tags))
    }

    pub fn query(&self, query: &str, limit: usize) -> Result<MemoryQueryResult> {
        self.runtime.block_on(self.inner.query(query, limit))
    }

    pub fn list_files(&self, path: &str) -> Result<DirectoryListing> {
        self.runtime.block_on(self.inner.list_files(path))
    }

    pub fn read_file(&self, path: &str) -> Result<String> {
        self.runtime.block_on(self.inner.read_file(path))
    }
}

/// Blocking view of [`ConstitutionClient`].
#[derive(Debug, Clone, Copy)]
pub struct Constitution<'a> {
    runtime: &'a Runtime,
    client: &'a ConstitutionClient,
}

impl Constitution<'_> {
    pub fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResult> {
        self.runtime.block_on(self.client.evaluate(request))
    }

    pub fn get_omega(&self) -> Result<OmegaScore> {
        self.runtime.block_on(self.client.get_omega())
    }

    pub fn get_health(&self) -> Result<HealthStatus> {
        self.runtime.block_on(self.client.get_health())
    }

    pub fn get_alerts(&self) -> Result<Vec<Alert>> {
        self.runtime.block_on(self.client.get_alerts())
    }

    pub fn submit_proposal(&self, proposal: Proposal) -> Result<ProposalReceipt> {
        self.runtime.block_on(self.client.submit_proposal(proposal))
    }

    pub fn list_rules(&self, category: Option<&str>, priority: Option<&str>) -> Result<Vec<Value>> {
        self.runtime
            .block_on(self.client.list_rules(category, priority))
    }

    pub fn get_rule(&self, rule_id: &str) -> Result<Value> {
        self.runtime.block_on(self.client.get_rule(rule_id))
    }

    pub fn get_values(&self) -> Result<Value> {
        self.runtime.block_on(self.client.get_values())
    }
}

/// Blocking view of [`MemoryClient`].
#[derive(Debug, Clone, Copy)]
pub struct Memories<'a> {
    runtime: &'a Runtime,
    client: &'a MemoryClient,
}

impl Memories<'_> {
    pub fn record(&self, request: RecordRequest) -> Result<Memory> {
        self.runtime.block_on(self.client.record(request))
    }

    pub fn query(&self, request: QueryRequest) -> Result<MemoryQueryResult> {
        self.runtime.block_on(self.client.query(request))
    }

    pub fn get(&self, memory_id: &str) -> Result<Memory> {
        self.runtime.block_on(self.client.get(memory_id))
    }

    pub fn update(&self, memory_id: &str, update: MemoryUpdate) -> Result<Memory> {
        self.runtime.block_on(self.client.update(memory_id, update))
    }

    pub fn delete(&self, memory_id: &str) -> Result<()> {
        self.runtime.block_on(self.client.delete(memory_id))
    }

    pub fn create_edge(
        &self,
        source_id: &str,
        target_id: &str,
        relationship: &str,
        strength: f64,
    ) -> Result<Edge> {
        self.runtime.block_on(
            self.client
                .create_edge(source_id, target_id, relationship, strength),
        )
    }

    pub fn get_related(&self, memory_id: &str, query: RelatedQuery) -> Result<MemoryQueryResult> {
        self.runtime
            .block_on(self.client.get_related(memory_id, query))
    }
}

/// Blocking view of [`BridgeClient`].
#[derive(Debug, Clone, Copy)]
pub struct Bridge<'a> {
    runtime: &'a Runtime,
    client: &'a BridgeClient,
}

impl Bridge<'_> {
    pub fn list_files(&self, path: &str) -> Result<DirectoryListing> {
        self.runtime.block_on(self.client.list_files(path))
    }

    pub fn list_files_with(&self, path: &str, options: ListOptions) -> Result<DirectoryListing> {
        self.runtime
            .block_on(self.client.list_files_with(path, options))
    }

    pub fn read_file(&self, path: &str) -> Result<String> {
        self.runtime.block_on(self.client.read_file(path))
    }

    pub fn read_file_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.runtime.block_on(self.client.read_file_bytes(path))
    }

    pub fn write_file(&self, path: &str, content: &str, create_dirs: bool) -> Result<FileInfo> {
        self.runtime
            .block_on(self.client.write_file(path, content, create_dirs))
    }

    pub fn delete_file(&self, path: &str) -> Result<()> {
        self.runtime.block_on(self.client.delete_file(path))
    }

    pub fn get_file_info(&self, path: &str) -> Result<FileInfo> {
        self.runtime.block_on(self.client.get_file_info(path))
    }

    pub fn sync(&self, path: &str) -> Result<SyncStatus> {
        self.runtime.block_on(self.client.sync(path))
    }

    pub fn get_sync_status(&self, path: &str) -> Result<SyncStatus> {
        self.runtime.block_on(self.client.get_sync_status(path))
    }
}
