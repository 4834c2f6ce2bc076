//! Memory Service client.
//!
//! Records and retrieves memories in the remote Trace Manifold. Nothing is
//! stored or embedded locally.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{path_segment, ApiRequest, Transport};
use crate::types::{
    check_non_empty, check_unit_interval, Edge, Memory, MemoryMatch, MemoryQueryResult,
    MemoryType, MemoryUpdate, QueryRequest, RecordRequest,
};

const PREFIX: &str = "/v1/memory";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordBody<'a> {
    content: &'a str,
    memory_type: MemoryType,
    importance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
    tags: &'a [String],
    metadata: &'a Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EdgeBody<'a> {
    source_id: &'a str,
    target_id: &'a str,
    relationship: &'a str,
    strength: f64,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<MemoryMatch>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelatedEntry {
    memory: Memory,
    edge_strength: f64,
}

#[derive(Deserialize)]
struct RelatedResponse {
    #[serde(default)]
    results: Vec<RelatedEntry>,
}

/// Filters for [`MemoryClient::get_related`].
#[derive(Debug, Clone)]
pub struct RelatedQuery {
    pub relationship: Option<String>,
    pub min_strength: f64,
    pub limit: usize,
}

impl Default for RelatedQuery {
    fn default() -> Self {
        Self {
            relationship: None,
            min_strength: 0.1,
            limit: 20,
        }
    }
}

impl RelatedQuery {
    pub fn relationship(mut self, relationship: impl Into<String>) -> Self {
        self.relationship = Some(relationship.into());
        self
    }

    pub fn min_strength(mut self, min_strength: f64) -> Self {
        self.min_strength = min_strength;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(Error::validation("limit", "must be positive"));
        }
        check_unit_interval("min_strength", self.min_strength)
    }
}

/// Client for the Memory Service API.
#[derive(Debug, Clone)]
pub struct MemoryClient {
    transport: Arc<Transport>,
}

impl MemoryClient {
    pub(crate) fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// Record a new memory. The namespace defaults to the agent id.
    pub async fn record(&self, request: RecordRequest) -> Result<Memory> {
        request.validate()?;

        let body = RecordBody {
            content: request.content_value(),
            memory_type: request.memory_type_value(),
            importance: request.importance_value(),
            namespace: request.namespace_value().or(self.transport.agent_id()),
            tags: request.tag_values(),
            metadata: request.metadata_value(),
        };
        let api_request = ApiRequest::post(format!("{}/record", PREFIX))
            .json(&body)?
            .attested(None);

        let memory: Memory = self.transport.json(api_request).await?;
        debug!(memory_id = %memory.id, "Memory recorded");
        Ok(memory)
    }

    /// Query memories by semantic similarity.
    pub async fn query(&self, request: QueryRequest) -> Result<MemoryQueryResult> {
        request.validate()?;

        let api_request = ApiRequest::post(format!("{}/query", PREFIX)).json(&request)?;
        let response: QueryResponse = self.transport.json(api_request).await?;
        Ok(MemoryQueryResult::from_matches(
            response.results,
            request.limit_value(),
        ))
    }

    /// Get a specific memory by ID.
    pub async fn get(&self, memory_id: &str) -> Result<Memory> {
        let memory_id = path_segment("memory_id", memory_id)?;
        self.transport
            .json(ApiRequest::get(format!("{}/{}", PREFIX, memory_id)))
            .await
    }

    /// Update fields of an existing memory.
    pub async fn update(&self, memory_id: &str, update: MemoryUpdate) -> Result<Memory> {
        let memory_id = path_segment("memory_id", memory_id)?;
        if update.is_empty() {
            return Err(Error::validation("update", "no fields to update"));
        }
        update.validate()?;

        let request = ApiRequest::patch(format!("{}/{}", PREFIX, memory_id)).json(&update)?;
        self.transport.json(request).await
    }

    /// Delete a memory.
    pub async fn delete(&self, memory_id: &str) -> Result<()> {
        let memory_id = path_segment("memory_id", memory_id)?;
        self.transport
            .send(ApiRequest::delete(format!("{}/{}", PREFIX, memory_id)))
            .await
    }

    /// Create an edge between two memories.
    pub async fn create_edge(
        &self,
        source_id: &str,
        target_id: &str,
        relationship: &str,
        strength: f64,
    ) -> Result<Edge> {
        check_non_empty("source_id", source_id)?;
        check_non_empty("target_id", target_id)?;
        check_non_empty("relationship", relationship)?;
        check_unit_interval("strength", strength)?;

        let body = EdgeBody {
            source_id,
            target_id,
            relationship,
            strength,
        };
        let request = ApiRequest::post(format!("{}/edges", PREFIX)).json(&body)?;
        self.transport.json(request).await
    }

    /// Get memories related to a given memory, edge strength as relevance.
    pub async fn get_related(
        &self,
        memory_id: &str,
        query: RelatedQuery,
    ) -> Result<MemoryQueryResult> {
        let memory_id = path_segment("memory_id", memory_id)?;
        query.validate()?;

        let request = ApiRequest::get(format!("{}/{}/related", PREFIX, memory_id))
            .query("minStrength", query.min_strength)
            .query("limit", query.limit)
            .query_opt("relationship", query.relationship.as_deref());
        let response: RelatedResponse = self.transport.json(request).await?;

        let matches = response
            .results
            .into_iter()
            .map(|entry| MemoryMatch {
                relevance: entry.edge_strength,
                memory: entry.memory,
            })
            .collect();
        Ok(MemoryQueryResult::from_matches(matches, query.limit))
    }
}
