//! Core types for the Bravo Zero SDK.
//!
//! Request entities are built once and consumed by the service clients;
//! result entities are plain values decoded from a single response. The wire
//! format is camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Check that `value` lies in the closed unit interval.
pub(crate) fn check_unit_interval(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(Error::validation(
            field,
            format!("must be between 0.0 and 1.0, got {}", value),
        ));
    }
    Ok(())
}

/// Check that a string argument carries something other than whitespace.
pub(crate) fn check_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Constitution
// ---------------------------------------------------------------------------

/// Constitution evaluation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The action may proceed.
    Permit,
    /// The action is forbidden.
    Deny,
    /// A human or higher authority must decide.
    Escalate,
}

impl Decision {
    /// Wire name of the decision.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Permit => "permit",
            Decision::Deny => "deny",
            Decision::Escalate => "escalate",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of an evaluation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Critical,
}

/// An action to be evaluated against the constitution.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    action: String,
    context: Value,
    priority: Priority,
}

impl EvaluationRequest {
    /// Create a request for the given action with an empty context.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            context: Value::Object(Map::new()),
            priority: Priority::default(),
        }
    }

    /// Replace the evaluation context. Must be a JSON object.
    pub fn context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// Add a single context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if !self.context.is_object() {
            self.context = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.context {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Set the request priority.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn context_value(&self) -> &Value {
        &self.context
    }

    pub fn priority_value(&self) -> Priority {
        self.priority
    }

    /// Validate the request before it is sent.
    pub fn validate(&self) -> Result<()> {
        check_non_empty("action", &self.action)?;
        if !self.context.is_object() && !self.context.is_null() {
            return Err(Error::validation("context", "must be a JSON object"));
        }
        Ok(())
    }
}

/// A rule that was applied during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedRule {
    pub rule_id: String,
    pub name: String,
    pub matched: bool,
    pub contribution: f64,
}

/// Result of a Constitution Agent evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub request_id: String,
    pub decision: Decision,
    pub confidence: f64,
    pub alignment_score: f64,
    #[serde(default)]
    pub applied_rules: Vec<AppliedRule>,
    #[serde(default)]
    pub reasoning: String,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    /// Whether the action may proceed.
    pub fn is_permitted(&self) -> bool {
        self.decision == Decision::Permit
    }

    /// Whether the decision was deferred to a higher authority.
    pub fn requires_escalation(&self) -> bool {
        self.decision == Decision::Escalate
    }

    /// Turn a `deny` decision into [`Error::Denied`].
    pub fn ensure_permitted(self) -> Result<Self> {
        match self.decision {
            Decision::Deny => Err(Error::Denied {
                reasoning: self.reasoning.clone(),
                result: Box::new(self),
            }),
            _ => Ok(self),
        }
    }

    /// Rules that matched the action.
    pub fn matched_rules(&self) -> impl Iterator<Item = &AppliedRule> {
        self.applied_rules.iter().filter(|r| r.matched)
    }
}

fn default_trend() -> String {
    "stable".to_string()
}

/// Global Omega alignment score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmegaScore {
    pub omega: f64,
    #[serde(default)]
    pub components: BTreeMap<String, f64>,
    /// "improving", "stable" or "degrading"
    #[serde(default = "default_trend")]
    pub trend: String,
    pub timestamp: DateTime<Utc>,
}

impl OmegaScore {
    /// Score of a single named component.
    pub fn component(&self, name: &str) -> Option<f64> {
        self.components.get(name).copied()
    }
}

/// Platform health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    #[serde(default)]
    pub checked_at: Option<DateTime<Utc>>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.to_ascii_lowercase().as_str(), "healthy" | "ok")
    }
}

/// A governance alert. Only `severity` and `title` are known; every other
/// field the platform sends is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Alert {
    /// Look up an untyped field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// A governance proposal awaiting a vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub title: String,
    pub description: String,
    pub category: String,
}

impl Proposal {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: category.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_non_empty("title", &self.title)?;
        check_non_empty("description", &self.description)?;
        check_non_empty("category", &self.category)
    }
}

/// Acknowledgement of a submitted proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalReceipt {
    pub id: String,
    pub voting_deadline: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ProposalReceipt {
    /// Whether voting is still open at `now`.
    pub fn is_voting_open(&self, now: DateTime<Utc>) -> bool {
        self.voting_deadline > now
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Type of memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Episodic,
    #[default]
    Semantic,
    Procedural,
    Working,
}

/// Memory consolidation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsolidationState {
    #[default]
    Active,
    Consolidating,
    Consolidated,
    Decaying,
    Dormant,
}

fn default_strength() -> f64 {
    1.0
}

/// A memory stored in the Trace Manifold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub importance: f64,
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default)]
    pub consolidation_state: ConsolidationState,
    pub namespace: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Memory {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

fn push_unique(tags: &mut Vec<String>, tag: String) {
    if !tags.contains(&tag) {
        tags.push(tag);
    }
}

/// A memory to be recorded.
#[derive(Debug, Clone)]
pub struct RecordRequest {
    content: String,
    memory_type: MemoryType,
    importance: f64,
    namespace: Option<String>,
    tags: Vec<String>,
    metadata: Map<String, Value>,
}

impl RecordRequest {
    /// Create a semantic memory with importance 0.5.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            memory_type: MemoryType::default(),
            importance: 0.5,
            namespace: None,
            tags: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn memory_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = memory_type;
        self
    }

    /// Importance in `[0.0, 1.0]`; checked when the request is sent.
    pub fn importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the tags. Duplicates are dropped, first occurrence wins.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.clear();
        for tag in tags {
            push_unique(&mut self.tags, tag.into());
        }
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        push_unique(&mut self.tags, tag.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn content_value(&self) -> &str {
        &self.content
    }

    pub fn importance_value(&self) -> f64 {
        self.importance
    }

    pub fn tag_values(&self) -> &[String] {
        &self.tags
    }

    pub(crate) fn memory_type_value(&self) -> MemoryType {
        self.memory_type
    }

    pub(crate) fn namespace_value(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub(crate) fn metadata_value(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn validate(&self) -> Result<()> {
        check_non_empty("content", &self.content)?;
        check_unit_interval("importance", self.importance)
    }
}

/// A semantic similarity query over memories.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    query: String,
    limit: usize,
    min_relevance: f64,
    memory_types: Option<Vec<MemoryType>>,
    namespace: Option<String>,
    tags: Option<Vec<String>>,
}

impl QueryRequest {
    /// Create a query returning at most 10 matches with relevance ≥ 0.5.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 10,
            min_relevance: 0.5,
            memory_types: None,
            namespace: None,
            tags: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn min_relevance(mut self, min_relevance: f64) -> Self {
        self.min_relevance = min_relevance;
        self
    }

    pub fn memory_types(mut self, types: impl IntoIterator<Item = MemoryType>) -> Self {
        self.memory_types = Some(types.into_iter().collect());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn limit_value(&self) -> usize {
        self.limit
    }

    pub fn validate(&self) -> Result<()> {
        check_non_empty("query", &self.query)?;
        if self.limit == 0 {
            return Err(Error::validation("limit", "must be positive"));
        }
        check_unit_interval("min_relevance", self.min_relevance)
    }
}

/// A single query match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMatch {
    pub relevance: f64,
    pub memory: Memory,
}

/// Matches ordered by descending relevance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemoryQueryResult {
    matches: Vec<MemoryMatch>,
}

impl MemoryQueryResult {
    /// Order matches by descending relevance and keep at most `limit`.
    pub fn from_matches(mut matches: Vec<MemoryMatch>, limit: usize) -> Self {
        matches.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        matches.truncate(limit);
        Self { matches }
    }

    pub fn matches(&self) -> &[MemoryMatch] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// The most relevant match.
    pub fn best(&self) -> Option<&MemoryMatch> {
        self.matches.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MemoryMatch> {
        self.matches.iter()
    }
}

impl IntoIterator for MemoryQueryResult {
    type Item = MemoryMatch;
    type IntoIter = std::vec::IntoIter<MemoryMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}

impl<'a> IntoIterator for &'a MemoryQueryResult {
    type Item = &'a MemoryMatch;
    type IntoIter = std::slice::Iter<'a, MemoryMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

/// Partial update of an existing memory. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl MemoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.importance.is_none()
            && self.tags.is_none()
            && self.metadata.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(content) = &self.content {
            check_non_empty("content", content)?;
        }
        if let Some(importance) = self.importance {
            check_unit_interval("importance", importance)?;
        }
        Ok(())
    }
}

/// An edge connecting two memories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub relationship: String,
    pub strength: f64,
    pub created_at: DateTime<Utc>,
    pub last_strengthened_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Bridge (VFS)
// ---------------------------------------------------------------------------

/// Information about a file in the VFS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub is_directory: bool,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permissions: String,
}

/// Listing of files in a directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryListing {
    pub path: String,
    pub files: Vec<FileInfo>,
    pub total_count: usize,
}

impl DirectoryListing {
    pub fn directories(&self) -> impl Iterator<Item = &FileInfo> {
        self.files.iter().filter(|f| f.is_directory)
    }

    pub fn regular_files(&self) -> impl Iterator<Item = &FileInfo> {
        self.files.iter().filter(|f| !f.is_directory)
    }
}

/// VFS synchronization status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub path: String,
    pub synced: bool,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pending_changes: u64,
}
