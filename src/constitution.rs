//! Constitution Agent client.
//!
//! Evaluates agent actions against the constitution and exposes the
//! governance surface: Omega score, health, alerts, proposals, rules and values.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{path_segment, ApiRequest, Transport};
use crate::types::{
    Alert, EvaluationRequest, EvaluationResult, HealthStatus, OmegaScore, Priority, Proposal,
    ProposalReceipt,
};

const PREFIX: &str = "/v1/constitution";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_id: Option<&'a str>,
    action: &'a str,
    context: Value,
    priority: Priority,
}

/// `/alerts` answers with either a bare list or `{ "alerts": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum AlertsResponse {
    List(Vec<Alert>),
    Wrapped { alerts: Vec<Alert> },
}

/// Client for the Constitution Agent API.
#[derive(Debug, Clone)]
pub struct ConstitutionClient {
    transport: Arc<Transport>,
}

impl ConstitutionClient {
    pub(crate) fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// Evaluate an action against the constitution.
    ///
    /// A `deny` decision is a successful call; use
    /// [`EvaluationResult::ensure_permitted`] to turn it into an error.
    pub async fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResult> {
        request.validate()?;

        let context = match request.context_value() {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        let body = EvaluateBody {
            agent_id: self.transport.agent_id(),
            action: request.action(),
            context,
            priority: request.priority_value(),
        };

        let api_request = ApiRequest::post(format!("{}/evaluate", PREFIX))
            .json(&body)?
            .attested(Some(request.action()));
        let result: EvaluationResult = self.transport.json(api_request).await?;

        debug!(
            action = request.action(),
            decision = %result.decision,
            request_id = %result.request_id,
            "Constitution evaluation"
        );
        Ok(result)
    }

    /// Get the current global Omega alignment score.
    pub async fn get_omega(&self) -> Result<OmegaScore> {
        self.transport
            .json(ApiRequest::get(format!("{}/omega", PREFIX)))
            .await
    }

    /// Get the platform health report.
    pub async fn get_health(&self) -> Result<HealthStatus> {
        self.transport
            .json(ApiRequest::get(format!("{}/health", PREFIX)))
            .await
    }

    /// Get active governance alerts.
    pub async fn get_alerts(&self) -> Result<Vec<Alert>> {
        let response: AlertsResponse = self
            .transport
            .json(ApiRequest::get(format!("{}/alerts", PREFIX)))
            .await?;
        Ok(match response {
            AlertsResponse::List(alerts) | AlertsResponse::Wrapped { alerts } => alerts,
        })
    }

    /// Submit a governance proposal.
    ///
    /// Not idempotent: every call creates a new proposal and is never
    /// retried by the client.
    pub async fn submit_proposal(&self, proposal: Proposal) -> Result<ProposalReceipt> {
        proposal.validate()?;

        let request = ApiRequest::post(format!("{}/proposals", PREFIX)).json(&proposal)?;
        let receipt: ProposalReceipt = self.transport.json(request).await?;
        if receipt.id.trim().is_empty() {
            return Err(Error::Decode("proposal receipt without an id".to_string()));
        }

        debug!(proposal_id = %receipt.id, deadline = %receipt.voting_deadline, "Proposal submitted");
        Ok(receipt)
    }

    /// List constitution rules, optionally filtered.
    pub async fn list_rules(
        &self,
        category: Option<&str>,
        priority: Option<&str>,
    ) -> Result<Vec<Value>> {
        let request = ApiRequest::get(format!("{}/rules", PREFIX))
            .query_opt("category", category)
            .query_opt("priority", priority);
        self.transport.json(request).await
    }

    /// Get a specific rule by ID.
    pub async fn get_rule(&self, rule_id: &str) -> Result<Value> {
        let rule_id = path_segment("rule_id", rule_id)?;
        self.transport
            .json(ApiRequest::get(format!("{}/rules/{}", PREFIX, rule_id)))
            .await
    }

    /// Get the current values database.
    pub async fn get_values(&self) -> Result<Value> {
        self.transport
            .json(ApiRequest::get(format!("{}/values", PREFIX)))
            .await
    }
}
