//! # bravozero
//!
//! Rust client for the Bravo Zero platform.
//!
//! ## Overview
//!
//! Every operation is a remote call. The SDK builds authenticated requests,
//! sends them, and decodes typed responses; nothing is evaluated, embedded or
//! stored locally.
//!
//! - **Constitution**: evaluate actions, read the Omega score, health and
//!   alerts, submit proposals
//! - **Memory**: record and semantically query memories
//! - **Bridge**: read and write files in the platform VFS
//!
//! Sensitive requests are signed with a PERSONA attestation when a private
//! key is configured.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bravozero::{AsyncClient, ClientConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> bravozero::Result<()> {
//!     let config = ClientConfig::from_env()?;
//!     AsyncClient::scoped(config, |client| async move {
//!         let result = client
//!             .evaluate("read_file", json!({"path": "/project/src/main.py"}))
//!             .await?
//!             .ensure_permitted()?;
//!         println!("{}: {}", result.decision, result.reasoning);
//!
//!         client
//!             .record("User prefers TypeScript", 0.8, ["preference", "language"])
//!             .await?;
//!         for hit in &client.query("language preferences", 5).await? {
//!             println!("[{:.2}] {}", hit.relevance, hit.memory.content);
//!         }
//!         Ok(())
//!     })
//!     .await
//! }
//! ```

pub mod auth;
pub mod blocking;
pub mod bridge;
pub mod client;
pub mod config;
pub mod constitution;
pub mod error;
pub mod memory;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use auth::PersonaAuthenticator;
pub use blocking::Client;
pub use bridge::{BridgeClient, ListOptions};
pub use client::AsyncClient;
pub use config::{ClientConfig, Environment};
pub use constitution::ConstitutionClient;
pub use error::{Error, Result};
pub use memory::{MemoryClient, RelatedQuery};
pub use types::{
    Alert, AppliedRule, ConsolidationState, Decision, DirectoryListing, Edge, EvaluationRequest,
    EvaluationResult, FileInfo, HealthStatus, Memory, MemoryMatch, MemoryQueryResult,
    MemoryType, MemoryUpdate, OmegaScore, Priority, Proposal, ProposalReceipt, QueryRequest,
    RecordRequest, SyncStatus,
};

/// Crate version, sent in the `User-Agent` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
