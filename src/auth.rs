//! PERSONA attestation signing.
//!
//! Sensitive requests carry an `X-Persona-Attestation` header: a signed
//! statement that the request comes from a given agent at a given time.
//!
//! ```text
//! header    = base64(json({ payload, signature, algorithm: "Ed25519" }))
//! payload   = base64(json({ action?, agent_id, nonce, timestamp }))   keys sorted
//! signature = base64(ed25519(payload bytes))
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::spki::EncodePublicKey;
use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

use crate::error::AttestationError;

pub const ATTESTATION_HEADER: &str = "X-Persona-Attestation";
pub const ALGORITHM: &str = "Ed25519";

/// Signed fields. Field order is alphabetical so the serialized payload has
/// sorted keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub agent_id: String,
    pub nonce: String,
    pub timestamp: i64,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    payload: String,
    signature: String,
    algorithm: String,
}

/// Signs PERSONA attestations with an Ed25519 key.
pub struct PersonaAuthenticator {
    agent_id: String,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl fmt::Debug for PersonaAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersonaAuthenticator")
            .field("agent_id", &self.agent_id)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl PersonaAuthenticator {
    /// Wrap an existing signing key.
    pub fn new(agent_id: impl Into<String>, signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            agent_id: agent_id.into(),
            signing_key,
            verifying_key,
        }
    }

    /// Create an authenticator with a fresh random key.
    pub fn generate(agent_id: impl Into<String>) -> Self {
        Self::new(agent_id, SigningKey::generate(&mut OsRng))
    }

    /// Load a key from a PKCS#8 PEM string.
    pub fn from_pem(agent_id: impl Into<String>, pem: &str) -> Result<Self, AttestationError> {
        let signing_key =
            SigningKey::from_pkcs8_pem(pem).map_err(|e| AttestationError::InvalidKey(e.to_string()))?;
        Ok(Self::new(agent_id, signing_key))
    }

    /// Load a key file: PKCS#8 PEM, or a raw 32-byte seed.
    pub fn from_file<P: AsRef<Path>>(
        agent_id: impl Into<String>,
        path: P,
    ) -> Result<Self, AttestationError> {
        let path = path.as_ref();
        let key_bytes = std::fs::read(path)
            .map_err(|e| AttestationError::KeyLoadFailed(format!("{}: {}", path.display(), e)))?;

        if key_bytes.starts_with(b"-----BEGIN") {
            let pem = std::str::from_utf8(&key_bytes)
                .map_err(|e| AttestationError::KeyLoadFailed(e.to_string()))?;
            return Self::from_pem(agent_id, pem);
        }

        let seed: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| {
            AttestationError::KeyLoadFailed(format!(
                "{}: expected PEM or 32 raw bytes, got {} bytes",
                path.display(),
                key_bytes.len()
            ))
        })?;
        Ok(Self::new(agent_id, SigningKey::from_bytes(&seed)))
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Public key in SubjectPublicKeyInfo PEM format.
    pub fn public_key_pem(&self) -> Result<String, AttestationError> {
        self.verifying_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AttestationError::InvalidKey(e.to_string()))
    }

    /// Raw public key, base64 encoded.
    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.verifying_key.to_bytes())
    }

    /// Short hex SHA-256 of the public key, for logs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.verifying_key.to_bytes());
        hex::encode(&digest[..8])
    }

    /// Create a signed attestation with a fresh nonce.
    pub fn create_attestation(&self, action: Option<&str>) -> Result<String, AttestationError> {
        let claims = AttestationClaims {
            action: action.map(str::to_string),
            agent_id: self.agent_id.clone(),
            nonce: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        self.sign_claims(&claims)
    }

    fn sign_claims(&self, claims: &AttestationClaims) -> Result<String, AttestationError> {
        let payload =
            serde_json::to_vec(claims).map_err(|e| AttestationError::Malformed(e.to_string()))?;
        let signature: Signature = self.signing_key.sign(&payload);

        let envelope = Envelope {
            payload: BASE64.encode(&payload),
            signature: BASE64.encode(signature.to_bytes()),
            algorithm: ALGORITHM.to_string(),
        };
        let json =
            serde_json::to_vec(&envelope).map_err(|e| AttestationError::Malformed(e.to_string()))?;
        Ok(BASE64.encode(json))
    }

    /// Verify an attestation header against a public key and return its claims.
    pub fn verify(
        attestation: &str,
        public_key: &VerifyingKey,
    ) -> Result<AttestationClaims, AttestationError> {
        let decode = |field: &str, value: &str| {
            BASE64
                .decode(value)
                .map_err(|e| AttestationError::Malformed(format!("{}: {}", field, e)))
        };

        let envelope: Envelope = serde_json::from_slice(&decode("envelope", attestation)?)
            .map_err(|e| AttestationError::Malformed(e.to_string()))?;
        if envelope.algorithm != ALGORITHM {
            return Err(AttestationError::Malformed(format!(
                "unsupported algorithm {}",
                envelope.algorithm
            )));
        }

        let payload = decode("payload", &envelope.payload)?;
        let signature_bytes: [u8; 64] = decode("signature", &envelope.signature)?
            .as_slice()
            .try_into()
            .map_err(|_| AttestationError::Malformed("signature must be 64 bytes".to_string()))?;

        public_key
            .verify(&payload, &Signature::from_bytes(&signature_bytes))
            .map_err(|e| AttestationError::VerificationFailed(e.to_string()))?;

        serde_json::from_slice(&payload).map_err(|e| AttestationError::Malformed(e.to_string()))
    }
}
