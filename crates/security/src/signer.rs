//! Digital signatures for data integrity
//!
//! Compliance reports are signed by the system key. Multisig wallet
//! signers use the same detached Ed25519 format.

use std::path::Path;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer as DalekSigner, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::{SecurityError, SecurityResult};

/// Signature algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    #[default]
    Ed25519,
}

/// Detached signature over an arbitrary payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSignature {
    /// Signer identifier ("SYSTEM" or an officer/user id)
    pub signer_id: String,

    pub algorithm: SignatureAlgorithm,

    /// Public key (hex-encoded)
    pub public_key: String,

    /// Signature bytes (hex-encoded)
    pub signature: String,

    pub signed_at: DateTime<Utc>,
}

impl DataSignature {
    /// Verify this signature against a payload
    pub fn verify(&self, payload: &[u8]) -> SecurityResult<()> {
        match self.algorithm {
            SignatureAlgorithm::Ed25519 => {
                verify_ed25519(&self.signer_id, &self.public_key, payload, &self.signature)
            }
        }
    }
}

/// Verify a hex-encoded Ed25519 signature against a hex-encoded public key
pub fn verify_ed25519(
    signer_id: &str,
    public_key_hex: &str,
    payload: &[u8],
    signature_hex: &str,
) -> SecurityResult<()> {
    let invalid = |reason: String| SecurityError::InvalidSignature {
        signer: signer_id.to_string(),
        reason,
    };

    let pk_bytes =
        hex::decode(public_key_hex).map_err(|e| invalid(format!("Invalid public key hex: {}", e)))?;
    let sig_bytes =
        hex::decode(signature_hex).map_err(|e| invalid(format!("Invalid signature hex: {}", e)))?;

    let pk_array: [u8; 32] = pk_bytes
        .try_into()
        .map_err(|_| invalid("Public key must be 32 bytes".to_string()))?;
    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| invalid("Signature must be 64 bytes".to_string()))?;

    let verifying_key = VerifyingKey::from_bytes(&pk_array)
        .map_err(|e| invalid(format!("Invalid public key: {}", e)))?;
    let signature = Signature::from_bytes(&sig_array);

    verifying_key.verify(payload, &signature).map_err(|e| {
        SecurityError::SignatureVerificationFailed(format!("Signature from {} failed: {}", signer_id, e))
    })
}

/// Ed25519 signer
pub struct ReportSigner {
    signer_id: String,
    signing_key: SigningKey,
}

impl ReportSigner {
    /// Generate a new random system key
    pub fn generate() -> Self {
        Self::generate_for("SYSTEM")
    }

    /// Generate a new random key for a named signer
    pub fn generate_for(signer_id: impl Into<String>) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signer_id: signer_id.into(),
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create the system signer from a 32-byte seed (hex-encoded)
    pub fn from_hex(hex_seed: &str) -> SecurityResult<Self> {
        let bytes = hex::decode(hex_seed.trim())
            .map_err(|e| SecurityError::InvalidKey(format!("Invalid key hex: {}", e)))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SecurityError::InvalidKey("Key must be 32 bytes".to_string()))?;

        Ok(Self {
            signer_id: "SYSTEM".to_string(),
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Load the seed from `path`, or create and persist a new one (mode 0600)
    pub fn load_or_create(path: impl AsRef<Path>) -> SecurityResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            return Self::from_hex(&content);
        }

        let signer = Self::generate();
        crate::keys::write_secret(path, &signer.seed_hex())?;
        tracing::info!(path = %path.display(), "Generated new signing key");
        Ok(signer)
    }

    pub fn signer_id(&self) -> &str {
        &self.signer_id
    }

    /// Export the seed as hex (for storage)
    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, payload: &[u8]) -> DataSignature {
        let signature = self.signing_key.sign(payload);

        DataSignature {
            signer_id: self.signer_id.clone(),
            algorithm: SignatureAlgorithm::Ed25519,
            public_key: self.public_key_hex(),
            signature: hex::encode(signature.to_bytes()),
            signed_at: Utc::now(),
        }
    }
}
