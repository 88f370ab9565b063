//! Simulated re-encryption collective.
//!
//! Holds the long-term secret in one place, which a real collective never
//! does. Otherwise it behaves like one: it checks both proofs, asks the
//! authorization oracle whether the read request's principal may read under
//! the write record's policy, and only then re-encrypts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use tracing::{debug, warn};

use ledgervault_core::{rules, Action, AuthorizationOracle, Proof, ReencryptError, Reencryptor};
use ledgervault_seal::{CollectiveKey, EncryptedKeyHandle, X25519StaticSecret};

/// A single-node stand-in for the collective.
pub struct MemoryCollective {
    secret: X25519StaticSecret,
    key: CollectiveKey,
    oracle: Arc<dyn AuthorizationOracle>,
    latency: Option<Duration>,
}

impl MemoryCollective {
    /// A collective with a fresh key that consults `oracle`.
    pub fn new(oracle: Arc<dyn AuthorizationOracle>) -> Self {
        let secret = X25519StaticSecret::generate();
        let mut id = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut id);
        Self {
            key: CollectiveKey::new(id, secret.public_key()),
            secret,
            oracle,
            latency: None,
        }
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[async_trait]
impl Reencryptor for MemoryCollective {
    fn collective_key(&self) -> CollectiveKey {
        self.key
    }

    async fn reencrypt(
        &self,
        write: &Proof,
        read: &Proof,
    ) -> Result<EncryptedKeyHandle, ReencryptError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let record = write
            .write_record()
            .map_err(|e| ReencryptError::InvalidProof(e.to_string()))?;
        let request = read
            .read_request()
            .map_err(|e| ReencryptError::InvalidProof(e.to_string()))?;

        if request.write_id != write.id {
            return Err(ReencryptError::InvalidProof(format!(
                "read request targets {}, not {}",
                request.write_id, write.id
            )));
        }
        if record.lts_id != self.key.id {
            return Err(ReencryptError::Refused("unknown collective key".into()));
        }

        let action = Action::new(record.policy, rules::SPAWN_READ_REQUEST);
        let allowed = self
            .oracle
            .is_authorized(&request.principal, &action)
            .await
            .map_err(|e| ReencryptError::Unavailable(e.to_string()))?;
        if !allowed {
            warn!(write = %write.id, policy = %record.policy, "read refused");
            return Err(ReencryptError::Refused(format!(
                "principal may not read under policy {}",
                record.policy
            )));
        }

        let key = record
            .encrypted_key
            .unwrap(&self.secret, &self.key.context(record.policy.as_bytes()))
            .map_err(|e| ReencryptError::Refused(e.to_string()))?;
        let handle = EncryptedKeyHandle::reencrypt(&key, &request.requester, *read.id.as_bytes())
            .map_err(|e| ReencryptError::Unavailable(e.to_string()))?;

        debug!(write = %write.id, read = %read.id, "key re-encrypted");
        Ok(handle)
    }
}
