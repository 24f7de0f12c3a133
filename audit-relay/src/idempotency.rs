//! Deterministic idempotency key derivation
//!
//! The key is a SHA-256 hex digest over the identity fields of an envelope.
//! Identical tuples always yield identical keys regardless of which publish
//! path produced the envelope, which is what makes cross-path deduplication
//! possible.

use sha2::{Digest, Sha256};

use crate::envelope::{is_blank, CanonicalEnvelope};

/// Derives deduplication keys for retries and duplicate callbacks
#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotencyKeyFactory;

impl IdempotencyKeyFactory {
    pub fn new() -> Self {
        Self
    }

    /// Compute the key for an envelope
    ///
    /// SHA-256 over the pipe-joined tuple (eventType, source name,
    /// conversationId, interactionId, groupId), with the empty string
    /// substituted for any absent field.
    pub fn create(&self, envelope: &CanonicalEnvelope) -> String {
        let input = [
            envelope.event_type.as_str(),
            envelope.source.as_str(),
            envelope.conversation_id.as_deref().unwrap_or(""),
            envelope.interaction_id.as_deref().unwrap_or(""),
            envelope.group_id.as_deref().unwrap_or(""),
        ]
        .join("|");

        let digest = Sha256::digest(input.as_bytes());
        hex::encode(digest)
    }

    /// Fill in the idempotency key when enforcement asks for one
    ///
    /// With enforcement disabled the envelope passes through unchanged.
    /// A caller-supplied key is never overwritten.
    pub fn enrich(&self, envelope: CanonicalEnvelope, enforce: bool) -> CanonicalEnvelope {
        if !enforce {
            return envelope;
        }

        if is_blank(&envelope.idempotency_key) {
            let key = self.create(&envelope);
            return envelope.with_idempotency_key(key);
        }

        envelope
    }
}
