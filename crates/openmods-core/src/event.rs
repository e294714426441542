//! Core Nostr event structure and operations:
//! - Event / UnsignedEvent structures (id, pubkey, created_at, kind, tags, content, sig)
//! - Canonical serialization for hashing
//! - Event signing with Schnorr signatures
//! - Event verification
//! - Addressable-event coordinates (`<kind>:<pubkey>:<d-tag>`)

use bitcoin::hashes::{Hash, sha256};
use bitcoin::key::Secp256k1;
use bitcoin::secp256k1::{Message, SecretKey, XOnlyPublicKey, schnorr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Event kind for project definition records.
pub const PROJECT_KIND: u16 = 30078;
/// Event kind for release records.
pub const RELEASE_KIND: u16 = 30079;
/// Event kind for zap requests.
pub const ZAP_REQUEST_KIND: u16 = 9734;
/// Event kind for zap receipts.
pub const ZAP_RECEIPT_KIND: u16 = 9735;

/// Errors that can occur while building, signing or verifying events.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("verification error: {0}")]
    Verification(String),
}

/// A signed Nostr event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 32-bytes lowercase hex-encoded sha256 of the serialized event data
    pub id: String,
    /// 32-bytes lowercase hex-encoded public key of the event creator
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind (integer between 0 and 65535)
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
    /// 64-bytes lowercase hex signature
    pub sig: String,
}

/// An unsigned event (before signing).
///
/// The pubkey is resolved by the caller before construction; signing does
/// not overwrite it. This lets a configured author identity stand in for
/// the key that will eventually sign, including the delegated-signer flow
/// where the secret never touches this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedEvent {
    /// 32-bytes lowercase hex-encoded public key of the event creator
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
}

/// An event that may or may not have been signed locally.
///
/// Unsigned is a first-class output: it is what gets handed to a
/// delegated signer when no local secret is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PreparedEvent {
    Signed(Event),
    Unsigned(UnsignedEvent),
}

impl PreparedEvent {
    pub fn is_signed(&self) -> bool {
        matches!(self, PreparedEvent::Signed(_))
    }

    /// The event id, present only once signed.
    pub fn id(&self) -> Option<&str> {
        match self {
            PreparedEvent::Signed(event) => Some(&event.id),
            PreparedEvent::Unsigned(_) => None,
        }
    }

    pub fn pubkey(&self) -> &str {
        match self {
            PreparedEvent::Signed(event) => &event.pubkey,
            PreparedEvent::Unsigned(event) => &event.pubkey,
        }
    }

    pub fn kind(&self) -> u16 {
        match self {
            PreparedEvent::Signed(event) => event.kind,
            PreparedEvent::Unsigned(event) => event.kind,
        }
    }

    pub fn tags(&self) -> &[Vec<String>] {
        match self {
            PreparedEvent::Signed(event) => &event.tags,
            PreparedEvent::Unsigned(event) => &event.tags,
        }
    }

    pub fn signed(&self) -> Option<&Event> {
        match self {
            PreparedEvent::Signed(event) => Some(event),
            PreparedEvent::Unsigned(_) => None,
        }
    }
}

impl Event {
    /// The unsigned fields of this event, for hash re-derivation.
    pub fn unsigned_parts(&self) -> UnsignedEvent {
        UnsignedEvent {
            pubkey: self.pubkey.clone(),
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags.clone(),
            content: self.content.clone(),
        }
    }
}

/// Serialize an unsigned event for hashing.
///
/// Format: `[0, pubkey, created_at, kind, tags, content]`
pub fn serialize_event(event: &UnsignedEvent) -> Result<String, EventError> {
    if !validate_unsigned_event(event) {
        return Err(EventError::InvalidEvent(
            "can't serialize event with wrong or missing properties".to_string(),
        ));
    }

    let serialized = serde_json::to_string(&(
        0,
        &event.pubkey,
        event.created_at,
        event.kind,
        &event.tags,
        &event.content,
    ))
    .map_err(|e| EventError::Serialization(e.to_string()))?;

    Ok(serialized)
}

/// Get the event hash (id) from an unsigned event.
pub fn event_hash(event: &UnsignedEvent) -> Result<String, EventError> {
    let serialized = serialize_event(event)?;
    let hash = sha256::Hash::hash(serialized.as_bytes());
    Ok(hex::encode(hash.as_byte_array()))
}

/// Validate an unsigned event structure.
pub fn validate_unsigned_event(event: &UnsignedEvent) -> bool {
    if event.pubkey.len() != 64 {
        return false;
    }
    if !event.pubkey.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    if event.pubkey != event.pubkey.to_lowercase() {
        return false;
    }

    true
}

/// Validate a signed event structure (not including signature verification).
pub fn validate_event(event: &Event) -> bool {
    if event.id.len() != 64 || !event.id.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }

    if event.pubkey.len() != 64 || !event.pubkey.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    if event.pubkey != event.pubkey.to_lowercase() {
        return false;
    }

    if event.sig.len() != 128 || !event.sig.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }

    true
}

/// Sign an unsigned event with a secret key, producing a complete signed event.
///
/// The event's pubkey is kept as the caller resolved it; it is not
/// re-derived from the secret key. If the two diverge, verification
/// against the recorded pubkey will fail.
pub fn sign_event(event: UnsignedEvent, secret_key: &[u8; 32]) -> Result<Event, EventError> {
    let secp = Secp256k1::new();

    let sk = SecretKey::from_slice(secret_key).map_err(|e| EventError::Signing(e.to_string()))?;

    let id = event_hash(&event)?;

    let id_bytes =
        hex::decode(&id).map_err(|e| EventError::Signing(format!("invalid id hex: {}", e)))?;
    let message = Message::from_digest_slice(&id_bytes)
        .map_err(|e| EventError::Signing(format!("invalid message: {}", e)))?;

    let keypair = bitcoin::secp256k1::Keypair::from_secret_key(&secp, &sk);
    let sig = secp.sign_schnorr_no_aux_rand(&message, &keypair);
    let sig_hex = hex::encode(sig.serialize());

    Ok(Event {
        id,
        pubkey: event.pubkey,
        created_at: event.created_at,
        kind: event.kind,
        tags: event.tags,
        content: event.content,
        sig: sig_hex,
    })
}

/// Sign the event when secret material is available, otherwise return it
/// unsigned for an out-of-process signer.
pub fn finalize(
    event: UnsignedEvent,
    secret_key: Option<&[u8; 32]>,
) -> Result<PreparedEvent, EventError> {
    match secret_key {
        Some(sk) => Ok(PreparedEvent::Signed(sign_event(event, sk)?)),
        None => Ok(PreparedEvent::Unsigned(event)),
    }
}

/// Verify an event's signature and id.
pub fn verify_event(event: &Event) -> Result<bool, EventError> {
    if !validate_event(event) {
        return Ok(false);
    }

    let computed_id = event_hash(&event.unsigned_parts())?;
    if computed_id != event.id {
        return Ok(false);
    }

    let secp = Secp256k1::verification_only();

    let id_bytes = hex::decode(&event.id)
        .map_err(|e| EventError::Verification(format!("invalid id hex: {}", e)))?;
    let message = Message::from_digest_slice(&id_bytes)
        .map_err(|e| EventError::Verification(format!("invalid message: {}", e)))?;

    let sig_bytes = hex::decode(&event.sig)
        .map_err(|e| EventError::Verification(format!("invalid sig hex: {}", e)))?;
    let sig = schnorr::Signature::from_slice(&sig_bytes)
        .map_err(|e| EventError::Verification(format!("invalid signature: {}", e)))?;

    let pubkey_bytes = hex::decode(&event.pubkey)
        .map_err(|e| EventError::Verification(format!("invalid pubkey hex: {}", e)))?;
    let pubkey = XOnlyPublicKey::from_slice(&pubkey_bytes)
        .map_err(|e| EventError::Verification(format!("invalid pubkey: {}", e)))?;

    match secp.verify_schnorr(&sig, &message, &pubkey) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Create a coordinate for an addressable event: `<kind>:<pubkey>:<d-tag-value>`.
pub fn coordinate(kind: u16, pubkey: &str, d_value: &str) -> String {
    format!("{}:{}:{}", kind, pubkey, d_value)
}

/// Extract the first `d` tag value of an event, if any.
pub fn d_tag_value(event: &Event) -> Option<String> {
    event
        .tags
        .iter()
        .find(|tag| tag.first().map(|s| s.as_str()) == Some("d"))
        .and_then(|tag| tag.get(1))
        .map(|s| s.to_string())
}
