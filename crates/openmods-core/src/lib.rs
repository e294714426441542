//! Core OpenMods publishing types and operations.
//!
//! This crate provides:
//! - The Nostr event model: canonical serialization, Schnorr signing,
//!   verification and addressable coordinates
//! - Key material handling (bech32 nsec/npub) and identity resolution
//! - Project and release manifest models that round-trip their JSON
//! - Local configuration (`openmods.json`) including delegated signers
//! - Compilers from manifests to project (kind 30078) and release
//!   (kind 30079) records with a fixed, reproducible tag order
//! - Zap request (kind 9734) and zap receipt (kind 9735) builders with
//!   LNURL pay-target plumbing
//!
//! Relay delivery lives in the `openmods-relay` crate.

pub mod compile;
pub mod config;
pub mod event;
pub mod keys;
pub mod manifest;
pub mod tags;
pub mod zap;

pub use compile::{
    CompileError, PrepareError, compile_project, compile_release, prepare_project_event,
    prepare_release_event, published_by_identifier,
};

pub use config::{
    CONFIG_FILENAME, ConfigError, ConfigStore, DelegatedSigner, OpenModsConfig, ReleasePaths,
    SignerCapability, SignerConfig, SignerMode,
};

pub use event::{
    Event, EventError, PROJECT_KIND, PreparedEvent, RELEASE_KIND, UnsignedEvent,
    ZAP_RECEIPT_KIND, ZAP_REQUEST_KIND, coordinate, d_tag_value, event_hash, finalize,
    serialize_event, sign_event, validate_event, validate_unsigned_event, verify_event,
};

pub use keys::{
    KeyError, decode_npub, decode_nsec, encode_npub, encode_nsec, generate_secret_key,
    public_key_from_secret, public_key_hex_from_secret, resolve_author_pubkey,
    resolve_zapper_pubkey,
};

pub use manifest::{
    ArtifactKind, ChangelogEntry, Compatibility, HashDigest, ProjectAuthor, ProjectDependency,
    ProjectLinks, ProjectManifest, ReleaseArtifact, ReleaseDependency, ReleaseManifest,
    ZapSplitEntry, ZapTargetConfig,
};

pub use tags::Tag;

pub use zap::{
    LnurlPayData, ZapError, ZapReceiptParams, ZapRequestParams, build_zap_receipt,
    build_zap_request, check_amount, decode_lnurl_payload, description_hash, is_simulated_invoice,
    metadata_text_entries, normalize_lnurl, release_coordinate, simulated_invoice,
};
