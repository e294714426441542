//! Compile validated manifests into unsigned records.
//!
//! Tag emission order is fixed per record kind: once signed it feeds the
//! content-addressed event id, so two compilations of the same manifest
//! and config must produce byte-identical tag streams.

use serde::Serialize;
use thiserror::Error;

use crate::config::OpenModsConfig;
use crate::event::{PROJECT_KIND, PreparedEvent, RELEASE_KIND, UnsignedEvent, finalize};
use crate::keys::{self, KeyError, decode_nsec, resolve_author_pubkey};
use crate::manifest::{ProjectManifest, ReleaseManifest};
use crate::tags::{Tag, to_wire};

/// Errors raised while compiling a manifest into a record.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Manifest identifiers must match the active local configuration.
    #[error("manifest {field} {manifest} does not match config {config}")]
    ValidationMismatch {
        field: &'static str,
        manifest: String,
        config: String,
    },

    #[error("content serialization error: {0}")]
    Content(#[from] serde_json::Error),
}

/// Errors raised by the full prepare pipeline (identity + compile + sign).
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Event(#[from] crate::event::EventError),
}

fn check_identifiers(
    game_id: &str,
    slug: &str,
    config: &OpenModsConfig,
) -> Result<(), CompileError> {
    if slug != config.project_slug {
        return Err(CompileError::ValidationMismatch {
            field: "slug",
            manifest: slug.to_string(),
            config: config.project_slug.clone(),
        });
    }
    if game_id != config.game_id {
        return Err(CompileError::ValidationMismatch {
            field: "gameId",
            manifest: game_id.to_string(),
            config: config.game_id.clone(),
        });
    }
    Ok(())
}

fn content_json<T: Serialize>(manifest: &T) -> Result<String, CompileError> {
    Ok(serde_json::to_string(manifest)?)
}

/// Compile a project manifest into an unsigned project record (kind 30078).
///
/// `author_pubkey` is the caller-resolved record identity (lowercase hex).
pub fn compile_project(
    manifest: &ProjectManifest,
    config: &OpenModsConfig,
    author_pubkey: &str,
    created_at: u64,
) -> Result<UnsignedEvent, CompileError> {
    check_identifiers(&manifest.game_id, &manifest.slug, config)?;

    Ok(UnsignedEvent {
        pubkey: author_pubkey.to_string(),
        created_at,
        kind: PROJECT_KIND,
        tags: to_wire(project_tags(manifest, config)),
        content: content_json(manifest)?,
    })
}

fn project_tags(manifest: &ProjectManifest, config: &OpenModsConfig) -> Vec<Tag> {
    let mut tags = Vec::new();
    tags.push(Tag::Identifier(format!(
        "{}.{}",
        manifest.game_id, manifest.slug
    )));
    tags.push(Tag::Game(manifest.game_id.clone()));
    tags.push(Tag::Slug(manifest.slug.clone()));
    tags.push(Tag::Title(manifest.title.clone()));
    tags.push(Tag::Summary(manifest.summary.clone()));

    for relay in &config.relays {
        tags.push(Tag::Relay(relay.clone()));
    }

    tags.push(Tag::Link {
        rel: "homepage",
        url: manifest.links.homepage.clone(),
    });
    if let Some(source) = &manifest.links.source {
        tags.push(Tag::Link {
            rel: "source",
            url: source.clone(),
        });
    }
    if let Some(issues) = &manifest.links.issues {
        tags.push(Tag::Link {
            rel: "issues",
            url: issues.clone(),
        });
    }
    if let Some(support) = &manifest.links.support {
        tags.push(Tag::Link {
            rel: "support",
            url: support.clone(),
        });
    }

    for author in &manifest.authors {
        tags.push(Tag::Author {
            pubkey: author.pubkey.clone(),
            role: author.role.clone(),
            display_name: author.display_name.clone(),
            zap_split: author.zap_split,
        });
    }

    for category in manifest.categories.iter().flatten() {
        tags.push(Tag::Category(category.clone()));
    }
    for label in manifest.tags.iter().flatten() {
        tags.push(Tag::Topic(label.clone()));
    }
    for warning in manifest.content_warnings.iter().flatten() {
        tags.push(Tag::ContentWarning(warning.clone()));
    }

    if let Some(zap) = &manifest.zap_config {
        if let Some(lnurl) = &zap.lnurl {
            tags.push(Tag::ZapTarget(lnurl.clone()));
        }
        if let Some(bolt12) = &zap.bolt12 {
            tags.push(Tag::ZapBolt12(bolt12.clone()));
        }
    }

    if let Some(license) = &manifest.license {
        tags.push(Tag::License(license.clone()));
    }

    for dependency in manifest.dependencies.iter().flatten() {
        let game_id = dependency.game_id.as_deref().unwrap_or(&manifest.game_id);
        tags.push(Tag::Depends {
            coordinate: format!("{}.{}", game_id, dependency.slug),
            version_range: dependency.version_range.clone().unwrap_or_default(),
        });
    }

    tags
}

/// Compile a release manifest into an unsigned release record (kind 30079).
///
/// `published_by` is the author identifier shown on the record, normally
/// the configured npub (see [`published_by_identifier`]).
pub fn compile_release(
    manifest: &ReleaseManifest,
    config: &OpenModsConfig,
    author_pubkey: &str,
    published_by: &str,
    created_at: u64,
) -> Result<UnsignedEvent, CompileError> {
    check_identifiers(&manifest.game_id, &manifest.slug, config)?;

    Ok(UnsignedEvent {
        pubkey: author_pubkey.to_string(),
        created_at,
        kind: RELEASE_KIND,
        tags: to_wire(release_tags(manifest, published_by)),
        content: content_json(manifest)?,
    })
}

fn release_tags(manifest: &ReleaseManifest, published_by: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    tags.push(Tag::Identifier(format!(
        "{}.{}@{}",
        manifest.game_id, manifest.slug, manifest.version
    )));
    tags.push(Tag::Game(manifest.game_id.clone()));
    tags.push(Tag::Slug(manifest.slug.clone()));
    tags.push(Tag::Version(manifest.version.clone()));
    tags.push(Tag::PublishedBy(published_by.to_string()));

    for artifact in &manifest.artifacts {
        tags.push(Tag::Distribution(artifact.uri.clone()));
        for hash in artifact.hashes.iter().flatten() {
            tags.push(Tag::ArtifactHash {
                algorithm: hash.algorithm.clone(),
                value: hash.value.clone(),
            });
        }
    }

    for hash in manifest.hashes.iter().flatten() {
        tags.push(Tag::RootHash {
            algorithm: hash.algorithm.clone(),
            value: hash.value.clone(),
        });
    }

    for dependency in manifest.dependencies.iter().flatten() {
        let game_id = dependency.game_id.as_deref().unwrap_or(&manifest.game_id);
        tags.push(Tag::Depends {
            coordinate: format!("{}.{}", game_id, dependency.slug),
            version_range: dependency.version_range.clone(),
        });
    }

    if let Some(compatibility) = &manifest.compatibility {
        tags.push(Tag::GameVersionRange(
            compatibility.game_version_range.clone(),
        ));
    }

    tags
}

/// The author identifier for a release record's `published-by` tag: the
/// configured npub when present, otherwise the derived pubkey re-encoded.
pub fn published_by_identifier(
    configured_npub: Option<&str>,
    author_pubkey_hex: &str,
) -> Result<String, KeyError> {
    if let Some(npub) = configured_npub {
        return Ok(npub.to_string());
    }
    let bytes = hex::decode(author_pubkey_hex)
        .map_err(|e| KeyError::InvalidKeyFormat(e.to_string()))?;
    let key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| KeyError::InvalidKeyFormat("expected 32 bytes".to_string()))?;
    keys::encode_npub(&key)
}

/// Resolve identity from an optional nsec + config, compile the project
/// record, and sign it when a secret is available.
pub fn prepare_project_event(
    manifest: &ProjectManifest,
    config: &OpenModsConfig,
    secret_nsec: Option<&str>,
    created_at: u64,
) -> Result<PreparedEvent, PrepareError> {
    let secret = secret_nsec.map(decode_nsec).transpose()?;
    let pubkey = resolve_author_pubkey(secret.as_ref(), config.author_pubkey.as_deref())?;
    let unsigned = compile_project(manifest, config, &pubkey, created_at)?;
    Ok(finalize(unsigned, secret.as_ref())?)
}

/// Resolve identity from an optional nsec + config, compile the release
/// record, and sign it when a secret is available.
pub fn prepare_release_event(
    manifest: &ReleaseManifest,
    config: &OpenModsConfig,
    secret_nsec: Option<&str>,
    created_at: u64,
) -> Result<PreparedEvent, PrepareError> {
    let secret = secret_nsec.map(decode_nsec).transpose()?;
    let pubkey = resolve_author_pubkey(secret.as_ref(), config.author_pubkey.as_deref())?;
    let published_by = published_by_identifier(config.author_pubkey.as_deref(), &pubkey)?;
    let unsigned = compile_release(manifest, config, &pubkey, &published_by, created_at)?;
    Ok(finalize(unsigned, secret.as_ref())?)
}
