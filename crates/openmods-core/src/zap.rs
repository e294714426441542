//! Zap request (kind 9734) and zap receipt (kind 9735) records for a
//! release, plus the LNURL pay-target plumbing they need.
//!
//! LNURL endpoints are resolved over HTTP by a collaborator; this module
//! consumes the resolved [`LnurlPayData`] and owns everything
//! deterministic: coordinate extraction, the description-hash commitment,
//! amount bounds, tag emission and placeholder invoices.

use bitcoin::hashes::{Hash, sha256};
use thiserror::Error;
use url::Url;

use crate::event::{
    Event, PreparedEvent, RELEASE_KIND, UnsignedEvent, ZAP_RECEIPT_KIND, ZAP_REQUEST_KIND,
    coordinate, d_tag_value,
};
use crate::tags::{Tag, to_wire};

/// Errors raised while building zap records.
#[derive(Debug, Error)]
pub enum ZapError {
    #[error("release event missing deterministic 'd' tag")]
    MissingCoordinate,

    #[error("expected release event (kind {RELEASE_KIND}), received kind {0}")]
    WrongKind(u16),

    #[error("amount {amount_msat} msat is outside the lnurl sendable bounds")]
    AmountOutOfRange {
        amount_msat: u64,
        min_msat: Option<u64>,
        max_msat: Option<u64>,
    },

    #[error("invalid lightning address format")]
    InvalidLightningAddress,

    #[error("invalid lnurl payload: {0}")]
    InvalidLnurl(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// A resolved LNURL pay target.
///
/// `metadata` is the exact blob returned by the endpoint; the description
/// commitment hashes these bytes, so the blob must be carried verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct LnurlPayData {
    /// The value the user supplied (lightning address, lnurl or URL).
    pub original: String,
    /// The resolved pay endpoint URL.
    pub resolved_url: String,
    /// Invoice callback URL, when the endpoint advertised one.
    pub callback: Option<String>,
    /// The metadata blob, byte-for-byte as served.
    pub metadata: String,
    /// Minimum sendable amount in millisats.
    pub min_sendable: Option<u64>,
    /// Maximum sendable amount in millisats.
    pub max_sendable: Option<u64>,
    /// Whether the endpoint advertises nostr zap support.
    pub allows_nostr: Option<bool>,
    /// The endpoint's nostr pubkey, when advertised.
    pub nostr_pubkey: Option<String>,
}

impl LnurlPayData {
    /// Fallback metadata used when the endpoint served none.
    pub fn default_metadata() -> String {
        r#"[["text/plain","OpenMods zap request"]]"#.to_string()
    }
}

/// Normalize a pay-target string to its HTTPS pay endpoint.
///
/// Accepts a lightning address (`name@domain`), a bech32 `lnurl1...`
/// payload, or a plain URL.
pub fn normalize_lnurl(value: &str) -> Result<Url, ZapError> {
    if value.contains('@') {
        let (name, domain) = value
            .split_once('@')
            .filter(|(name, domain)| !name.is_empty() && !domain.is_empty())
            .ok_or(ZapError::InvalidLightningAddress)?;
        return Ok(Url::parse(&format!(
            "https://{}/.well-known/lnurlp/{}",
            domain, name
        ))?);
    }

    if value.to_lowercase().starts_with("lnurl") {
        let decoded = decode_lnurl_payload(value)?;
        return Ok(Url::parse(&decoded)?);
    }

    Ok(Url::parse(value)?)
}

/// Decode the URL embedded in a bech32 `lnurl1...` payload.
pub fn decode_lnurl_payload(lnurl: &str) -> Result<String, ZapError> {
    let (hrp, data) = bech32::decode(&lnurl.to_lowercase())
        .map_err(|e| ZapError::InvalidLnurl(e.to_string()))?;
    let expected = bech32::Hrp::parse("lnurl").map_err(|e| ZapError::InvalidLnurl(e.to_string()))?;
    if hrp != expected {
        return Err(ZapError::InvalidLnurl(format!(
            "expected lnurl hrp, got {}",
            hrp
        )));
    }
    String::from_utf8(data).map_err(|e| ZapError::InvalidLnurl(e.to_string()))
}

/// The `text/plain` entries of an LNURL metadata blob, for cross-checking
/// that the endpoint references the zap target.
pub fn metadata_text_entries(metadata: &str) -> Vec<String> {
    let Ok(entries) = serde_json::from_str::<Vec<Vec<String>>>(metadata) else {
        return Vec::new();
    };
    entries
        .into_iter()
        .filter(|entry| entry.first().map(|s| s.as_str()) == Some("text/plain"))
        .filter_map(|entry| entry.into_iter().nth(1))
        .collect()
}

/// The description commitment: sha256 over the exact metadata bytes.
pub fn description_hash(metadata: &str) -> String {
    let hash = sha256::Hash::hash(metadata.as_bytes());
    hex::encode(hash.as_byte_array())
}

/// The coordinate of a release record: `30079:<pubkey>:<d-tag-value>`.
pub fn release_coordinate(event: &Event) -> Result<String, ZapError> {
    if event.kind != RELEASE_KIND {
        return Err(ZapError::WrongKind(event.kind));
    }
    let d_value = d_tag_value(event).ok_or(ZapError::MissingCoordinate)?;
    Ok(coordinate(event.kind, &event.pubkey, &d_value))
}

/// Check the requested amount against the target's sendable bounds.
/// Bounds are inclusive; either bound may be absent.
pub fn check_amount(amount_msat: u64, pay: &LnurlPayData) -> Result<(), ZapError> {
    let below = pay.min_sendable.is_some_and(|min| amount_msat < min);
    let above = pay.max_sendable.is_some_and(|max| amount_msat > max);
    if below || above {
        return Err(ZapError::AmountOutOfRange {
            amount_msat,
            min_msat: pay.min_sendable,
            max_msat: pay.max_sendable,
        });
    }
    Ok(())
}

/// Inputs for building a zap request.
#[derive(Debug, Clone)]
pub struct ZapRequestParams<'a> {
    pub release: &'a Event,
    pub pay: &'a LnurlPayData,
    pub amount_msat: u64,
    pub relays: &'a [String],
    pub message: &'a str,
    /// Caller-resolved zapper identity, lowercase hex.
    pub zapper_pubkey: &'a str,
    pub created_at: u64,
}

/// Build an unsigned zap request (kind 9734) targeting a release record.
pub fn build_zap_request(params: ZapRequestParams<'_>) -> Result<UnsignedEvent, ZapError> {
    check_amount(params.amount_msat, params.pay)?;
    let release_coordinate = release_coordinate(params.release)?;

    let mut tags = vec![
        Tag::Relays(params.relays.to_vec()),
        Tag::Amount(params.amount_msat),
        Tag::Lnurl(params.pay.resolved_url.clone()),
        Tag::DescriptionHash(description_hash(&params.pay.metadata)),
        Tag::Recipient(params.release.pubkey.clone()),
        Tag::EventRef(params.release.id.clone()),
        Tag::Address(release_coordinate),
    ];

    if !params.message.is_empty() {
        tags.push(Tag::ZapName(params.message.to_string()));
    }

    Ok(UnsignedEvent {
        pubkey: params.zapper_pubkey.to_string(),
        created_at: params.created_at,
        kind: ZAP_REQUEST_KIND,
        tags: to_wire(tags),
        content: params.message.to_string(),
    })
}

/// Inputs for building a zap receipt.
#[derive(Debug, Clone)]
pub struct ZapReceiptParams<'a> {
    /// The zap request, signed or not. An unsigned request gets no `e`
    /// reference (it has no id yet).
    pub request: &'a PreparedEvent,
    pub release: &'a Event,
    pub pay: &'a LnurlPayData,
    pub amount_sats: u64,
    /// Receiver identity, lowercase hex.
    pub receiver_pubkey: &'a str,
    /// Externally obtained invoice; a placeholder is synthesized when absent.
    pub invoice: Option<String>,
    pub created_at: u64,
}

/// Build an unsigned zap receipt (kind 9735) for a zap request.
pub fn build_zap_receipt(params: ZapReceiptParams<'_>) -> Result<UnsignedEvent, ZapError> {
    let address = params
        .request
        .tags()
        .iter()
        .find(|tag| tag.first().map(|s| s.as_str()) == Some("a"))
        .and_then(|tag| tag.get(1).cloned())
        .map(Ok)
        .unwrap_or_else(|| release_coordinate(params.release))?;

    let mut tags = vec![
        Tag::Recipient(params.request.pubkey().to_string()),
        Tag::Address(address),
        Tag::DescriptionHash(description_hash(&params.pay.metadata)),
    ];
    if let Some(callback) = &params.pay.callback {
        tags.push(Tag::Callback(callback.clone()));
    }
    tags.push(Tag::Lnurl(params.pay.resolved_url.clone()));

    let invoice = params
        .invoice
        .clone()
        .unwrap_or_else(|| simulated_invoice(params.amount_sats, params.pay));
    tags.push(Tag::Bolt11(invoice));

    if let Some(request_id) = params.request.id() {
        tags.push(Tag::EventRef(request_id.to_string()));
    }

    Ok(UnsignedEvent {
        pubkey: params.receiver_pubkey.to_string(),
        created_at: params.created_at,
        kind: ZAP_RECEIPT_KIND,
        tags: to_wire(tags),
        content: format!("Zap receipt for {} sats (simulated)", params.amount_sats),
    })
}

/// Synthesize a placeholder invoice. The construction pattern is fixed so
/// [`is_simulated_invoice`] can tell it apart from a wallet-issued one.
pub fn simulated_invoice(amount_sats: u64, pay: &LnurlPayData) -> String {
    let padded = format!("{:08}", amount_sats);
    let host = pay
        .callback
        .as_deref()
        .and_then(|callback| Url::parse(callback).ok())
        .and_then(|url| url.host_str().map(|h| h.to_string()))
        .map(|host| {
            host.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(10)
                .collect::<String>()
        })
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| "openmods".to_string());
    format!("lnbc{}0n1p{}{}", padded, host, padded)
}

/// Whether an invoice string matches the placeholder construction.
pub fn is_simulated_invoice(invoice: &str) -> bool {
    let Some(rest) = invoice.strip_prefix("lnbc") else {
        return false;
    };
    let amount: String = rest.chars().take(8).collect();
    amount.len() == 8
        && amount.chars().all(|c| c.is_ascii_digit())
        && rest[8..].starts_with("0n1p")
        && rest.ends_with(amount.as_str())
}
