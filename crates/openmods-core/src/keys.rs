//! Key material handling: bech32-wrapped secrets (`nsec`) and public
//! identities (`npub`), public key derivation, and resolution of the
//! author identity used on published records.

use bitcoin::key::Secp256k1;
use bitcoin::secp256k1::SecretKey;
use rand::RngCore;
use thiserror::Error;

/// Human-readable part for nsec (private key)
const NSEC_HRP: &str = "nsec";

/// Human-readable part for npub (public key)
const NPUB_HRP: &str = "npub";

/// Errors that can occur while handling key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("bech32 encoding error: {0}")]
    Bech32Encode(String),

    #[error("bech32 decoding error: {0}")]
    Bech32Decode(String),

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("invalid hrp: expected {expected}, got {got}")]
    UnexpectedHrp { expected: String, got: String },

    #[error("unable to resolve identity: provide secret material or a configured npub")]
    MissingIdentity,

    #[error("key derivation error: {0}")]
    Derivation(String),
}

/// Generate a random 32-byte secret key.
pub fn generate_secret_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    key
}

/// Get the public key (x-only, 32 bytes) from a secret key.
pub fn public_key_from_secret(secret_key: &[u8; 32]) -> Result<[u8; 32], KeyError> {
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(secret_key).map_err(|e| KeyError::Derivation(e.to_string()))?;
    let (xonly, _parity) = sk.x_only_public_key(&secp);
    Ok(xonly.serialize())
}

/// Get the public key as a hex string from a secret key.
pub fn public_key_hex_from_secret(secret_key: &[u8; 32]) -> Result<String, KeyError> {
    Ok(hex::encode(public_key_from_secret(secret_key)?))
}

/// Encode a 32-byte private key as an nsec bech32 string.
pub fn encode_nsec(private_key: &[u8; 32]) -> Result<String, KeyError> {
    encode_bech32(NSEC_HRP, private_key)
}

/// Encode a 32-byte public key as an npub bech32 string.
pub fn encode_npub(public_key: &[u8; 32]) -> Result<String, KeyError> {
    encode_bech32(NPUB_HRP, public_key)
}

/// Decode an nsec bech32 string to a 32-byte private key.
///
/// Fails with [`KeyError::UnexpectedHrp`] when handed anything other
/// than an nsec, including an npub.
pub fn decode_nsec(nsec: &str) -> Result<[u8; 32], KeyError> {
    decode_bech32(NSEC_HRP, nsec)
}

/// Decode an npub bech32 string to a 32-byte public key.
pub fn decode_npub(npub: &str) -> Result<[u8; 32], KeyError> {
    decode_bech32(NPUB_HRP, npub)
}

/// Resolve the author identity for a record as lowercase hex.
///
/// A configured npub takes precedence even when secret material is also
/// supplied; the identity is only re-derived from the secret when no
/// configured identity exists. Neither present fails with
/// [`KeyError::MissingIdentity`].
pub fn resolve_author_pubkey(
    secret_key: Option<&[u8; 32]>,
    configured_npub: Option<&str>,
) -> Result<String, KeyError> {
    if let Some(npub) = configured_npub {
        return Ok(hex::encode(decode_npub(npub)?));
    }
    match secret_key {
        Some(sk) => public_key_hex_from_secret(sk),
        None => Err(KeyError::MissingIdentity),
    }
}

/// Resolve the zapper identity for a zap request as lowercase hex.
///
/// Unlike the author identity, a supplied secret wins here: the zapper is
/// whoever can sign the request, and the npub override only applies when
/// the request stays unsigned.
pub fn resolve_zapper_pubkey(
    secret_key: Option<&[u8; 32]>,
    override_npub: Option<&str>,
) -> Result<String, KeyError> {
    if let Some(sk) = secret_key {
        return public_key_hex_from_secret(sk);
    }
    match override_npub {
        Some(npub) => Ok(hex::encode(decode_npub(npub)?)),
        None => Err(KeyError::MissingIdentity),
    }
}

/// Encode bytes as bech32 with the given human-readable part.
fn encode_bech32(hrp: &str, data: &[u8; 32]) -> Result<String, KeyError> {
    use bech32::{Bech32, Hrp};

    let hrp = Hrp::parse(hrp).map_err(|e| KeyError::Bech32Encode(e.to_string()))?;

    bech32::encode::<Bech32>(hrp, data).map_err(|e| KeyError::Bech32Encode(e.to_string()))
}

/// Decode bech32 string with expected human-readable part.
fn decode_bech32(expected_hrp: &str, encoded: &str) -> Result<[u8; 32], KeyError> {
    use bech32::Hrp;

    let expected = Hrp::parse(expected_hrp).map_err(|e| KeyError::Bech32Decode(e.to_string()))?;

    let (hrp, data) =
        bech32::decode(encoded).map_err(|e| KeyError::Bech32Decode(e.to_string()))?;

    if hrp != expected {
        return Err(KeyError::UnexpectedHrp {
            expected: expected_hrp.to_string(),
            got: hrp.to_string(),
        });
    }

    if data.len() != 32 {
        return Err(KeyError::InvalidKeyFormat(format!(
            "expected 32 bytes, got {}",
            data.len()
        )));
    }

    let mut result = [0u8; 32];
    result.copy_from_slice(&data);
    Ok(result)
}
