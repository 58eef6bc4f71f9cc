//! Request signing and verification.
//!
//! Signatures are `t=<unix-seconds>&s=<hex hmac-sha256>` over the
//! JCS-canonicalized body concatenated with the decimal timestamp. The MAC
//! key is the hex portion of a `signkey-<env>-<hex>` signing key; dual keys
//! support rotation.

use crate::config::{Config, Mode};
use crate::error::{Result, SdkError};
use chrono::Utc;
use hmac::{Hmac, Mac};
use inngest_core::Json;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Maximum distance between a signature timestamp and the current clock
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

const SIGNING_KEY_PREFIX: &str = "signkey-";

/// Canonicalize a request body for signing.
///
/// JSON bodies are reserialized per RFC 8785: object keys sorted by UTF-16
/// code units, no insignificant whitespace, minimal string escaping, array
/// order preserved. Non-JSON bodies pass through untouched.
pub fn canonicalize(body: &[u8]) -> Vec<u8> {
    if body.is_empty() {
        return Vec::new();
    }

    match serde_json::from_slice::<Json>(body) {
        Ok(value) => {
            let mut out = String::new();
            write_canonical(&value, &mut out);
            out.into_bytes()
        }
        Err(_) => body.to_vec(),
    }
}

fn write_canonical(value: &Json, out: &mut String) {
    match value {
        Json::Null => out.push_str("null"),
        Json::Bool(true) => out.push_str("true"),
        Json::Bool(false) => out.push_str("false"),
        Json::Number(n) => out.push_str(&n.to_string()),
        Json::String(s) => write_escaped(s, out),
        Json::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Json::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| utf16_cmp(a, b));
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                if let Some(item) = map.get(*key) {
                    write_canonical(item, out);
                }
            }
            out.push('}');
        }
    }
}

fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{000c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

// RFC 8785 orders keys by UTF-16 code units, not Unicode scalars.
fn utf16_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// The MAC material of a signing key: the hex after `signkey-<env>-`, or the
/// whole string when unprefixed
fn signing_key_material(key: &str) -> &str {
    key.strip_prefix(SIGNING_KEY_PREFIX)
        .and_then(|rest| rest.split_once('-'))
        .map(|(_, hex)| hex)
        .unwrap_or(key)
}

fn signing_key_prefix(key: &str) -> &str {
    &key[..key.len() - signing_key_material(key).len()]
}

fn build_mac(body: &[u8], key: &str, ts: i64) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(signing_key_material(key).as_bytes())
        .map_err(|err| SdkError::config(format!("invalid signing key: {err}")))?;
    mac.update(&canonicalize(body));
    mac.update(ts.to_string().as_bytes());
    Ok(mac)
}

/// Sign a body with the current timestamp
pub fn sign(body: &[u8], key: &str) -> Result<String> {
    sign_at(body, key, Utc::now().timestamp())
}

/// Sign a body with an explicit timestamp
pub fn sign_at(body: &[u8], key: &str, ts: i64) -> Result<String> {
    let mac = build_mac(body, key, ts)?;
    let digest = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={ts}&s={digest}"))
}

/// The bearer token for administrative calls: the key's hex material decoded,
/// SHA-256 hashed, re-hex-encoded, with the `signkey-<env>-` prefix preserved
pub fn hashed_signing_key(key: &str) -> Result<String> {
    let material = signing_key_material(key);
    let raw = hex::decode(material)
        .map_err(|_| SdkError::config("signing key material is not hex"))?;
    let digest = Sha256::digest(&raw);
    Ok(format!(
        "{}{}",
        signing_key_prefix(key),
        hex::encode(digest)
    ))
}

/// Hex SHA-256 of an arbitrary credential string
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

fn parse_signature(header: &str) -> Result<(i64, String)> {
    let mut ts = None;
    let mut sig = None;
    for pair in header.split('&') {
        match pair.split_once('=') {
            Some(("t", value)) => ts = value.parse::<i64>().ok(),
            Some(("s", value)) => sig = Some(value.to_string()),
            _ => {}
        }
    }
    match (ts, sig) {
        (Some(ts), Some(sig)) => Ok((ts, sig)),
        _ => Err(SdkError::InvalidSignature),
    }
}

fn mac_matches(body: &[u8], key: &str, ts: i64, sig_hex: &str) -> Result<bool> {
    let Ok(sig) = hex::decode(sig_hex) else {
        return Ok(false);
    };
    let mac = build_mac(body, key, ts)?;
    Ok(mac.verify_slice(&sig).is_ok())
}

/// Verifies inbound request signatures against the configured keys
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    mode: Mode,
    signing_key: Option<String>,
    signing_key_fallback: Option<String>,
}

impl SignatureVerifier {
    /// Build a verifier from the resolved configuration
    pub fn new(config: &Config) -> Self {
        Self {
            mode: config.mode(),
            signing_key: config.signing_key().map(str::to_string),
            signing_key_fallback: config.signing_key_fallback().map(str::to_string),
        }
    }

    /// Verify a signature header against the raw request body
    pub fn verify(
        &self,
        body: &[u8],
        header: Option<&str>,
        server_kind: Option<&str>,
    ) -> Result<()> {
        self.verify_at(body, header, server_kind, Utc::now().timestamp())
    }

    fn verify_at(
        &self,
        body: &[u8],
        header: Option<&str>,
        server_kind: Option<&str>,
        now: i64,
    ) -> Result<()> {
        if self.mode == Mode::Dev {
            if server_kind != Some("dev") {
                warn!(
                    server_kind = server_kind.unwrap_or("<none>"),
                    "skipping signature verification in dev mode for a non-dev server"
                );
            }
            return Ok(());
        }

        let key = self
            .signing_key
            .as_deref()
            .ok_or(SdkError::MissingSigningKey)?;
        let header = header.ok_or(SdkError::MissingSignature)?;
        let (ts, sig) = parse_signature(header)?;

        if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(SdkError::InvalidSignature);
        }

        if mac_matches(body, key, ts, &sig)? {
            return Ok(());
        }
        if let Some(fallback) = self.signing_key_fallback.as_deref() {
            if mac_matches(body, fallback, ts, &sig)? {
                return Ok(());
            }
        }

        Err(SdkError::InvalidSignature)
    }
}
