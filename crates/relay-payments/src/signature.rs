//! Notification Signature Verification
//!
//! The processor signs notifications with
//! `x-signature: ts=<unix>,v1=<hex hmac>` and sends `x-request-id`.
//! The HMAC-SHA256 covers the manifest `id:<data.id>;request-id:<id>;ts:<ts>;`,
//! where parts without a value are left out.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Verifies `x-signature` headers with a shared secret
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

/// Parsed `x-signature` header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self> {
        let mut ts = None;
        let mut v1 = None;

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("ts", value)) => ts = Some(value.trim().to_string()),
                Some(("v1", value)) => v1 = Some(value.trim().to_string()),
                _ => {}
            }
        }

        match (ts, v1) {
            (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Ok(Self { ts, v1 }),
            _ => Err(PaymentError::Signature("malformed x-signature header".into())),
        }
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Check a notification's signature against its payment id and request id
    pub fn verify(&self, signature: &str, request_id: Option<&str>, data_id: &str) -> Result<()> {
        let header = SignatureHeader::parse(signature)?;
        let expected = hex::decode(&header.v1)
            .map_err(|_| PaymentError::Signature("v1 is not hex".into()))?;

        let mut mac = self.mac()?;
        mac.update(manifest(data_id, request_id, &header.ts).as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| PaymentError::Signature("signature mismatch".into()))
    }

    /// Produce the `x-signature` header value the processor would send
    pub fn sign(&self, ts: &str, request_id: Option<&str>, data_id: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(manifest(data_id, request_id, ts).as_bytes());
        Ok(format!("ts={ts},v1={}", hex::encode(mac.finalize().into_bytes())))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Config(format!("invalid webhook secret: {e}")))
    }
}

fn manifest(data_id: &str, request_id: Option<&str>, ts: &str) -> String {
    let mut manifest = String::new();
    if !data_id.is_empty() {
        let id = if data_id.chars().all(char::is_alphanumeric) {
            data_id.to_lowercase()
        } else {
            data_id.to_string()
        };
        manifest.push_str(&format!("id:{id};"));
    }
    if let Some(request_id) = request_id.filter(|r| !r.is_empty()) {
        manifest.push_str(&format!("request-id:{request_id};"));
    }
    manifest.push_str(&format!("ts:{ts};"));
    manifest
}
