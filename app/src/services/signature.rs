// app/src/services/signature.rs

//! `stripe-signature` header verification: `t=<unix>,v1=<hex hmac>[,v1=...]`
//! where each `v1` is HMAC-SHA256 over `"{t}.{raw body}"`.

use crate::errors::{AppError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader<'a> {
  timestamp: i64,
  signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>> {
  let mut timestamp = None;
  let mut signatures = Vec::new();
  for part in header.split(',') {
    match part.trim().split_once('=') {
      Some(("t", value)) => {
        let parsed = value
          .parse::<i64>()
          .map_err(|_| AppError::InvalidSignature("timestamp is not an integer".to_string()))?;
        timestamp = Some(parsed);
      }
      Some(("v1", value)) if !value.is_empty() => signatures.push(value),
      // Other schemes (v0, future versions) are ignored.
      _ => {}
    }
  }

  let timestamp = timestamp.ok_or_else(|| AppError::InvalidSignature("missing timestamp".to_string()))?;
  if signatures.is_empty() {
    return Err(AppError::InvalidSignature("no v1 signature".to_string()));
  }
  Ok(SignatureHeader { timestamp, signatures })
}

/// Checks `header` against `payload` using `secret`. `now` is unix seconds.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, tolerance_secs: u64, now: i64) -> Result<()> {
  let parsed = parse_header(header)?;

  if now.abs_diff(parsed.timestamp) > tolerance_secs {
    return Err(AppError::InvalidSignature("timestamp outside tolerance".to_string()));
  }

  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|e| AppError::Internal(format!("webhook secret rejected by HMAC: {}", e)))?;
  mac.update(parsed.timestamp.to_string().as_bytes());
  mac.update(b".");
  mac.update(payload);

  let matched = parsed.signatures.iter().any(|candidate| match hex::decode(candidate) {
    Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
    Err(_) => false,
  });

  if matched {
    Ok(())
  } else {
    Err(AppError::InvalidSignature("no signature matched the payload".to_string()))
  }
}

/// Produces a header value for `payload`; used by tests and local tooling.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|e| AppError::Internal(format!("webhook secret rejected by HMAC: {}", e)))?;
  mac.update(timestamp.to_string().as_bytes());
  mac.update(b".");
  mac.update(payload);
  Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}
