use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default staleness tolerance: 5 minutes.
pub const DEFAULT_TOLERANCE_MS: i64 = 300_000;

/// Signs and verifies webhook payloads.
///
/// Header format is `t=<unix ms>,v1=<hex hmac-sha256>` over the string
/// `"{timestamp_ms}.{json payload}"`. Verification never errors: any parse
/// failure or stale timestamp is simply `false`.
#[derive(Debug, Clone)]
pub struct Signer {
    secret: String,
}

impl Signer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn sign(&self, payload: &Value) -> String {
        self.sign_at(payload, Utc::now().timestamp_millis())
    }

    pub fn sign_at(&self, payload: &Value, timestamp_ms: i64) -> String {
        let body = payload.to_string();
        let signature = self.compute(timestamp_ms, &body);
        format!("t={timestamp_ms},v1={signature}")
    }

    pub fn verify(&self, header: &str, payload: &Value, tolerance_ms: i64) -> bool {
        self.verify_at(header, payload, tolerance_ms, Utc::now().timestamp_millis())
    }

    fn verify_at(&self, header: &str, payload: &Value, tolerance_ms: i64, now_ms: i64) -> bool {
        let Some((timestamp_ms, signature)) = parse_header(header) else {
            return false;
        };

        if now_ms - timestamp_ms > tolerance_ms {
            return false;
        }

        let expected = self.compute(timestamp_ms, &payload.to_string());
        constant_time_eq(signature.as_bytes(), expected.as_bytes())
    }

    fn compute(&self, timestamp_ms: i64, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(format!("{timestamp_ms}.{body}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn parse_header(header: &str) -> Option<(i64, String)> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(t)) => timestamp = t.parse::<i64>().ok(),
            (Some("v1"), Some(v)) => signature = Some(v.to_string()),
            _ => {}
        }
    }

    Some((timestamp?, signature?))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = Signer::new("test-secret");
        let payload = json!({"event": "render.completed", "id": "abc"});

        let header = signer.sign(&payload);
        assert!(header.starts_with("t="));
        assert!(header.contains(",v1="));
        assert!(signer.verify(&header, &payload, DEFAULT_TOLERANCE_MS));
    }

    #[test]
    fn mutated_payload_fails_verification() {
        let signer = Signer::new("test-secret");
        let payload = json!({"amount": 100});
        let header = signer.sign(&payload);

        let tampered = json!({"amount": 999});
        assert!(!signer.verify(&header, &tampered, DEFAULT_TOLERANCE_MS));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let payload = json!({"x": 1});
        let header = Signer::new("secret-a").sign(&payload);
        assert!(!Signer::new("secret-b").verify(&header, &payload, DEFAULT_TOLERANCE_MS));
    }

    #[test]
    fn stale_timestamp_fails_regardless_of_signature() {
        let signer = Signer::new("test-secret");
        let payload = json!({"x": 1});

        let old = Utc::now().timestamp_millis() - DEFAULT_TOLERANCE_MS - 1;
        let header = signer.sign_at(&payload, old);
        assert!(!signer.verify(&header, &payload, DEFAULT_TOLERANCE_MS));

        // Same header is fine with a looser window.
        assert!(signer.verify(&header, &payload, DEFAULT_TOLERANCE_MS * 10));
    }

    #[test]
    fn unparseable_headers_verify_false_without_panicking() {
        let signer = Signer::new("test-secret");
        let payload = json!({});
        for header in ["", "garbage", "t=notanumber,v1=aa", "v1=aa", "t=123"] {
            assert!(!signer.verify(header, &payload, DEFAULT_TOLERANCE_MS));
        }
    }

    #[test]
    fn deterministic_for_fixed_timestamp() {
        let signer = Signer::new("test-secret");
        let payload = json!({"a": 1});
        assert_eq!(
            signer.sign_at(&payload, 1_234_567_890_000),
            signer.sign_at(&payload, 1_234_567_890_000)
        );
    }
}
