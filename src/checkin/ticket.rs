use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signing material for ticket tokens, separate from session JWTs so a
/// leaked ticket secret never mints login tokens.
pub struct TicketKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TicketKeys {
    pub fn new(secret: &str) -> Self {
        TicketKeys {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
        }
    }
}

/// Claims embedded in a QR ticket: the registration it points at, when it
/// was issued, and an expiry past the event end. The signature is what makes
/// a photographed or guessed payload useless for forging a check-in.
#[derive(Debug, Serialize, Deserialize)]
pub struct TicketClaims {
    pub sub: String,
    pub evt: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue(
    keys: &TicketKeys,
    event_id: &str,
    user_id: &str,
    valid_until: DateTime<Utc>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = TicketClaims {
        sub: user_id.to_string(),
        evt: event_id.to_string(),
        iat: Utc::now().timestamp(),
        exp: valid_until.timestamp(),
    };
    encode(&Header::default(), &claims, &keys.encoding)
}

pub fn decode_ticket(keys: &TicketKeys, token: &str) -> Option<TicketClaims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<TicketClaims>(token, &keys.decoding, &validation)
        .ok()
        .map(|data| data.claims)
}

/// What the scanner handed us: a signed QR token, or a short code typed at
/// the door.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPayload {
    Signed(String),
    ManualCode(String),
}

pub fn parse_scan(raw: &str) -> Option<ScanPayload> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.matches('.').count() == 2 {
        Some(ScanPayload::Signed(trimmed.to_string()))
    } else {
        Some(ScanPayload::ManualCode(trimmed.to_ascii_uppercase()))
    }
}

/// Door code carried on the registration, e.g. `UE-1A2B3C4D`.
pub fn new_ticket_code() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("UE-{}", hex[..8].to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn issued_ticket_decodes_to_same_registration() {
        let keys = TicketKeys::new("door-secret");
        let token = issue(&keys, "E1", "U1", Utc::now() + Duration::days(1)).unwrap();
        let claims = decode_ticket(&keys, &token).expect("ticket should verify");
        assert_eq!(claims.sub, "U1");
        assert_eq!(claims.evt, "E1");
    }

    #[test]
    fn foreign_or_tampered_token_is_rejected() {
        let keys = TicketKeys::new("door-secret");
        let other = TicketKeys::new("not-the-secret");
        let token = issue(&other, "E1", "U1", Utc::now() + Duration::days(1)).unwrap();
        assert!(decode_ticket(&keys, &token).is_none());

        let mut mangled = issue(&keys, "E1", "U1", Utc::now() + Duration::days(1)).unwrap();
        mangled.push('x');
        assert!(decode_ticket(&keys, &mangled).is_none());
    }

    #[test]
    fn expired_ticket_is_rejected() {
        let keys = TicketKeys::new("door-secret");
        let token = issue(&keys, "E1", "U1", Utc::now() - Duration::days(2)).unwrap();
        assert!(decode_ticket(&keys, &token).is_none());
    }

    #[test]
    fn scan_parsing_distinguishes_tokens_from_codes() {
        assert_eq!(parse_scan("   "), None);
        assert_eq!(
            parse_scan("a.b.c"),
            Some(ScanPayload::Signed("a.b.c".to_string()))
        );
        assert_eq!(
            parse_scan(" ue-1a2b3c4d "),
            Some(ScanPayload::ManualCode("UE-1A2B3C4D".to_string()))
        );
    }

    #[test]
    fn ticket_codes_have_fixed_shape() {
        let code = new_ticket_code();
        assert!(code.starts_with("UE-"));
        assert_eq!(code.len(), 11);
        assert!(code[3..].chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
