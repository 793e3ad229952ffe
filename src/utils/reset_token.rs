use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Stateless single-use password-set tokens.
///
/// The MAC covers the user id, the user's *current* password hash and the
/// expiry timestamp, so a token stops verifying the moment the password
/// changes. Nothing is persisted; the link in an invite or reset email is
/// `{frontend}/reset-password/{uid}/{token}`.
///
/// Token wire format: `{expiry_hex}-{mac_hex}`.

pub fn encode_uid(user_id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(user_id.as_bytes())
}

pub fn decode_uid(encoded: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    Uuid::from_slice(&bytes).ok()
}

pub fn generate_token(
    secret: &[u8],
    user_id: Uuid,
    password_hash: &str,
    expires_at: OffsetDateTime,
) -> String {
    let exp = expires_at.unix_timestamp();
    let mac = compute_mac(secret, user_id, password_hash, exp);
    format!("{:x}-{}", exp, hex::encode(mac))
}

pub fn verify_token(
    secret: &[u8],
    user_id: Uuid,
    password_hash: &str,
    token: &str,
    now: OffsetDateTime,
) -> bool {
    let Some((exp_part, mac_part)) = token.split_once('-') else {
        return false;
    };
    let Ok(exp) = i64::from_str_radix(exp_part, 16) else {
        return false;
    };
    if exp <= now.unix_timestamp() {
        return false;
    }
    let Ok(provided) = hex::decode(mac_part) else {
        return false;
    };

    let expected = compute_mac(secret, user_id, password_hash, exp);
    expected.ct_eq(provided.as_slice()).into()
}

fn compute_mac(secret: &[u8], user_id: Uuid, password_hash: &str, exp: i64) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(secret)
        .expect("HMAC accepts keys of any length");
    mac.update(user_id.as_bytes());
    mac.update(password_hash.as_bytes());
    mac.update(&exp.to_be_bytes());
    mac.finalize().into_bytes().into()
}
