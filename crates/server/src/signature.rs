use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const PREFIX: &str = "sha256=";

/// `sha256=<hex>` 形式的 HMAC-SHA256 签名
#[cfg(test)]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    format!("{}{}", PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// 常数时间比较
pub fn verify(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(provided) = header.and_then(|h| h.trim().strip_prefix(PREFIX)) else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let body = br#"{"object":"instagram"}"#;
        let sig = sign("secret", body);
        assert!(sig.starts_with("sha256="));
        assert_eq!(sig.len(), PREFIX.len() + 64);
        assert!(verify("secret", body, Some(&sig)));
    }

    #[test]
    fn test_rejects_bad_signatures() {
        let body = b"payload";
        let sig = sign("secret", body);
        assert!(!verify("other", body, Some(&sig)));
        assert!(!verify("secret", b"tampered", Some(&sig)));
        assert!(!verify("secret", body, Some(sig.trim_start_matches(PREFIX))));
        assert!(!verify("secret", body, Some("sha256=zz")));
        assert!(!verify("secret", body, None));
    }
}
