//! CSRF token codec.
//!
//! A token is `base64url(salt ‖ HMAC-SHA256(secret, salt))` without padding.
//! No timestamp is embedded: a token is valid exactly as long as the secret
//! that signed it is the live one.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::CsrfError;

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag in bytes.
pub const SIGNATURE_LEN: usize = 32;

/// A token split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    pub salt: Vec<u8>,
    pub signature: [u8; SIGNATURE_LEN],
}

/// Fill a fresh buffer from the thread-local CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// HMAC-SHA256 over `salt` keyed by `secret`.
pub fn sign(secret: &[u8], salt: &[u8]) -> [u8; SIGNATURE_LEN] {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(salt);
    let tag = mac.finalize().into_bytes();

    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(&tag);
    signature
}

/// Encode a token for `secret` using the given salt.
pub fn encode(secret: &[u8], salt: &[u8]) -> String {
    let signature = sign(secret, salt);
    let mut raw = Vec::with_capacity(salt.len() + SIGNATURE_LEN);
    raw.extend_from_slice(salt);
    raw.extend_from_slice(&signature);
    URL_SAFE_NO_PAD.encode(raw)
}

/// Derive a token with a freshly generated salt.
pub fn derive(secret: &[u8], salt_len: usize) -> String {
    encode(secret, &random_bytes(salt_len))
}

/// Split a token into salt and signature. The salt length is fixed by
/// configuration, so anything of a different total length is malformed.
pub fn decode(token: &str, salt_len: usize) -> Result<DecodedToken, CsrfError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| CsrfError::MalformedToken)?;
    if raw.len() != salt_len + SIGNATURE_LEN {
        return Err(CsrfError::MalformedToken);
    }

    let (salt, tag) = raw.split_at(salt_len);
    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(tag);

    Ok(DecodedToken {
        salt: salt.to_vec(),
        signature,
    })
}

/// Check a decoded token against `secret` in constant time.
pub fn verify(secret: &[u8], token: &DecodedToken) -> Result<(), CsrfError> {
    let expected = sign(secret, &token.salt);
    if bool::from(expected[..].ct_eq(&token.signature[..])) {
        Ok(())
    } else {
        Err(CsrfError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-csrf-secret-32-bytes-long!!";

    #[test]
    fn test_derived_token_verifies() {
        let token = derive(SECRET, 16);
        let decoded = decode(&token, 16).unwrap();
        assert_eq!(decoded.salt.len(), 16);
        assert!(verify(SECRET, &decoded).is_ok());
    }

    #[test]
    fn test_salts_differ_per_token() {
        assert_ne!(derive(SECRET, 16), derive(SECRET, 16));
    }

    #[test]
    fn test_wrong_secret_is_signature_mismatch() {
        let token = derive(SECRET, 16);
        let decoded = decode(&token, 16).unwrap();
        assert_eq!(
            verify(b"another-secret-of-the-same-size!", &decoded),
            Err(CsrfError::SignatureMismatch)
        );
    }

    #[test]
    fn test_tampered_salt_fails() {
        let token = derive(SECRET, 16);
        let mut decoded = decode(&token, 16).unwrap();
        decoded.salt[0] ^= 0xff;
        assert_eq!(verify(SECRET, &decoded), Err(CsrfError::SignatureMismatch));
    }

    #[test]
    fn test_not_base64_is_malformed() {
        assert_eq!(decode("not base64!!", 16), Err(CsrfError::MalformedToken));
    }

    #[test]
    fn test_wrong_length_is_malformed() {
        let short = URL_SAFE_NO_PAD.encode([0u8; 20]);
        assert_eq!(decode(&short, 16), Err(CsrfError::MalformedToken));

        // valid token for a different salt length
        let token = derive(SECRET, 8);
        assert_eq!(decode(&token, 16), Err(CsrfError::MalformedToken));
    }

    #[test]
    fn test_empty_token_is_malformed() {
        assert_eq!(decode("", 16), Err(CsrfError::MalformedToken));
    }
}
