//! The secret/issued-at cookie pair.
//!
//! # Serialization
//! - `{prefix}csrf-secret`: secret bytes, base64url without padding
//! - `{prefix}csrf-iat`: issue time, decimal milliseconds since the epoch
//!
//! Both cookies are `HttpOnly`, `SameSite=Strict`, `Path=/`, and `Secure`
//! when configured. They are always written together.

use axum::http::{header, HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// Cookie names after applying the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieNames {
    pub secret: String,
    pub issued_at: String,
}

impl CookieNames {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            secret: format!("{}csrf-secret", prefix),
            issued_at: format!("{}csrf-iat", prefix),
        }
    }
}

/// One secret generation together with the time it was issued.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretPair {
    secret: Vec<u8>,
    issued_at_ms: i64,
}

impl SecretPair {
    pub fn new(secret: Vec<u8>, issued_at_ms: i64) -> Self {
        Self {
            secret,
            issued_at_ms,
        }
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn issued_at_ms(&self) -> i64 {
        self.issued_at_ms
    }

    /// Age relative to `now_ms`; negative when the cookie claims the future.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.issued_at_ms)
    }

    /// A pair is stale when it is from the future or at least
    /// `rotate_after_ms` old.
    pub fn is_stale(&self, now_ms: i64, rotate_after_ms: u64) -> bool {
        let age = self.age_ms(now_ms);
        age < 0 || age as u64 >= rotate_after_ms
    }
}

// The secret must never end up in logs.
impl std::fmt::Debug for SecretPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretPair")
            .field("secret", &"<redacted>")
            .field("issued_at_ms", &self.issued_at_ms)
            .finish()
    }
}

/// What the request's cookies say about the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairState {
    /// No secret cookie at all.
    Missing,
    /// Cookies present but unusable (bad encoding, wrong length, bad iat).
    Corrupt,
    Present(SecretPair),
}

/// Reads and writes the pair on requests and responses.
#[derive(Debug, Clone)]
pub struct CookieAccessor {
    names: CookieNames,
    secret_len: usize,
    secure: bool,
}

impl CookieAccessor {
    pub fn new(prefix: &str, secret_len: usize, secure: bool) -> Self {
        Self {
            names: CookieNames::with_prefix(prefix),
            secret_len,
            secure,
        }
    }

    pub fn names(&self) -> &CookieNames {
        &self.names
    }

    /// Only the secret, as needed for verification. The issued-at cookie is
    /// irrelevant here.
    pub fn read_secret(&self, headers: &HeaderMap) -> Option<Vec<u8>> {
        let jar = CookieJar::from_headers(headers);
        let cookie = jar.get(&self.names.secret)?;
        self.decode_secret(cookie.value())
    }

    /// Reconstruct the pair from request cookies.
    pub fn read_pair(&self, headers: &HeaderMap) -> PairState {
        let jar = CookieJar::from_headers(headers);
        let Some(secret) = jar.get(&self.names.secret) else {
            return PairState::Missing;
        };
        let Some(secret) = self.decode_secret(secret.value()) else {
            return PairState::Corrupt;
        };
        let issued_at = jar
            .get(&self.names.issued_at)
            .and_then(|c| c.value().trim().parse::<i64>().ok());

        match issued_at {
            Some(issued_at_ms) => PairState::Present(SecretPair::new(secret, issued_at_ms)),
            None => PairState::Corrupt,
        }
    }

    /// Build both `Set-Cookie` values for a pair.
    pub fn to_cookies(&self, pair: &SecretPair) -> [Cookie<'static>; 2] {
        [
            self.cookie(
                self.names.secret.clone(),
                URL_SAFE_NO_PAD.encode(pair.secret()),
            ),
            self.cookie(self.names.issued_at.clone(), pair.issued_at_ms().to_string()),
        ]
    }

    /// Append both cookies to a response header map. Existing `Set-Cookie`
    /// headers from other stages are kept.
    pub fn write_pair(&self, headers: &mut HeaderMap, pair: &SecretPair) {
        for cookie in self.to_cookies(pair) {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(e) => {
                    tracing::error!(cookie = %cookie.name(), error = %e, "Unencodable CSRF cookie");
                }
            }
        }
    }

    fn cookie(&self, name: String, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .build()
    }

    fn decode_secret(&self, value: &str) -> Option<Vec<u8>> {
        URL_SAFE_NO_PAD
            .decode(value.trim())
            .ok()
            .filter(|bytes| bytes.len() == self.secret_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accessor() -> CookieAccessor {
        CookieAccessor::new("app-", 32, true)
    }

    fn request_headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_names_use_prefix() {
        let names = CookieNames::with_prefix("__Host-");
        assert_eq!(names.secret, "__Host-csrf-secret");
        assert_eq!(names.issued_at, "__Host-csrf-iat");
    }

    #[test]
    fn test_written_pair_reads_back() {
        let accessor = accessor();
        let pair = SecretPair::new(vec![7u8; 32], 1_700_000_000_000);

        let mut response = HeaderMap::new();
        accessor.write_pair(&mut response, &pair);

        let set_cookies: Vec<_> = response
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(set_cookies.len(), 2);
        for value in &set_cookies {
            assert!(value.contains("HttpOnly"));
            assert!(value.contains("SameSite=Strict"));
            assert!(value.contains("Secure"));
            assert!(value.contains("Path=/"));
        }

        // feed the name=value parts back as a Cookie header
        let cookie_header = set_cookies
            .iter()
            .map(|v| v.split(';').next().unwrap().to_string())
            .collect::<Vec<_>>()
            .join("; ");
        let state = accessor.read_pair(&request_headers(&cookie_header));
        assert_eq!(state, PairState::Present(pair));
    }

    #[test]
    fn test_missing_and_corrupt() {
        let accessor = accessor();
        assert_eq!(accessor.read_pair(&HeaderMap::new()), PairState::Missing);
        assert_eq!(
            accessor.read_pair(&request_headers("app-csrf-secret=not-base64!; app-csrf-iat=1")),
            PairState::Corrupt
        );

        let secret = URL_SAFE_NO_PAD.encode([1u8; 32]);
        assert_eq!(
            accessor.read_pair(&request_headers(&format!("app-csrf-secret={}", secret))),
            PairState::Corrupt
        );
        assert_eq!(
            accessor.read_pair(&request_headers(&format!(
                "app-csrf-secret={}; app-csrf-iat=yesterday",
                secret
            ))),
            PairState::Corrupt
        );
    }

    #[test]
    fn test_wrong_secret_length_is_corrupt() {
        let accessor = accessor();
        let secret = URL_SAFE_NO_PAD.encode([1u8; 8]);
        let headers = request_headers(&format!("app-csrf-secret={}; app-csrf-iat=5", secret));
        assert_eq!(accessor.read_pair(&headers), PairState::Corrupt);
        assert!(accessor.read_secret(&headers).is_none());
    }

    #[test]
    fn test_staleness_boundaries() {
        let pair = SecretPair::new(vec![0; 32], 1_000);
        assert!(!pair.is_stale(1_000, 500));
        assert!(!pair.is_stale(1_499, 500));
        assert!(pair.is_stale(1_500, 500));
        assert!(pair.is_stale(999, 500));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let pair = SecretPair::new(vec![0xAB; 32], 1);
        let rendered = format!("{:?}", pair);
        assert!(rendered.contains("redacted"));
    }
}
