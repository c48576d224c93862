//! Same-origin enforcement for unsafe methods.
//!
//! The request's own origin is `{scheme}://{host}` where the scheme comes from
//! `x-forwarded-proto` (first entry), then the request URI, then `http`, and
//! the host from the `Host` header (or URI authority). The caller's origin is
//! `Origin`, falling back to the origin of `Referer`. Missing or mismatched
//! origins fail closed.

use axum::http::{header, HeaderMap, Uri};
use url::{Origin, Url};

use super::CsrfError;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// The origin this request was addressed to.
pub fn request_origin(headers: &HeaderMap, uri: &Uri) -> Option<Origin> {
    let scheme = headers
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .or_else(|| uri.scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string());

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))?;

    Url::parse(&format!("{}://{}", scheme, host))
        .ok()
        .map(|url| url.origin())
}

/// The origin the caller claims via `Origin` or, failing that, `Referer`.
pub fn caller_origin(headers: &HeaderMap) -> Option<Origin> {
    if let Some(origin) = headers.get(header::ORIGIN) {
        // An explicit Origin wins even if it is unusable ("null").
        return origin
            .to_str()
            .ok()
            .and_then(|v| Url::parse(v).ok())
            .map(|url| url.origin())
            .filter(Origin::is_tuple);
    }

    headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Url::parse(v).ok())
        .map(|url| url.origin())
        .filter(Origin::is_tuple)
}

/// Require the caller's origin to equal the request's own.
pub fn check_same_origin(headers: &HeaderMap, uri: &Uri) -> Result<(), CsrfError> {
    let caller = caller_origin(headers).ok_or(CsrfError::OriginMismatch)?;
    let own = request_origin(headers, uri).ok_or(CsrfError::OriginMismatch)?;

    if caller == own {
        Ok(())
    } else {
        Err(CsrfError::OriginMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn path() -> Uri {
        Uri::from_static("/api/items")
    }

    #[test]
    fn test_matching_origin_passes() {
        let h = headers(&[("host", "app.example.com"), ("origin", "http://app.example.com")]);
        assert!(check_same_origin(&h, &path()).is_ok());
    }

    #[test]
    fn test_forwarded_proto_decides_scheme() {
        let h = headers(&[
            ("host", "app.example.com"),
            ("x-forwarded-proto", "https"),
            ("origin", "https://app.example.com"),
        ]);
        assert!(check_same_origin(&h, &path()).is_ok());

        let h = headers(&[
            ("host", "app.example.com"),
            ("x-forwarded-proto", "https"),
            ("origin", "http://app.example.com"),
        ]);
        assert_eq!(check_same_origin(&h, &path()), Err(CsrfError::OriginMismatch));
    }

    #[test]
    fn test_default_ports_are_normalised() {
        let h = headers(&[
            ("host", "app.example.com:443"),
            ("x-forwarded-proto", "https"),
            ("origin", "https://app.example.com"),
        ]);
        assert!(check_same_origin(&h, &path()).is_ok());
    }

    #[test]
    fn test_referer_fallback() {
        let h = headers(&[
            ("host", "app.example.com"),
            ("referer", "http://app.example.com/settings?tab=1"),
        ]);
        assert!(check_same_origin(&h, &path()).is_ok());

        let h = headers(&[("host", "app.example.com"), ("referer", "http://evil.test/")]);
        assert_eq!(check_same_origin(&h, &path()), Err(CsrfError::OriginMismatch));
    }

    #[test]
    fn test_missing_origin_and_referer_fails() {
        let h = headers(&[("host", "app.example.com")]);
        assert_eq!(check_same_origin(&h, &path()), Err(CsrfError::OriginMismatch));
    }

    #[test]
    fn test_null_origin_does_not_fall_back_to_referer() {
        let h = headers(&[
            ("host", "app.example.com"),
            ("origin", "null"),
            ("referer", "http://app.example.com/"),
        ]);
        assert_eq!(check_same_origin(&h, &path()), Err(CsrfError::OriginMismatch));
    }

    #[test]
    fn test_cross_port_is_mismatch() {
        let h = headers(&[("host", "localhost:3000"), ("origin", "http://localhost:4000")]);
        assert_eq!(check_same_origin(&h, &path()), Err(CsrfError::OriginMismatch));
    }
}
