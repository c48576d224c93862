//! CSRF protection.
//!
//! # Data Flow
//! ```text
//! request cookies ─→ cookies.rs (SecretPair) ─┐
//! request header  ─→ codec.rs (salt, sig)  ───┼─→ engine.rs (verify / rotate)
//! Origin/Referer  ─→ origin.rs ───────────────┘         │
//!                                                       ▼
//!                              response: x-csrf-token + Set-Cookie (pair)
//! ```
//!
//! # Design Decisions
//! - Double-submit with a derived token: the cookie holds the secret, the
//!   header holds HMAC(secret, salt) with a per-token salt
//! - Every failure maps to one opaque 403
//! - Fail closed on any decoding problem

pub mod codec;
pub mod cookies;
pub mod engine;
pub mod origin;

use thiserror::Error;

pub use cookies::{CookieAccessor, CookieNames, PairState, SecretPair};
pub use engine::{forbidden, is_safe_method, CsrfEngine, CsrfOutcome, Issuance, RequestView};

/// Why a request failed CSRF checks. Never shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("origin does not match request host")]
    OriginMismatch,

    #[error("secret cookie or token header missing")]
    MissingCredential,

    #[error("token could not be decoded")]
    MalformedToken,

    #[error("token signature does not match secret")]
    SignatureMismatch,
}

impl CsrfError {
    /// Stable label for logs and metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::OriginMismatch => "origin_mismatch",
            Self::MissingCredential => "missing_credential",
            Self::MalformedToken => "malformed_token",
            Self::SignatureMismatch => "signature_mismatch",
        }
    }
}
