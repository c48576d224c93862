//! Request context collaborators.
//!
//! Nonce/CSP construction and tenant resolution belong to the application
//! the gateway protects. They are traits here so the pipeline can call them
//! in order. The defaults cover a single-domain deployment.

pub mod nonce;
pub mod tenant;

pub use nonce::{NonceProvider, SecurityPolicy, StrictCspProvider, X_NONCE};
pub use tenant::{merge_tenant_headers, SubdomainTenantResolver, TenantResolver};
