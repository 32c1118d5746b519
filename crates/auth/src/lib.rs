//! `strongbox-auth` — token issuance/verification and the authorization gate.
//!
//! This crate is intentionally decoupled from HTTP and storage: the gate takes
//! the raw `Authorization` header value and resolves subjects through the
//! [`SubjectResolver`] seam.

pub mod claims;
pub mod denylist;
pub mod gate;
pub mod password;
pub mod policy;
pub mod token;

pub use claims::{TokenClaims, TokenValidationError, validate_claims};
pub use denylist::{Denylist, DenylistUnavailable};
pub use gate::{AuthorizationGate, Caller, GateError, SubjectLookupError, SubjectResolver};
pub use password::{PasswordError, hash_password, verify_password};
pub use policy::{AccessDenied, AccessPolicy, check_access};
pub use token::{Hs256TokenService, IssuedToken, TokenError, TokenResult, TokenService};
