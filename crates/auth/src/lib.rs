//! `merchstore-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. Token
//! signing/verification and the CAS HTTP round trip live in the API layer;
//! here are only the deterministic pieces: claim validation, credential
//! checking, CAS response parsing, and the policy check.

pub mod authorize;
pub mod cas;
pub mod claims;
pub mod credentials;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use cas::{CasSuccess, parse_service_validate};
pub use claims::{JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use credentials::{
    Credential, CredentialError, CredentialStore, InMemoryCredentialStore, verify_login,
};
pub use permissions::Permission;
pub use principal::PrincipalId;
pub use roles::Role;
