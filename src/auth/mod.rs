//! Identity provider adapters.

pub mod jwt;
pub mod remote;

pub use jwt::JwtIdentityVerifier;
pub use remote::RemoteIdentityVerifier;
