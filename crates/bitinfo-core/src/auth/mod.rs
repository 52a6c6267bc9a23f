//! Authentication: password obfuscation, credential storage and the
//! two-realm session that keeps the identity and tunnel logins alive.

pub mod cipher;
pub mod credentials;
pub mod session;

pub use credentials::{CredentialStore, Credentials};
pub use session::{AuthPhase, Session, SessionOptions, DEFAULT_MAX_WEEKS};
