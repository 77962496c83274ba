//! Credential storage and the signed-in session.

pub mod error;
pub mod profile;
pub mod session;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use profile::{AccountType, UserProfile};
pub use session::{AuthSession, AuthState, LoginOutcome};
pub use store::{FileTokenStore, MemoryTokenStore, StoredSession, TokenStore, TokenStoreConfig};
pub use token::Credential;
