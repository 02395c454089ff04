pub mod error;
pub mod key;
pub mod manager;
pub mod store;
pub mod types;

pub use error::SessionError;
pub use key::SessionKey;
pub use manager::SessionManager;
pub use store::SessionStore;
pub use types::{ChatMessage, Role, Session};

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
