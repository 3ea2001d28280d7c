//! Application services: authentication, notification dispatch, and the
//! chat assistant proxy.

pub mod assistant;
pub mod auth;
pub mod notifier;

pub use assistant::{Assistant, AssistantError};
pub use auth::{AuthError, AuthService};
pub use notifier::{Notifier, NotifierError};
