//! Validated newtype wrappers shared across the backend.

pub mod email;
pub mod phone;

pub use email::{Email, EmailError};
pub use phone::{Phone, PhoneError};
