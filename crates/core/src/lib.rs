//! Crestway Core - Shared types library.
//!
//! This crate provides common types used across the Crestway Academy
//! backend:
//! - `server` - Public site API and admin dashboard API
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for validated emails and phone numbers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
