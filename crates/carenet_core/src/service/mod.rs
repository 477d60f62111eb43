//! Registry use-case services.
//!
//! # Responsibility
//! - Keep the facility/individual association consistent from both sides.
//! - Translate typed requests into record store units of work.
//! - Keep transport layers decoupled from storage details.

pub mod association;
pub mod error;
pub mod registry_service;
