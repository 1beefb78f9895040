//! Core data model: identifiers, errors, targets, profiles and signatures.

pub mod error;
pub mod profile;
pub mod signature;
pub mod target;
pub mod types;
