//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into request-level operations.
//! - Keep request layers decoupled from storage details.

pub mod pokemon_service;
