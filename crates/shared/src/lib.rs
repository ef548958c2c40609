//! Shared utilities and common types for Kita Manager backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Password and PIN hashing with Argon2id
//! - Password strength validation
//! - Invitation token generation

pub mod password;
pub mod token;
pub mod validation;
