// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Unit tests for the fleet operator
//!
//! This module contains unit tests for:
//! - Fleet projection onto bindings and orphan detection
//! - Admission policies
//! - The version gate and upgrade decision
//! - Binding lifecycle phases
//! - Conditions and configuration

#[path = "../common/mod.rs"]
mod common;

mod admission;
mod config;
mod orphans;
mod projection;
mod state_machine;
mod status;
