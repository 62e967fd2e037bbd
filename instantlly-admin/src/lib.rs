//! InstantllyCards admin console library
//!
//! This library provides the server-rendered admin console for the
//! InstantllyCards backend. The binary entry point is in main.rs.

pub mod admin;
pub mod backend;
pub mod config;
pub mod dashboard;
pub mod feedback;
pub mod http;
