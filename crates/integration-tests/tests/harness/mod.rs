//! Shared fixtures for the integration suites
#![allow(dead_code)]

pub mod config;
pub mod mock_backend;
pub mod server;
