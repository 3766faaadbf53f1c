//! HTTP server exposing the field operations sync core.

pub mod api;
pub mod config;
pub mod error;
pub mod main_lib;
