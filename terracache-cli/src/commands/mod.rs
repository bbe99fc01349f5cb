//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`bucket`] - Bucket lookup for a position
//! - [`elevation`] - Load the neighbourhood and query one point
//! - [`fly`] - Step a viewer along a route and report telemetry
//! - [`generate`] - Write synthetic tiles to disk
//! - [`inspect`] - Decode and summarise a tile file

pub mod bucket;
pub mod common;
pub mod elevation;
pub mod fly;
pub mod generate;
pub mod inspect;
