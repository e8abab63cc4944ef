//! Gqlex - GraphQL operation extraction for schema-deprecation migrations
//!
//! Gqlex is a CLI tool and library that finds every GraphQL operation embedded
//! as a string template in a JS/TS codebase, resolves the dynamic parts
//! (interpolations, shared naming registries, conditional fragments), and
//! produces a canonical, de-duplicated, migration-aware view of the project.
//!
//! ## Module Structure
//!
//! - `cli`: Command-line interface layer (user-facing commands and reports)
//! - `config`: Configuration and pattern-registry file loading and parsing
//! - `core`: Core extraction engine (phased pipeline)
//! - `utils`: Shared utility functions

pub mod cli;
pub mod config;
pub mod core;
pub mod utils;
