//! Commit history extraction: log parsing, branch divergence, contributions.
//!
//! Parses `git log` plumbing text into structured commit records, compares
//! a target branch against a default branch, and rolls commits up into
//! per-author contribution statistics.

pub mod backend;
pub mod divergence;
pub mod identity;
pub mod parser;
