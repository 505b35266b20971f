//! Cohort-relative quality ranking.
//!
//! Summarizes each metric across the whole cohort into equal-width bands
//! and labels every subject's value with its relative standing, inverting
//! the scale for metrics where lower is better.

pub mod classify;
pub mod cohort;
pub mod distribution;
