//! Cohort batch processing: bounded workers, a shared rate limiter, and the
//! collect-then-rank pipeline.

pub mod analyzer;
pub mod limiter;
pub mod pipeline;
