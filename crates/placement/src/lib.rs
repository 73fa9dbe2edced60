//! Internship placement engine: application lifecycle, projections, and proctored assessments.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
