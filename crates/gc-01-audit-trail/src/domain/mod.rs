//! Domain module for the audit trail.

pub mod diff;
