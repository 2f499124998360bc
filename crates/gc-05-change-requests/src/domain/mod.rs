pub mod gating;

pub use gating::{GateCondition, GateRule, GatingPolicy, ProposalPlan};
