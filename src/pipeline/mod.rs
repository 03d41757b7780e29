//! Pipeline orchestration.
//!
//! The stage gating table lives in `state` as one explicit state machine;
//! `runner` owns the backend client and drives stage actions (trigger, poll,
//! refresh) against it. Stages never re-derive each other's gating: every
//! enabled/complete question is answered by [`Stage`] against the one shared
//! [`PipelineState`].

pub mod runner;
pub mod state;

pub use runner::PipelineRunner;
pub use state::{PipelineState, Stage};
