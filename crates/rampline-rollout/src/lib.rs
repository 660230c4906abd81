//! rampline-rollout — the progressive-delivery state machine.
//!
//! Shifts traffic from a service's stable revision to a newly-ready
//! candidate in configured steps, gated by observed production health, and
//! promotes or rolls back accordingly. All durable state lives in the
//! service object's own annotations, so a pass is a pure function of the
//! fetched snapshot, the strategy, and the clock.
//!
//! # Components
//!
//! - **`traffic`** — stable/candidate identification and the next-split
//!   constructors (step, promote, rollback)
//! - **`controller`** — the per-service decision tree
//! - **`reconciler`** — fetch → decide → replace, one pass per tick
//! - **`annotations`** — the controller's durable annotation keys

pub mod annotations;
pub mod controller;
pub mod error;
pub mod reconciler;
pub mod traffic;

pub use controller::{Outcome, RolloutController};
pub use error::{ReconcileError, RolloutError};
pub use reconciler::{PassSummary, Reconciler};
