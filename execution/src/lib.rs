//! Rules engine for the market-matrix trading game.
//!
//! Commands are applied through a [`Layer`]: a staged-write overlay on any
//! [`State`] backend. A command that fails is discarded with the backend
//! untouched; a command that succeeds commits its staged writes in one
//! guarded batch.

pub mod deck;
pub mod leaderboard;
pub mod pricing;
pub mod queries;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

mod layer;

mod state;

#[cfg(test)]
mod integration_tests;

pub use layer::Layer;
pub use state::{Memory, State, Status};
