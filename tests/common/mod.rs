//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{ScriptedTrainer, TestHarness, JAPANESE_DECK_ID};
//! use fsrs_helper::optimizer::OptimizationRequest;
//!
//! #[tokio::test]
//! async fn test_optimize_japanese() {
//!     let harness = TestHarness::new(ScriptedTrainer::succeeding(&[0.1], None));
//!     let handle = harness
//!         .submit(OptimizationRequest::new(JAPANESE_DECK_ID).with_retention_search(false))
//!         .await
//!         .into_handle()
//!         .unwrap();
//!     assert!(handle.wait().await.is_success());
//! }
//! ```

#![allow(dead_code)]

mod constants;
mod fakes;
mod harness;

// Public API - this is what tests import
pub use constants::*;
pub use fakes::{
    held_prompter, review, Gate, HeldPrompter, RecordingNotifier, ScriptedPrompter,
    ScriptedTrainer, StaticSource, TrainerBehavior,
};
pub use harness::{wait_for_state, TestHarness};
