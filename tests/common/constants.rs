//! Shared constants for integration tests
//!
//! When the fake collection changes, update only this file.

// ============================================================================
// Fake collection
// ============================================================================

/// Deck with no review history.
pub const JAPANESE_DECK_ID: i64 = 42;
pub const JAPANESE_DECK_NAME: &str = "Japanese";

pub const SPANISH_DECK_ID: i64 = 7;
pub const SPANISH_DECK_NAME: &str = "Spanish";

/// Deck with a handful of reviews.
pub const DEFAULT_DECK_ID: i64 = 1;
pub const DEFAULT_DECK_NAME: &str = "Default";
pub const DEFAULT_DECK_RECORDS: usize = 3;

/// Never present in the fake collection.
pub const MISSING_DECK_ID: i64 = 404;

// ============================================================================
// Trainer output
// ============================================================================

pub const SCENARIO_A_WEIGHTS: [f64; 2] = [0.1, 0.2];
pub const SCENARIO_B_WEIGHTS: [f64; 1] = [0.3];
pub const SCENARIO_B_RETENTION: f64 = 0.92;

pub const INSTALL_GUIDANCE: &str =
    "You need to have the optimizer installed. Run `pip install fsrs4anki_optimizer`.";
