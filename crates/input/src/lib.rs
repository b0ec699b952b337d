//! Keyboard and pointer state for the scene loop.
//!
//! # Invariants
//! - Key-down sets, key-up clears. Last state wins; there is no repeat logic.
//! - Handlers only write here. The frame tick is the only reader.
//! - A pick request is consumed at most once.

pub mod key;
pub mod state;

pub use key::NavKey;
pub use state::InputState;
