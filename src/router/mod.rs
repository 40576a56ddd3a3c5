//! Command Router: deterministic natural-language classification.
//!
//! This module handles:
//! - Normalizing informal species names and entity id prefixes
//! - The ordered rule table (gene → disease → entity → sequence → cache)
//! - Classifying free text into a typed `Intent`, with a best-guess fallback
//!
//! Classification is synchronous and never fails; input nothing can
//! interpret becomes `Intent::unrecognized()`.

pub mod classifier;
pub mod rules;
pub mod species;
pub mod types;

// Re-exports for convenience
pub use classifier::classify;
pub use types::{Action, Intent, IntentKind};
