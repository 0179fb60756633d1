//! gz-core: Go rules, coordinates, scoring, and configuration.

pub mod config;
pub mod coords;
pub mod position;
pub mod scoring;

pub use config::{Config, ConfigError};
pub use coords::{move_to_human, parse_human, CoordError, Move};
pub use position::{Color, Position, RulesError};
pub use scoring::GameOutcome;

/// Largest supported board (human coordinates run out after 25 columns).
pub const MAX_BOARD_SIZE: usize = 25;

/// Action space size for a `size x size` board: every point plus pass.
#[inline]
pub fn action_space(size: usize) -> usize {
    size * size + 1
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[cfg(test)]
mod position_tests;
