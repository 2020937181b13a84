//! Per-account farming loop.

mod bootstrap;
mod runner;
mod state;

pub use bootstrap::login;
pub use runner::{FarmError, Farmer, FarmerConfig};
pub use state::{LoopState, Session};
