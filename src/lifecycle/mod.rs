//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs, signals.rs):
//!     Ctrl+C → spawn_ctrl_c_handler → trigger() → server stops accepting → in-flight calls drain → Exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task subscribes
//! - Ctrl+C and test harnesses trigger the same path

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::spawn_ctrl_c_handler;
