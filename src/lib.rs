// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod cooldown;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod state;

// ---- Re-exports for stable public API ----
pub use crate::dispatch::{DeliveryOutcome, Destination, Dispatcher};
pub use crate::engine::{Engine, TickReport};
pub use crate::extract::{extract_signal, Side, Signal};
pub use crate::ingest::{clean_markdown, message_text};
pub use crate::state::{Cursor, CursorStore};
