//! Event bus adapters.
//!
//! - `InMemoryEventBus` - In-process bus with per-type handler fan-out

mod in_memory;

pub use in_memory::InMemoryEventBus;
