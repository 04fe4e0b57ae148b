//! Runtime lifecycle, worker loading and dispatch.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher::call(worker, method, args)
//!     │
//!     ├── marshal::validate_args       (closed map, kinds)
//!     │
//!     ├── RuntimeManager::ensure_worker_loaded
//!     │       └── initialize()          (single shared start)
//!     │       └── Backend::install_worker (once per worker per session)
//!     │
//!     ├── RuntimeManager::call
//!     │       └── Backend::call
//!     │
//!     └── outcome::discriminate        (success payload | error payload)
//! ```
//!
//! # Module Structure
//!
//! - `backend` - `Backend` trait and the call envelope
//! - `manager` - lifecycle state machine
//! - `loader` - per-worker lazy loading
//! - `slot` - shared manager instance for the composition root
//! - `dispatch` - `Dispatcher` and typed result decoding

mod backend;
mod dispatch;
mod loader;
mod manager;
mod slot;

pub use backend::{Backend, CallEnvelope};
pub use dispatch::{Dispatcher, decode};
pub use manager::{RuntimeManager, RuntimeState, WorkerDescriptor};
pub use slot::ManagerSlot;
