//! Live session registry
//!
//! Every accepted connection is registered here until it closes. The
//! listener uses the registry to report the number of live sessions and to
//! cancel all of them on shutdown.
//!
//! ```text
//!                  Arc<SessionRegistry>
//!              ┌──────────────────────────┐
//!   accept ──► │ sessions: DashMap<u64,   │ ◄── on_close (remove)
//!              │   SessionEntry {         │
//!              │     cancel, display_id,  │
//!              │   }>                     │ ──► cancel_all (shutdown)
//!              └──────────────────────────┘
//! ```

pub mod entry;
pub mod error;
pub mod store;

pub use entry::SessionEntry;
pub use error::RegistryError;
pub use store::{RegistryStats, SessionRegistry};
