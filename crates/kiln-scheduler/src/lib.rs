//! Build job scheduling for Kiln.
//!
//! Decides when a commit needs a remote build job, submits it to the
//! compute cluster, authenticates the completion callback and reconciles
//! snapshots against live job and artifact state.
//!
//! Every operation reaches the outside world through [`Gateways`], so tests
//! run the same code against in-memory fakes.

pub mod actions;
pub mod callback;
pub mod context;
pub mod ingest;
pub mod locks;
pub mod refresher;
pub mod retry;
pub mod scheduler;
pub mod sync;
pub mod tasks;

pub use actions::{SnapshotAction, SnapshotService};
pub use callback::CallbackAuthenticator;
pub use context::{Context, Gateways, Settings};
pub use locks::CommitLocks;
pub use refresher::SnapshotRefresher;
pub use retry::RetryPolicy;
pub use scheduler::JobScheduler;
pub use sync::{SnapshotSync, SyncReport};
