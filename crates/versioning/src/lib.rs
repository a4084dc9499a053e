//! Versioned snapshot synchronisation
//!
//! Turns local training snapshots into durable, independently addressable
//! remote versions and keeps the remote side bounded and resolvable:
//!
//! - [`naming`]: version identifiers and series names
//! - [`marker`]: the completion marker contract
//! - [`store`]: the version store client and its two layout strategies
//! - [`uploader`], [`retention`], [`resolver`]: the protocol itself
//! - [`progress`], [`restore`]: the local ends of the pipeline

pub mod clock;
pub mod discovery;
pub mod marker;
pub mod naming;
pub mod progress;
pub mod resolver;
pub mod restore;
pub mod retention;
pub mod store;
pub mod uploader;

pub use clock::{Clock, ManualClock, SystemClock};
pub use discovery::{discover, Discovery};
pub use marker::{CompletionMarker, COMPLETION_MARKER, PROGRESS_FILE};
pub use naming::{container_name, parse_container_name, Series, VersionId};
pub use progress::ProgressTracker;
pub use resolver::Resolver;
pub use restore::{restore, RestoreOutcome, RestoreRequest};
pub use retention::{plan_retention, RetentionManager, RetentionPlan, RetentionPolicy, RetentionReport};
pub use store::{ContainerRecord, ContainerRef, ObjectVersionStore, VersionStore, VersionStoreHandle};
pub use uploader::{UploadReceipt, Uploader};
