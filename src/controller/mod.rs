pub mod client;
pub mod context;
pub mod error;
pub mod finalizer;
pub mod reconciler;
pub mod status;
pub mod sync;
pub mod validation;

pub use client::{EventPublisher, KubeEventPublisher, KubeResourceClient, ManagedResource, ResourceClient};
pub use context::Context;
pub use error::{Error, Result};
pub use finalizer::FINALIZER;
pub use reconciler::{REQUEUE_AFTER_ERROR, REQUEUE_AFTER_SUCCESS, REQUEUE_IMMEDIATELY, error_policy, reconcile};
pub use status::{ConditionBuilder, Observed};
pub use sync::{Reconcilable, SyncOutcome, UpdatePolicy, ensure};
pub use validation::{MAX_REPLICAS, MIN_REPLICAS, validate_spec};
