pub mod backup;
pub mod certificate;
pub mod common;
pub mod config_map;
pub mod pooler;
pub mod secret;
pub mod service;
pub mod service_monitor;
pub mod statefulset;

pub use common::{API_VERSION, FIELD_MANAGER, KIND, owner_reference, standard_labels};
