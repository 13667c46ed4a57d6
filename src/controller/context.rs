use std::sync::Arc;

use kube::Client;
use kube::runtime::events::Reporter;

use crate::config::OperatorConfig;
use crate::controller::client::{EventPublisher, KubeEventPublisher, KubeResourceClient, ResourceClient};
use crate::health::HealthState;
use crate::resources::common::FIELD_MANAGER;

/// Shared context for the controller
pub struct Context<C: ResourceClient = KubeResourceClient> {
    /// Kubernetes object access
    pub client: Arc<C>,
    /// Event sink
    pub events: Arc<dyn EventPublisher>,
    pub config: OperatorConfig,
    /// Health state for metrics (optional)
    pub health_state: Option<Arc<HealthState>>,
}

impl Context<KubeResourceClient> {
    /// Context backed by the Kubernetes API
    pub fn new(client: Client, config: OperatorConfig, health_state: Option<Arc<HealthState>>) -> Self {
        let reporter = Reporter {
            controller: FIELD_MANAGER.to_string(),
            instance: config.reporter_instance.clone(),
        };
        Self {
            client: Arc::new(KubeResourceClient::new(client.clone())),
            events: Arc::new(KubeEventPublisher::new(client, reporter)),
            config,
            health_state,
        }
    }
}

impl<C: ResourceClient> Context<C> {
    /// Context over arbitrary client and event implementations
    pub fn with_clients(client: Arc<C>, events: Arc<dyn EventPublisher>, config: OperatorConfig) -> Self {
        Self {
            client,
            events,
            config,
            health_state: None,
        }
    }
}
