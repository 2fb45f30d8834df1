//! Everything a command needs, bundled once per invocation.
use std::sync::Arc;

use crate::config::Config;
use crate::error::RegistryError;
use crate::exec::{Executor, SystemExecutor};
use crate::features::{FeatureRegistry, PreferenceStore};
use crate::marker::ConnectedMarker;
use crate::platform;
use crate::rhsm::{DbusSubscription, SubscriptionService};
use crate::systemd::{DbusServiceManager, ServiceManager};
use crate::telemetry::{InsightsClient, TelemetryClient};

/// Shared context for features and orchestration.
pub struct Context {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Validated feature registry.
    pub registry: Arc<FeatureRegistry>,
    /// Feature preference document.
    pub preferences: PreferenceStore,
    /// "Connected" marker file.
    pub marker: ConnectedMarker,
    /// Subscription management collaborator.
    pub subscription: Arc<dyn SubscriptionService>,
    /// Telemetry client collaborator.
    pub telemetry: Arc<dyn TelemetryClient>,
    /// Service manager collaborator.
    pub services: Arc<dyn ServiceManager>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("preferences", &self.preferences)
            .field("marker", &self.marker)
            .field("subscription", &"<dyn SubscriptionService>")
            .field("telemetry", &"<dyn TelemetryClient>")
            .field("services", &"<dyn ServiceManager>")
            .finish()
    }
}

impl Context {
    /// Context over the given collaborators. State files live in the
    /// configured state directory.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        registry: Arc<FeatureRegistry>,
        subscription: Arc<dyn SubscriptionService>,
        telemetry: Arc<dyn TelemetryClient>,
        services: Arc<dyn ServiceManager>,
    ) -> Self {
        Self {
            preferences: PreferenceStore::new(&config.state_dir),
            marker: ConnectedMarker::new(&config.state_dir),
            config,
            registry,
            subscription,
            telemetry,
            services,
        }
    }

    /// Context talking to the real system: D-Bus for subscription
    /// management and systemd, the configured telemetry executable.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in feature registry is invalid.
    pub fn system(config: Config) -> Result<Self, RegistryError> {
        let registry = Arc::new(FeatureRegistry::builtin()?);
        let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
        let telemetry = Arc::new(InsightsClient::new(
            config.telemetry.program.clone(),
            executor,
        ));
        Ok(Self::new(
            Arc::new(config),
            registry,
            Arc::new(DbusSubscription::new(platform::locale())),
            telemetry,
            Arc::new(DbusServiceManager::new()),
        ))
    }

    /// Whether the host is connected.
    ///
    /// A non-empty consumer UUID is authoritative. If the subscription
    /// service cannot be asked, the marker file decides.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        match self.subscription.consumer_uuid() {
            Ok(uuid) => !uuid.is_empty(),
            Err(e) => {
                let marker = self.marker.exists();
                tracing::warn!("unable to get consumer UUID ({e}); marker says connected={marker}");
                marker
            }
        }
    }
}
