//! Caddy-backed implementation of [`EdgeBackend`].

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::artifact::ChangeGate;
use crate::config::schema::DEFAULT_INGRESS_CLASS;
use crate::config::{read_overrides, ControllerSettings, HealthSettings};
use crate::controller::{BackendInfo, EdgeBackend, ReloadOutcome};
use crate::error::ControllerError;
use crate::health::{HealthCheckError, HealthProbe};
use crate::model::{BackendPolicy, ConfigModel};
use crate::observability::metrics;
use crate::passthrough::PassthroughTable;
use crate::process::ProcessControl;
use crate::template::{TemplateContext, TemplateRenderer, TemplateSlot};

/// State only touched while an update holds the lock.
struct UpdateState {
    renderer: TemplateRenderer,
    last_model_json: Option<String>,
    /// Set while a written artifact has not reached the process.
    signal_pending: bool,
}

pub struct EdgeController<P> {
    process: P,
    gate: ChangeGate,
    table: PassthroughTable,
    probe: HealthProbe,
    health: HealthSettings,
    resolvers: Vec<String>,
    overrides: ArcSwap<BTreeMap<String, String>>,
    update: Mutex<UpdateState>,
}

impl<P: ProcessControl> EdgeController<P> {
    pub fn new(settings: &ControllerSettings, slot: TemplateSlot, process: P, table: PassthroughTable) -> Self {
        Self {
            process,
            gate: ChangeGate::new(&settings.paths.config),
            table,
            probe: HealthProbe::new(&settings.health),
            health: settings.health.clone(),
            resolvers: settings.resolvers.clone(),
            overrides: ArcSwap::from_pointee(BTreeMap::new()),
            update: Mutex::new(UpdateState {
                renderer: TemplateRenderer::new(slot),
                last_model_json: None,
                signal_pending: false,
            }),
        }
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    pub fn passthrough_table(&self) -> &PassthroughTable {
        &self.table
    }

    /// JSON of the last model that rendered successfully.
    pub async fn last_model_json(&self) -> Option<String> {
        self.update.lock().await.last_model_json.clone()
    }

    /// The ingress class to act on; `requested` wins over the default.
    pub fn resolve_ingress_class(&self, requested: Option<&str>) -> String {
        match requested.filter(|class| !class.is_empty()) {
            Some(class) if class != DEFAULT_INGRESS_CLASS => {
                tracing::info!(
                    class = %class,
                    default = DEFAULT_INGRESS_CLASS,
                    "Using non-default ingress class"
                );
                class.to_string()
            }
            _ => DEFAULT_INGRESS_CLASS.to_string(),
        }
    }

    /// Render `model` and reload when the artifact changed.
    ///
    /// The whole cycle runs under one acquisition of the update lock.
    pub async fn sync(&self, model: &ConfigModel) -> Result<ReloadOutcome, ControllerError> {
        let mut state = self.update.lock().await;
        let artifact = match self.render_locked(&mut state, model) {
            Ok(artifact) => artifact,
            Err(e) => {
                metrics::record_reload("failed");
                return Err(e);
            }
        };
        self.reload_locked(&mut state, &artifact).await
    }

    fn render_locked(&self, state: &mut UpdateState, model: &ConfigModel) -> Result<Vec<u8>, ControllerError> {
        let cfg = read_overrides(&self.overrides.load());
        let ctx = TemplateContext::new(model, &cfg, &self.health, &self.resolvers);
        let artifact = state.renderer.render(&ctx)?;

        state.last_model_json = Some(serde_json::to_string(model).map_err(ControllerError::Serialize)?);
        self.table.replace(&model.tcp_passthrough);
        Ok(artifact)
    }

    /// Persist `artifact` if it differs from disk, then signal the process.
    ///
    /// A failed signal stays pending, so a retry with identical bytes still
    /// delivers it.
    async fn reload_locked(&self, state: &mut UpdateState, artifact: &[u8]) -> Result<ReloadOutcome, ControllerError> {
        let changed = self.gate.needs_reload(artifact).await;
        if !changed && !state.signal_pending {
            metrics::record_reload("not_required");
            tracing::debug!("Rendered configuration unchanged, skipping reload");
            return Ok(ReloadOutcome::NotRequired);
        }

        let result = self.persist_and_signal(state, artifact, changed).await;
        metrics::record_reload(if result.is_ok() { "reloaded" } else { "failed" });
        result?;
        Ok(ReloadOutcome::Reloaded)
    }

    async fn persist_and_signal(
        &self,
        state: &mut UpdateState,
        artifact: &[u8],
        changed: bool,
    ) -> Result<(), ControllerError> {
        if changed {
            self.gate.persist(artifact).await?;
            tracing::debug!(
                path = %self.gate.path().display(),
                model = state.last_model_json.as_deref().unwrap_or_default(),
                artifact = %String::from_utf8_lossy(artifact),
                "Configuration written"
            );
        } else {
            tracing::info!("Retrying pending reload signal");
        }

        state.signal_pending = true;
        self.process.signal_reload()?;
        state.signal_pending = false;
        tracing::info!(pid = ?self.process.pid(), "Edge process reloaded");
        Ok(())
    }
}

impl<P: ProcessControl> EdgeBackend for EdgeController<P> {
    fn name(&self) -> &str {
        "Caddy"
    }

    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name().to_string(),
            release: env!("CARGO_PKG_VERSION").to_string(),
            repository: env!("CARGO_PKG_REPOSITORY").to_string(),
        }
    }

    fn default_ingress_class(&self) -> &str {
        DEFAULT_INGRESS_CLASS
    }

    fn set_config(&self, overrides: Option<BTreeMap<String, String>>) {
        let Some(overrides) = overrides else {
            tracing::debug!("No configuration overrides supplied, keeping current");
            return;
        };
        tracing::debug!(keys = overrides.len(), "Configuration overrides updated");
        self.overrides.store(Arc::new(overrides));
    }

    fn backend_defaults(&self) -> BackendPolicy {
        read_overrides(&self.overrides.load()).backend
    }

    async fn on_update(&self, model: &ConfigModel) -> Result<Option<Vec<u8>>, ControllerError> {
        let mut state = self.update.lock().await;
        let artifact = self.render_locked(&mut state, model)?;
        if self.gate.needs_reload(&artifact).await || state.signal_pending {
            Ok(Some(artifact))
        } else {
            Ok(None)
        }
    }

    async fn reload(&self, artifact: &[u8]) -> Result<ReloadOutcome, ControllerError> {
        let mut state = self.update.lock().await;
        self.reload_locked(&mut state, artifact).await
    }

    async fn check(&self) -> Result<(), HealthCheckError> {
        self.probe.check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Backend, Endpoint, L4Mapping, Location, Server};
    use crate::process::SignalError;
    use crate::template::CompiledTemplate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default, Clone)]
    struct CountingProcess {
        signals: Arc<AtomicUsize>,
    }

    impl ProcessControl for CountingProcess {
        fn signal_reload(&self) -> Result<(), SignalError> {
            self.signals.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn pid(&self) -> Option<u32> {
            Some(4242)
        }
    }

    struct StoppedProcess;

    impl ProcessControl for StoppedProcess {
        fn signal_reload(&self) -> Result<(), SignalError> {
            Err(SignalError::NotRunning)
        }

        fn pid(&self) -> Option<u32> {
            None
        }
    }

    const SOURCE: &str = "{% for s in servers %}{{ s.hostname }}{% for b in backends %}{% for e in b.endpoints %} {{ e.address }}:{{ e.port }}{% endfor %}{% endfor %};{% endfor %}body={{ cfg.proxy_body_size }}";

    /// Fails the first reload signal, delivers every later one.
    #[derive(Default, Clone)]
    struct FlakyProcess {
        attempts: Arc<AtomicUsize>,
        delivered: Arc<AtomicUsize>,
    }

    impl ProcessControl for FlakyProcess {
        fn signal_reload(&self) -> Result<(), SignalError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(SignalError::NotRunning);
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn pid(&self) -> Option<u32> {
            Some(4242)
        }
    }

    fn controller<P: ProcessControl>(dir: &tempfile::TempDir, process: P) -> EdgeController<P> {
        let mut settings = ControllerSettings::default();
        settings.paths.config = dir.path().join("Caddyfile").display().to_string();
        let slot = TemplateSlot::new(CompiledTemplate::from_source("t", SOURCE).unwrap());
        EdgeController::new(&settings, slot, process, PassthroughTable::new())
    }

    fn model(address: &str) -> ConfigModel {
        let mut model = ConfigModel::default();
        model.backends.push(Backend::new("b1", vec![Endpoint::new(address, 8080)]));
        model.servers.push(Server::new("a.test", vec![Location::new("/", "b1")]));
        model
    }

    #[tokio::test]
    async fn identical_update_does_not_signal() {
        let dir = tempfile::tempdir().unwrap();
        let process = CountingProcess::default();
        let controller = controller(&dir, process.clone());

        assert_eq!(controller.sync(&model("10.0.0.5")).await.unwrap(), ReloadOutcome::Reloaded);
        assert_eq!(controller.sync(&model("10.0.0.5")).await.unwrap(), ReloadOutcome::NotRequired);
        assert_eq!(process.signals.load(Ordering::SeqCst), 1);

        assert_eq!(controller.sync(&model("10.0.0.6")).await.unwrap(), ReloadOutcome::Reloaded);
        assert_eq!(process.signals.load(Ordering::SeqCst), 2);

        let written = std::fs::read_to_string(dir.path().join("Caddyfile")).unwrap();
        assert_eq!(written, "a.test 10.0.0.6:8080;body=1m");
    }

    #[tokio::test]
    async fn on_update_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let process = CountingProcess::default();
        let controller = controller(&dir, process.clone());

        let artifact = controller.on_update(&model("10.0.0.5")).await.unwrap().unwrap();
        assert_eq!(controller.reload(&artifact).await.unwrap(), ReloadOutcome::Reloaded);
        assert_eq!(controller.reload(&artifact).await.unwrap(), ReloadOutcome::NotRequired);
        assert!(controller.on_update(&model("10.0.0.5")).await.unwrap().is_none());
        assert_eq!(process.signals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn overrides_flow_into_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir, CountingProcess::default());

        let mut overrides = BTreeMap::new();
        overrides.insert("proxy-body-size".to_string(), "8m".to_string());
        overrides.insert("proxy-read-timeout".to_string(), "120".to_string());
        controller.set_config(Some(overrides));

        assert_eq!(controller.backend_defaults().proxy_read_timeout, 120);
        let artifact = controller.on_update(&model("10.0.0.5")).await.unwrap().unwrap();
        assert!(String::from_utf8(artifact).unwrap().ends_with("body=8m"));

        controller.set_config(None);
        assert_eq!(controller.backend_defaults().proxy_read_timeout, 120);

        controller.set_config(Some(BTreeMap::new()));
        assert_eq!(controller.backend_defaults(), BackendPolicy::default());
    }

    #[tokio::test]
    async fn update_records_model_and_passthrough_routes() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir, CountingProcess::default());
        assert!(controller.last_model_json().await.is_none());

        let mut m = model("10.0.0.5");
        m.tcp_passthrough.insert(L4Mapping::new("svc.example.com", "10.0.0.9:8443"));
        controller.sync(&m).await.unwrap();

        let json = controller.last_model_json().await.unwrap();
        let decoded: ConfigModel = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, m);
        assert_eq!(
            controller.passthrough_table().lookup("svc.example.com").as_deref(),
            Some("10.0.0.9:8443")
        );
    }

    #[tokio::test]
    async fn render_failure_leaves_artifact_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let process = CountingProcess::default();
        let mut settings = ControllerSettings::default();
        settings.paths.config = dir.path().join("Caddyfile").display().to_string();
        let slot = TemplateSlot::new(CompiledTemplate::from_source("t", "{{ nope.nothing }}").unwrap());
        let controller = EdgeController::new(&settings, slot, process.clone(), PassthroughTable::new());

        let err = controller.sync(&model("10.0.0.5")).await.unwrap_err();
        assert!(matches!(err, ControllerError::Render(_)));
        assert!(!dir.path().join("Caddyfile").exists());
        assert_eq!(process.signals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn signal_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir, StoppedProcess);

        let err = controller.sync(&model("10.0.0.5")).await.unwrap_err();
        assert!(matches!(err, ControllerError::Signal(SignalError::NotRunning)));
    }

    #[tokio::test]
    async fn failed_signal_is_retried_with_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let process = FlakyProcess::default();
        let controller = controller(&dir, process.clone());

        let err = controller.sync(&model("10.0.0.5")).await.unwrap_err();
        assert!(matches!(err, ControllerError::Signal(SignalError::NotRunning)));
        assert!(dir.path().join("Caddyfile").exists());

        assert_eq!(controller.sync(&model("10.0.0.5")).await.unwrap(), ReloadOutcome::Reloaded);
        assert_eq!(process.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(process.delivered.load(Ordering::SeqCst), 1);

        assert_eq!(controller.sync(&model("10.0.0.5")).await.unwrap(), ReloadOutcome::NotRequired);
        assert_eq!(process.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pending_signal_survives_on_update() {
        let dir = tempfile::tempdir().unwrap();
        let process = FlakyProcess::default();
        let controller = controller(&dir, process.clone());

        let artifact = controller.on_update(&model("10.0.0.5")).await.unwrap().unwrap();
        assert!(controller.reload(&artifact).await.is_err());

        let retry = controller.on_update(&model("10.0.0.5")).await.unwrap();
        assert_eq!(retry.as_deref(), Some(artifact.as_slice()));
        assert_eq!(controller.reload(&artifact).await.unwrap(), ReloadOutcome::Reloaded);
        assert_eq!(process.delivered.load(Ordering::SeqCst), 1);

        assert!(controller.on_update(&model("10.0.0.5")).await.unwrap().is_none());
    }

    #[test]
    fn ingress_class_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir, CountingProcess::default());

        assert_eq!(controller.resolve_ingress_class(None), "caddy");
        assert_eq!(controller.resolve_ingress_class(Some("")), "caddy");
        assert_eq!(controller.resolve_ingress_class(Some("edge")), "edge");
        assert_eq!(controller.default_ingress_class(), "caddy");
        assert_eq!(controller.info().name, "Caddy");
    }
}
