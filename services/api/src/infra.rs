use metrics_exporter_prometheus::PrometheusHandle;
use perm_tracker::processing::{ProcessingTimeSource, ProcessingTimeStore};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<dyn ProcessingTimeStore>,
    pub(crate) source: Arc<dyn ProcessingTimeSource>,
    pub(crate) source_url: Arc<str>,
    pub(crate) readiness: Arc<AtomicBool>,
    // absent in router tests, which do not install a recorder
    pub(crate) metrics: Option<Arc<PrometheusHandle>>,
}
