//! Application state shared across handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use rk_connectors::SecureString;
use rk_core::Reconciler;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Engine invoked by the reconcile route.
    pub reconciler: Arc<Reconciler>,
    /// Bearer tokens accepted by authenticated routes.
    pub tokens: Arc<ApiTokens>,
    /// Held for the duration of a run. At most one run is in flight.
    pub run_lock: Arc<Mutex<()>>,
    /// Prometheus metrics handle for rendering metrics.
    pub prometheus_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    pub fn new(reconciler: Reconciler, tokens: ApiTokens) -> Self {
        info!(
            directories = reconciler.directory_names().len(),
            operators = tokens.len(),
            "API state initialized"
        );

        Self {
            reconciler: Arc::new(reconciler),
            tokens: Arc::new(tokens),
            run_lock: Arc::new(Mutex::new(())),
            prometheus_handle: None,
        }
    }

    /// Creates a new application state with Prometheus handle.
    pub fn with_prometheus_handle(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus_handle = Some(Arc::new(handle));
        self
    }

    /// True while a run holds the lock.
    pub fn run_in_progress(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }
}

/// Operator names keyed by the bearer token they present.
#[derive(Debug, Clone, Default)]
pub struct ApiTokens {
    entries: Vec<(String, SecureString)>,
}

impl ApiTokens {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, SecureString)>,
    {
        Self {
            entries: entries
                .into_iter()
                .filter(|(_, token)| !token.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the operator owning `candidate`.
    ///
    /// Every token is compared so the time taken does not depend on which
    /// entry matched.
    pub fn operator_for(&self, candidate: &str) -> Option<&str> {
        let mut found = None;
        for (operator, token) in &self.entries {
            if token.matches(candidate) && found.is_none() {
                found = Some(operator.as_str());
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> ApiTokens {
        ApiTokens::new([
            ("alice".to_string(), SecureString::from("token-a")),
            ("bob".to_string(), SecureString::from("token-b")),
            ("nobody".to_string(), SecureString::from("")),
        ])
    }

    #[test]
    fn test_operator_lookup() {
        let tokens = tokens();
        assert_eq!(tokens.operator_for("token-b"), Some("bob"));
        assert_eq!(tokens.operator_for("token-c"), None);
    }

    #[test]
    fn test_empty_tokens_are_dropped() {
        let tokens = tokens();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens.operator_for(""), None);
    }
}
