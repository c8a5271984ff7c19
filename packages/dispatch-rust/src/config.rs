/// Dispatcher-level configuration.
///
/// Controls the tracing emitted around each dispatch. Behavior and handler
/// wiring is done through [`DispatcherBuilder`](crate::DispatcherBuilder).
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Label recorded on every `dispatch` span, to tell dispatchers apart.
    pub name: String,
    /// Open a `dispatch` span (with a fresh `dispatch_id`) around every call.
    pub trace_dispatches: bool,
    /// Emit a `debug` event when a dispatch ends in a business failure.
    pub log_failures: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: "conduit".to_string(),
            trace_dispatches: true,
            log_failures: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_traces_and_logs() {
        let config = DispatcherConfig::default();
        assert_eq!(config.name, "conduit");
        assert!(config.trace_dispatches);
        assert!(config.log_failures);
    }
}
