/// An event the host delivered outside the declared ordering.
///
/// Host frameworks are authoritative for ordering in practice, so this is a
/// defensive check: violations are logged and the offending call is ignored,
/// they never terminate the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("'{event}' is not valid while '{state}'")]
pub struct ProtocolViolation {
    /// Name of the rejected host event.
    pub event: &'static str,
    /// Name of the state the bridge was in when the event arrived.
    pub state: &'static str,
}

impl ProtocolViolation {
    pub fn new(event: &'static str, state: &'static str) -> Self {
        Self { event, state }
    }
}

/// Fatal bridge failures reported to the caller. Out-of-order host events
/// are not errors at this boundary; they are logged as [`ProtocolViolation`]
/// and the offending call is ignored.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The engine module could not be located or initialized at create.
    /// Fatal: no further contract can be honored, startup must abort.
    #[error("engine module '{module}' failed to load: {source}")]
    EngineLoad {
        module: String,
        #[source]
        source: anyhow::Error,
    },
}
