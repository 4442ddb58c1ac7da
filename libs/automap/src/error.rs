/// Error returned by route registration and dispatch.
///
/// A field kind outside the accessor's closed set is not an error value:
/// it is a panic, because it means the shape tables themselves are wrong.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error("route does not exist in route map: {from} -> {to}")]
    RouteNotFound { from: &'static str, to: &'static str },

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("unknown field '{path}' on {ty}")]
    UnknownField { ty: &'static str, path: String },

    #[error("cyclic shape: {0}")]
    CyclicShape(String),

    #[error("mapping depth limit of {0} exceeded")]
    DepthExceeded(usize),

    #[error("config error: {0}")]
    Config(String),

    /// Raised by hand-written routes.
    #[error("{0}")]
    Custom(String),
}

impl MapError {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Add context to the error.
    ///
    /// Message-carrying variants get the context prepended;
    /// structured variants are returned unchanged.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            MapError::InvalidSource(msg) => MapError::InvalidSource(format!("{ctx}: {msg}")),
            MapError::InvalidDestination(msg) => {
                MapError::InvalidDestination(format!("{ctx}: {msg}"))
            }
            MapError::InvalidShape(msg) => MapError::InvalidShape(format!("{ctx}: {msg}")),
            MapError::Custom(msg) => MapError::Custom(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}
