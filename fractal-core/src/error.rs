/// Result alias that carries the crate-wide [`FractalError`] type.
pub type Result<T> = std::result::Result<T, FractalError>;

/// Errors surfaced by the fractal lifecycle and construction APIs.
///
/// Frame updates never produce errors once a tree is live; every variant
/// here comes from configuration, allocation or misuse of the lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum FractalError {
    /// Depth or one of the spawn ranges is outside its valid bounds.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Level storage could not be reserved.
    #[error("allocation failed: {0}")]
    Allocation(String),
    /// A lifecycle hook was called in the wrong state (double release,
    /// update before populate, ...).
    #[error("lifecycle misuse: {0}")]
    LifecycleMisuse(String),
    /// Child slot outside `0..=4`.
    #[error("child index {0} is outside 0..=4")]
    InvalidChildIndex(usize),
    /// A configuration file could not be read.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A configuration document is not valid JSON for [`crate::FractalConfig`].
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl FractalError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn misuse<T: Into<String>>(msg: T) -> Self {
        Self::LifecycleMisuse(msg.into())
    }
}
