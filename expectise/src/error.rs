// vim: tw=80
//! Error types shared by every Expectise component.

/// Result type alias for Expectise operations.
///
/// The error type defaults to [`MockError`], so that a glob import of the
/// crate leaves two-parameter uses of `Result` alone.
pub type Result<T, E = MockError> = std::result::Result<T, E>;

/// The broad category of a [`MockError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// The mocking environment is misconfigured.
    Environment,
    /// A mocked callable was not used the way the test declared.
    Expectation,
    /// The caller misused the API itself.
    Value,
}

/// Every failure Expectise can report.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum MockError {
    /// Configuration misuse: a callable that is not marked as mocked, a call
    /// without any `Expect` statement, or an incomplete or doubly-configured
    /// expectation.
    #[error("EnvironmentError: {0}")]
    Environment(String),

    /// Mismatch between the scripted expectations and the actual calls: too
    /// many calls, unexpected arguments, or calls still expected at teardown.
    #[error("ExpectationError: {0}")]
    Expectation(String),

    /// API misuse, such as mixing reference modes within a single test.
    #[error("ValueError: {0}")]
    Value(String),
}

impl MockError {
    /// Creates an environment error.
    #[must_use]
    pub fn environment(msg: impl Into<String>) -> Self {
        Self::Environment(msg.into())
    }

    /// Creates an expectation error.
    #[must_use]
    pub fn expectation(msg: impl Into<String>) -> Self {
        Self::Expectation(msg.into())
    }

    /// Creates a value error.
    #[must_use]
    pub fn value(msg: impl Into<String>) -> Self {
        Self::Value(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MockError::Environment(_) => ErrorKind::Environment,
            MockError::Expectation(_) => ErrorKind::Expectation,
            MockError::Value(_) => ErrorKind::Value,
        }
    }

    /// The message without its category prefix.
    pub fn message(&self) -> &str {
        match self {
            MockError::Environment(m)
            | MockError::Expectation(m)
            | MockError::Value(m) => m,
        }
    }
}
