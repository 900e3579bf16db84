use std::fmt;

/// Main error type for the murmur gossip simulator
#[derive(Debug)]
pub enum SimError {
    /// Configuration or CLI argument errors
    Config(String),

    /// A node id that is not part of the simulation
    NodeNotFound(String),

    /// Transport layer errors
    Transport(String),

    /// Serialization/deserialization errors
    Serialization(serde_json::Error),

    /// Internal lock poisoning or concurrency errors
    Concurrency(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SimError::NodeNotFound(node) => write!(f, "Node not found: {}", node),
            SimError::Transport(msg) => write!(f, "Transport error: {}", msg),
            SimError::Serialization(err) => write!(f, "Serialization error: {}", err),
            SimError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            SimError::Config(_) => "configuration_error",
            SimError::NodeNotFound(_) => "node_not_found",
            SimError::Transport(_) => "transport_error",
            SimError::Serialization(_) => "serialization_error",
            SimError::Concurrency(_) => "concurrency_error",
        }
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Serialization(err)
    }
}

impl<T> From<std::sync::PoisonError<T>> for SimError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        SimError::Concurrency(format!("Mutex lock fail {}", err))
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::SimError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::SimError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::error::SimError::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::SimError::Transport(format!($fmt, $($arg)*))
    };
}
