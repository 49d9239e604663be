use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum ResourceError {
    StringError(String),
    IoError(Arc<std::io::Error>),
    BincodeError(Arc<bincode::Error>),
    JsonError(Arc<serde_json::Error>),
    // The file system has nothing at this path
    NotFound(String),
    // No loader claims the extension of this path
    NoLoader(String),
    // Every handle in the fixed-size pool is in use
    PoolExhausted { capacity: usize },
    // The bytes are not a well-formed compiled resource
    InvalidArchive(String),
    // A loader rejected the bytes of a resource
    ParseError { path: String, message: String },
    // A loader failed to create device state for a resource
    InstallError { path: String, message: String },
    // The path is already being loaded further up the same dependency chain
    DependencyCycle(String),
    // A dependency failed, so the resource can never be installed
    DependencyFailed { path: String, dependency: String },
}

impl ResourceError {
    /// Configuration errors mean the engine was set up incorrectly (missing loader, undersized
    /// pool, a dependency cycle in content). They are never transient.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            ResourceError::NoLoader(_)
            | ResourceError::PoolExhausted { .. }
            | ResourceError::DependencyCycle(_) => true,
            _ => false,
        }
    }

    pub fn parse_error<P: Into<String>, M: ToString>(
        path: P,
        message: M,
    ) -> Self {
        ResourceError::ParseError {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn install_error<P: Into<String>, M: ToString>(
        path: P,
        message: M,
    ) -> Self {
        ResourceError::InstallError {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            ResourceError::IoError(ref e) => Some(&**e),
            ResourceError::BincodeError(ref e) => Some(&**e),
            ResourceError::JsonError(ref e) => Some(&**e),
            _ => None,
        }
    }
}

impl core::fmt::Display for ResourceError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            ResourceError::StringError(ref e) => e.fmt(fmt),
            ResourceError::IoError(ref e) => e.fmt(fmt),
            ResourceError::BincodeError(ref e) => e.fmt(fmt),
            ResourceError::JsonError(ref e) => e.fmt(fmt),
            ResourceError::NotFound(ref path) => write!(fmt, "resource file not found: {}", path),
            ResourceError::NoLoader(ref path) => {
                write!(fmt, "no loader registered for resource {}", path)
            }
            ResourceError::PoolExhausted { capacity } => write!(
                fmt,
                "resource handle pool exhausted (capacity {}), raise max_loaded_resources",
                capacity
            ),
            ResourceError::InvalidArchive(ref message) => {
                write!(fmt, "invalid compiled resource: {}", message)
            }
            ResourceError::ParseError {
                ref path,
                ref message,
            } => write!(fmt, "failed to parse {}: {}", path, message),
            ResourceError::InstallError {
                ref path,
                ref message,
            } => write!(fmt, "failed to install {}: {}", path, message),
            ResourceError::DependencyCycle(ref path) => {
                write!(fmt, "dependency cycle detected at {}", path)
            }
            ResourceError::DependencyFailed {
                ref path,
                ref dependency,
            } => write!(fmt, "{} cannot install, dependency {} failed", path, dependency),
        }
    }
}

impl From<&str> for ResourceError {
    fn from(str: &str) -> Self {
        ResourceError::StringError(str.to_string())
    }
}

impl From<String> for ResourceError {
    fn from(string: String) -> Self {
        ResourceError::StringError(string)
    }
}

impl From<std::io::Error> for ResourceError {
    fn from(error: std::io::Error) -> Self {
        ResourceError::IoError(Arc::new(error))
    }
}

impl From<bincode::Error> for ResourceError {
    fn from(error: bincode::Error) -> Self {
        ResourceError::BincodeError(Arc::new(error))
    }
}

impl From<serde_json::Error> for ResourceError {
    fn from(error: serde_json::Error) -> Self {
        ResourceError::JsonError(Arc::new(error))
    }
}

pub type ResourceResult<T> = Result<T, ResourceError>;
