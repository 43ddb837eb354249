//! Error types for procwire-activation.

use thiserror::Error;

/// Boxed error returned by service factories and handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad category of an [`ActivationError`].
///
/// "No handler for this message" is deliberately absent: an empty handler
/// list is a valid result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Setup-time misconfiguration. Never retried.
    Configuration,
    /// A service or handler factory failed.
    Construction,
    /// An API was called where it has no meaning.
    Usage,
    /// A resolved handler failed while handling a message.
    Handler,
}

/// Main error type for all activation operations.
#[derive(Debug, Error)]
pub enum ActivationError {
    /// Two registrations for the same service type share a binding name.
    #[error("binding name '{name}' is already registered for {service}")]
    DuplicateBinding {
        /// Service type the binding was registered under.
        service: &'static str,
        /// The colliding name.
        name: String,
    },

    /// A bus has already been registered in this container.
    #[error(
        "cannot register the bus in this container because it has already been registered; \
         use separate containers to host multiple bus instances in one process"
    )]
    BusAlreadyRegistered,

    /// A factory failed to build an instance.
    #[error("failed to construct '{name}' for {service}: {source}")]
    Construction {
        /// Service type being resolved.
        service: &'static str,
        /// Binding name of the failing registration.
        name: String,
        /// Error returned by the factory.
        #[source]
        source: BoxError,
    },

    /// A single required service has no registration.
    #[error("no service registered for {0}")]
    NotRegistered(&'static str),

    /// The ambient message context was requested outside a handler invocation.
    #[error(
        "attempted to resolve the current message context, but no message is being handled; \
         it is only available from inside a message handler"
    )]
    NoMessageContext,

    /// A handler failed during dispatch.
    #[error("handler '{binding}' failed: {source}")]
    Handler {
        /// Binding name of the failing handler.
        binding: String,
        /// Error returned by the handler.
        #[source]
        source: BoxError,
    },

    /// JSON error while reading configuration or writing a schema.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ActivationError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateBinding { .. }
            | Self::BusAlreadyRegistered
            | Self::Json(_) => ErrorKind::Configuration,
            Self::Construction { .. } => ErrorKind::Construction,
            Self::NotRegistered(_) | Self::NoMessageContext => ErrorKind::Usage,
            Self::Handler { .. } => ErrorKind::Handler,
        }
    }

    /// Whether this is a setup-time configuration error.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

/// Result type alias using ActivationError.
pub type Result<T> = std::result::Result<T, ActivationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ActivationError::BusAlreadyRegistered.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            ActivationError::NoMessageContext.kind(),
            ErrorKind::Usage
        );

        let err = ActivationError::Construction {
            service: "Foo",
            name: "a:b".to_string(),
            source: "boom".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Construction);
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_construction_error_keeps_source() {
        use std::error::Error as _;

        let err = ActivationError::Construction {
            service: "Foo",
            name: "a:b".to_string(),
            source: "database unavailable".into(),
        };
        assert!(err.to_string().contains("a:b"));
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("database unavailable".to_string())
        );
    }
}
