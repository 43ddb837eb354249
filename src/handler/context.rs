//! Message context for handlers.
//!
//! A [`MessageContext`] describes the message currently being handled. It
//! is passed to every handler invocation explicitly, and is also installed
//! as a task-local value for code that cannot receive it as an argument
//! (e.g. services built by a container factory during the invocation).
//!
//! The task-local is scoped to the invocation: reading it anywhere else
//! fails with [`ActivationError::NoMessageContext`] instead of returning an
//! empty value.
//!
//! # Example
//!
//! ```
//! use procwire_activation::handler::MessageContext;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! assert!(MessageContext::current().is_err());
//!
//! let ctx = MessageContext::new("msg-1").with_header("tenant", "acme");
//! ctx.scope(async {
//!     let current = MessageContext::current().unwrap();
//!     assert_eq!(current.header("tenant"), Some("acme"));
//! })
//! .await;
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::error::{ActivationError, Result};

tokio::task_local! {
    static CURRENT_MESSAGE: MessageContext;
}

/// Metadata about the message being handled.
///
/// `MessageContext` is `Clone` and cheap to clone; headers are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    /// Message ID assigned by the host runtime.
    message_id: Arc<str>,
    /// Type name of the message, when known.
    message_type: Option<&'static str>,
    /// Transport headers.
    headers: Arc<HashMap<String, String>>,
}

impl MessageContext {
    /// Create a context for the given message ID.
    pub fn new(message_id: impl Into<String>) -> Self {
        let message_id: String = message_id.into();
        Self {
            message_id: Arc::from(message_id),
            message_type: None,
            headers: Arc::new(HashMap::new()),
        }
    }

    /// Create a context for a message of type `M`.
    pub fn for_message<M: 'static>(message_id: impl Into<String>) -> Self {
        Self {
            message_type: Some(std::any::type_name::<M>()),
            ..Self::new(message_id)
        }
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.headers).insert(key.into(), value.into());
        self
    }

    /// Get the message ID.
    #[inline]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Get the message type name, if known.
    #[inline]
    pub fn message_type(&self) -> Option<&'static str> {
        self.message_type
    }

    /// Get a header value.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|s| s.as_str())
    }

    /// All headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Get the context of the message currently being handled.
    ///
    /// Fails with [`ActivationError::NoMessageContext`] when called outside
    /// a handler invocation.
    pub fn current() -> Result<MessageContext> {
        CURRENT_MESSAGE
            .try_with(|ctx| ctx.clone())
            .map_err(|_| ActivationError::NoMessageContext)
    }

    /// Whether a handler invocation is in flight on this task.
    pub fn is_active() -> bool {
        CURRENT_MESSAGE.try_with(|_| ()).is_ok()
    }

    /// Run `future` with this context installed as the current one.
    pub async fn scope<F: Future>(self, future: F) -> F::Output {
        CURRENT_MESSAGE.scope(self, future).await
    }

    /// Run `f` with this context installed as the current one.
    pub fn sync_scope<F, R>(self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        CURRENT_MESSAGE.sync_scope(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let ctx = MessageContext::new("abc").with_header("k", "v");

        assert_eq!(ctx.message_id(), "abc");
        assert_eq!(ctx.message_type(), None);
        assert_eq!(ctx.header("k"), Some("v"));
        assert_eq!(ctx.header("missing"), None);
        assert_eq!(ctx.headers().len(), 1);
    }

    #[test]
    fn test_for_message_records_type() {
        let ctx = MessageContext::for_message::<String>("abc");
        assert_eq!(ctx.message_type(), Some(std::any::type_name::<String>()));
    }

    #[test]
    fn test_clone_does_not_share_new_headers() {
        let base = MessageContext::new("abc").with_header("a", "1");
        let extended = base.clone().with_header("b", "2");

        assert_eq!(base.headers().len(), 1);
        assert_eq!(extended.headers().len(), 2);
    }

    #[test]
    fn test_current_outside_invocation_fails() {
        let err = MessageContext::current().unwrap_err();
        assert!(matches!(err, ActivationError::NoMessageContext));
        assert!(!MessageContext::is_active());
    }

    #[test]
    fn test_sync_scope() {
        let ctx = MessageContext::new("sync-1");
        let id = ctx.sync_scope(|| MessageContext::current().map(|c| c.message_id().to_string()));

        assert_eq!(id.unwrap(), "sync-1");
        assert!(MessageContext::current().is_err());
    }

    #[tokio::test]
    async fn test_async_scope() {
        let ctx = MessageContext::new("async-1");
        ctx.scope(async {
            tokio::task::yield_now().await;
            assert!(MessageContext::is_active());
            assert_eq!(MessageContext::current().unwrap().message_id(), "async-1");
        })
        .await;

        assert!(!MessageContext::is_active());
    }

    #[tokio::test]
    async fn test_nested_scope_shadows() {
        let outer = MessageContext::new("outer");
        outer
            .scope(async {
                MessageContext::new("inner")
                    .scope(async {
                        assert_eq!(MessageContext::current().unwrap().message_id(), "inner");
                    })
                    .await;
                assert_eq!(MessageContext::current().unwrap().message_id(), "outer");
            })
            .await;
    }

    #[tokio::test]
    async fn test_spawned_task_does_not_inherit() {
        let ctx = MessageContext::new("parent");
        let inherited = ctx
            .scope(async { tokio::spawn(async { MessageContext::is_active() }).await })
            .await
            .unwrap();

        assert!(!inherited);
    }
}
