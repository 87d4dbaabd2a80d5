//! Run cancellation and branch supersession

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::info;

/// Cancels every token created from it
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

/// Observes a cancellation request
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

/// Create a connected handle and token
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (sender, receiver) = watch::channel(false);
    (
        CancelHandle {
            sender: Arc::new(sender),
        },
        CancelToken { receiver },
    )
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            receiver: self.sender.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        let (_sender, receiver) = watch::channel(false);
        Self { receiver }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested. Pends forever if it never can be.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Tracks the active run per branch. A new run on a branch cancels the previous one.
#[derive(Debug, Default)]
pub struct RunRegistry {
    active: Mutex<HashMap<String, CancelHandle>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run for `branch`, superseding any run already active on it
    pub fn register(&self, branch: &str) -> (CancelHandle, CancelToken) {
        let (handle, token) = cancel_pair();
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(previous) = active.insert(branch.to_string(), handle.clone()) {
            if !previous.is_cancelled() {
                info!("Superseding active run on branch {}", branch);
                previous.cancel();
            }
        }

        (handle, token)
    }

    /// Cancel the active run on `branch`. Returns false if there was none.
    pub fn cancel(&self, branch: &str) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.get(branch) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Forget the run on `branch` if `handle` is still the active one
    pub fn complete(&self, branch: &str, handle: &CancelHandle) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active
            .get(branch)
            .is_some_and(|current| Arc::ptr_eq(&current.sender, &handle.sender))
        {
            active.remove(branch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let (handle, token) = cancel_pair();
        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });

        assert!(!token.is_cancelled());
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(token.is_cancelled());
        assert!(handle.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_never_token_pends() {
        let token = CancelToken::never();
        let result = tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(result.is_err());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_register_supersedes_previous_run() {
        let registry = RunRegistry::new();

        let (_first, first_token) = registry.register("develop");
        let (_other, other_token) = registry.register("master");
        let (second, second_token) = registry.register("develop");

        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
        assert!(!other_token.is_cancelled());

        registry.complete("develop", &second);
        assert!(!registry.cancel("develop"));
        assert!(registry.cancel("master"));
        assert!(other_token.is_cancelled());
    }
}
