//! Lazy one-time initialization for expensive service resources
//!
//! Each external service wraps a heavy, stateful resource (a loaded model
//! or a managed process). The first invocation acquires it; subsequent
//! invocations reuse it. A resource that failed to initialize is marked
//! permanently unavailable for the process lifetime so a known-broken
//! model is never reloaded on every call. Per-call failures are transient
//! and leave the resource available.

use crate::{ParleyError, Result};
use parking_lot::Mutex;
use tracing::{error, info};

/// Externally observable initialization state of an adapter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterStatus {
    /// No invocation has happened yet
    Uninitialized,
    /// Resource acquired and reusable
    Ready,
    /// Initialization failed; permanent for the process lifetime
    Failed,
}

enum InitState<T> {
    Uninitialized,
    Ready(T),
    Failed(String),
}

/// A service resource acquired on first use
pub struct LazyService<T> {
    name: &'static str,
    init: Box<dyn Fn() -> Result<T> + Send + Sync>,
    state: Mutex<InitState<T>>,
}

impl<T> LazyService<T> {
    pub fn new(
        name: &'static str,
        init: impl Fn() -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            init: Box::new(init),
            state: Mutex::new(InitState::Uninitialized),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> AdapterStatus {
        match *self.state.lock() {
            InitState::Uninitialized => AdapterStatus::Uninitialized,
            InitState::Ready(_) => AdapterStatus::Ready,
            InitState::Failed(_) => AdapterStatus::Failed,
        }
    }

    /// Run `f` against the initialized resource
    ///
    /// Initializes on first use. Fails fast with `AdapterInitError` when
    /// a previous initialization attempt failed.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock();

        if let InitState::Uninitialized = *state {
            info!("Initializing {} service", self.name);
            match (self.init)() {
                Ok(resource) => {
                    info!("{} service ready", self.name);
                    *state = InitState::Ready(resource);
                }
                Err(e) => {
                    error!("{} service failed to initialize: {}", self.name, e);
                    *state = InitState::Failed(e.to_string());
                }
            }
        }

        match &mut *state {
            InitState::Ready(resource) => f(resource),
            InitState::Failed(reason) => Err(ParleyError::AdapterInitError(format!(
                "{} service unavailable: {}",
                self.name, reason
            ))),
            InitState::Uninitialized => unreachable!("initialization attempted above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_initializes_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let service = LazyService::new("counter", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(0u32)
        });

        assert_eq!(service.status(), AdapterStatus::Uninitialized);
        service.with(|v| Ok(*v)).unwrap();
        service.with(|v| Ok(*v)).unwrap();
        service.with(|v| Ok(*v)).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(service.status(), AdapterStatus::Ready);
    }

    #[test]
    fn test_init_failure_is_permanent() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let service: LazyService<u32> = LazyService::new("broken", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ParleyError::AdapterInitError("model not found".to_string()))
        });

        for _ in 0..3 {
            let err = service.with(|v| Ok(*v)).unwrap_err();
            assert!(matches!(err, ParleyError::AdapterInitError(_)));
        }

        // The heavy init never ran again after the first failure
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(service.status(), AdapterStatus::Failed);
    }

    #[test]
    fn test_call_failure_is_transient() {
        let service = LazyService::new("flaky", || Ok(0u32));

        let err = service
            .with(|_| -> Result<()> {
                Err(ParleyError::AdapterCallError("transient".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, ParleyError::AdapterCallError(_)));

        // Still ready and usable after a failed call
        assert_eq!(service.status(), AdapterStatus::Ready);
        assert_eq!(service.with(|v| Ok(*v)).unwrap(), 0);
    }

    #[test]
    fn test_resource_state_persists_between_calls() {
        let service = LazyService::new("stateful", || Ok(Vec::<u32>::new()));

        service
            .with(|v| {
                v.push(7);
                Ok(())
            })
            .unwrap();
        let len = service.with(|v| Ok(v.len())).unwrap();
        assert_eq!(len, 1);
    }
}
