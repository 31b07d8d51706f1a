//! Fakes shared by the registry and sweeper tests.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dreamjob_core::{ContextFactory, FactoryError, UserIdentity};
use parking_lot::Mutex;

/// Context handed out by [`CountingFactory`]: a sequence number per creation.
pub(crate) type TestContext = Arc<usize>;

/// Factory that counts calls and can be told to fail or stall.
#[derive(Default)]
pub(crate) struct CountingFactory {
    created: AtomicUsize,
    fail_next: AtomicBool,
    delay: Mutex<Option<Duration>>,
    destroyed: Mutex<Vec<usize>>,
}

impl CountingFactory {
    pub(crate) fn slow(delay: Duration) -> Self {
        let factory = Self::default();
        *factory.delay.lock() = Some(delay);
        factory
    }

    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn destroyed(&self) -> Vec<usize> {
        self.destroyed.lock().clone()
    }
}

#[async_trait]
impl ContextFactory for CountingFactory {
    type Context = TestContext;

    async fn create(&self, identity: &UserIdentity) -> Result<Self::Context, FactoryError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(FactoryError::new(identity.clone(), "upstream unavailable"));
        }
        let seq = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(seq))
    }

    async fn destroy(&self, context: Self::Context) {
        self.destroyed.lock().push(*context);
    }
}
