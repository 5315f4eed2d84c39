//! Bounded-timeout mutex used for every entity group.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use crate::StoreError;

/// Acquisition policy for entity locks.
#[derive(Debug, Clone, Copy)]
pub struct LockConfig {
    /// How long one acquisition attempt may wait.
    pub timeout: Duration,
    /// Additional attempts after the first times out.
    pub retries: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            retries: 2,
            backoff: Duration::from_millis(50),
        }
    }
}

/// A mutex whose `lock` gives up after the configured timeout instead of
/// waiting forever, retrying a couple of times with a short pause first.
#[derive(Debug)]
pub struct TimedMutex<T> {
    entity: &'static str,
    config: LockConfig,
    inner: Mutex<T>,
}

impl<T> TimedMutex<T> {
    pub fn new(entity: &'static str, config: LockConfig, value: T) -> Self {
        Self {
            entity,
            config,
            inner: Mutex::new(value),
        }
    }

    /// Acquires the lock within the bounded timeout, or fails with
    /// [`StoreError::LockContended`].
    pub async fn lock(&self) -> Result<MutexGuard<'_, T>, StoreError> {
        let mut attempt = 0;
        loop {
            match tokio::time::timeout(self.config.timeout, self.inner.lock())
                .await
            {
                Ok(guard) => return Ok(guard),
                Err(_) if attempt < self.config.retries => {
                    attempt += 1;
                    tracing::debug!(
                        entity = self.entity,
                        attempt,
                        "lock contended, backing off"
                    );
                    tokio::time::sleep(self.config.backoff).await;
                }
                Err(_) => {
                    tracing::warn!(
                        entity = self.entity,
                        "lock acquisition timed out"
                    );
                    return Err(StoreError::LockContended {
                        entity: self.entity,
                    });
                }
            }
        }
    }
}
