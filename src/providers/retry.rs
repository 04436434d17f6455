use std::future::Future;
use std::time::Duration;

use crate::core::errors::{AppError, AppResult};

const BACKOFF_STEP: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
}

impl CallPolicy {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
        }
    }

    /// Runs `call` under the per-call timeout, retrying transient failures
    /// with a linear backoff.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::ProviderTimeout),
            };

            match result {
                Err(err) if err.retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(call = label, attempt, error = %err, "retrying provider call");
                    tokio::time::sleep(BACKOFF_STEP * attempt).await;
                }
                other => return other,
            }
        }
    }
}
