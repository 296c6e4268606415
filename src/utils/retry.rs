//! Retry utilities with exponential backoff for transient PubChem failures.

use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::client::{ErrorKind, PubChemError, TransportError};
use crate::config::RetrySettings;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Attempts for busy and timeout failures
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum total time to spend on one operation, including delays
    pub max_total_time: Duration,
    /// Attempts for generic server errors and transport failures
    pub server_error_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier: settings.backoff_multiplier.max(1.0),
            max_total_time: Duration::from_secs(settings.max_total_time_secs),
            server_error_attempts: settings.server_error_attempts.max(1),
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            server_error_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powf(attempt.saturating_sub(1) as f64);
        Duration::from_secs_f64(exp_delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Transient failure classes that should trigger a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    /// Server busy (503 with a busy fault, or 429)
    ServerBusy,
    /// Gateway or request timeout
    Timeout,
    /// Generic server error or transport failure
    ServerError,
}

impl TransientError {
    /// Check if an error represents a transient failure
    pub fn from_error(err: &PubChemError) -> Option<Self> {
        match err.kind()? {
            ErrorKind::ServerBusy => Some(TransientError::ServerBusy),
            ErrorKind::Timeout => Some(TransientError::Timeout),
            ErrorKind::ServerError => Some(TransientError::ServerError),
            _ => None,
        }
    }

    /// Total attempts allowed for this class
    pub fn attempt_budget(&self, config: &RetryConfig) -> u32 {
        match self {
            TransientError::ServerBusy | TransientError::Timeout => config.max_attempts,
            TransientError::ServerError => config.server_error_attempts,
        }
    }
}

/// Sleep for `delay` unless `cancel` fires first
pub async fn sleep_or_cancel(
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), PubChemError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(PubChemError::Cancelled),
        _ = sleep(delay) => Ok(()),
    }
}

/// Execute an async operation with retry logic
///
/// Permanent errors return immediately. When the attempt budget for a transient
/// class runs out, the last error is returned unchanged so callers see the same
/// class they would have seen without retries.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, PubChemError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, PubChemError>>,
{
    let started = Instant::now();
    let mut attempts = 0;
    let mut operation = operation;

    loop {
        attempts += 1;

        let remaining = config.max_total_time.saturating_sub(started.elapsed());
        let result = match timeout(remaining, operation()).await {
            Ok(result) => result,
            Err(_) => Err(PubChemError::Transport(TransportError::Timeout(
                "operation timed out".to_string(),
            ))),
        };

        let error = match result {
            Ok(value) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let Some(transient) = TransientError::from_error(&error) else {
            // Permanent error - return immediately
            return Err(error);
        };

        let delay = config.delay_for(attempts);
        if attempts >= transient.attempt_budget(config)
            || started.elapsed() + delay >= config.max_total_time
        {
            tracing::warn!(
                "Operation failed after {} attempts (total elapsed: {:?}): {}",
                attempts,
                started.elapsed(),
                error
            );
            return Err(error);
        }

        tracing::debug!(
            "Transient error on attempt {}: {:?}, retrying in {:?}",
            attempts,
            transient,
            delay
        );
        sleep_or_cancel(delay, cancel).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ServerFault;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fault(kind: ErrorKind, status: u16) -> PubChemError {
        PubChemError::Server(ServerFault {
            kind,
            status: Some(status),
            code: None,
            message: "test".to_string(),
            details: Vec::new(),
        })
    }

    fn quick_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_total_time: Duration::from_secs(10),
            server_error_attempts: 2,
        }
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let call_count = Rc::new(RefCell::new(0));
        let cancel = CancellationToken::new();

        let result = {
            let call_count = call_count.clone();
            with_retry(&RetryConfig::default(), &cancel, move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Ok("success")
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_busy() {
        let call_count = Rc::new(RefCell::new(0));
        let cancel = CancellationToken::new();

        let result = {
            let call_count = call_count.clone();
            with_retry(&quick_config(), &cancel, move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    if *call_count.borrow() < 3 {
                        Err(fault(ErrorKind::ServerBusy, 503))
                    } else {
                        Ok("success")
                    }
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_use_their_own_budget() {
        let call_count = Rc::new(RefCell::new(0));
        let cancel = CancellationToken::new();

        let result: Result<(), PubChemError> = {
            let call_count = call_count.clone();
            with_retry(&quick_config(), &cancel, move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(fault(ErrorKind::ServerError, 500))
                }
            })
        }
        .await;

        assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::ServerError));
        assert_eq!(*call_count.borrow(), 2);
    }

    #[tokio::test]
    async fn test_retry_returns_permanent_error() {
        let call_count = Rc::new(RefCell::new(0));
        let cancel = CancellationToken::new();

        let result: Result<&str, PubChemError> = {
            let call_count = call_count.clone();
            with_retry(&quick_config(), &cancel, move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(fault(ErrorKind::NotFound, 404))
                }
            })
        }
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let config = RetryConfig {
            initial_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(3600),
            max_total_time: Duration::from_secs(7200),
            ..quick_config()
        };

        let result: Result<(), PubChemError> =
            with_retry(&config, &cancel, || async { Err(fault(ErrorKind::ServerBusy, 503)) })
                .await;
        assert!(matches!(result, Err(PubChemError::Cancelled)));
    }

    #[test]
    fn test_delay_growth_is_capped() {
        let config = quick_config();
        assert_eq!(config.delay_for(1), Duration::from_millis(10));
        assert_eq!(config.delay_for(2), Duration::from_millis(20));
        assert_eq!(config.delay_for(10), Duration::from_millis(100));
    }

    #[test]
    fn test_transient_error_detection() {
        assert_eq!(
            TransientError::from_error(&fault(ErrorKind::ServerBusy, 503)),
            Some(TransientError::ServerBusy)
        );
        let connect = PubChemError::Transport(TransportError::Connect("refused".into()));
        assert_eq!(
            TransientError::from_error(&connect),
            Some(TransientError::ServerError)
        );
        assert_eq!(
            TransientError::from_error(&PubChemError::ResponseParse("bad".into())),
            None
        );
    }
}
