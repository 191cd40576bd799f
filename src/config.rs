//! Multiplier configuration options

use crate::env;
use crate::errors::PoolResult;
use crate::multiplier::Multiplier;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const DEFAULT_WORKER_COUNT: usize = 1;
pub(crate) const DEFAULT_MULTIPLY_INTERVAL: Duration = Duration::from_secs(1);

/// The unit of work every worker invokes once
pub(crate) type WorkFn = Arc<dyn Fn() + Send + Sync>;

/// Configuration for a [`Multiplier`]
///
/// Out-of-range values are ignored rather than rejected: a zero worker
/// count or a zero interval leaves the previous value in place.
///
/// # Examples
///
/// ```
/// use esox_multiplier::MultiplierConfig;
/// use std::time::Duration;
///
/// let config = MultiplierConfig::new(|| {})
///     .with_worker_count(4)
///     .with_multiply_interval(Duration::from_millis(250))
///     .with_worker_count(0);
///
/// assert_eq!(config.worker_count(), 4);
/// assert_eq!(config.multiply_interval(), Duration::from_millis(250));
/// ```
#[derive(Clone)]
pub struct MultiplierConfig {
    pub(crate) work: WorkFn,
    pub(crate) worker_count: usize,
    pub(crate) multiply_interval: Duration,
}

impl MultiplierConfig {
    /// Create a configuration for `work` with one worker and a one second interval
    pub fn new<F>(work: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            work: Arc::new(work),
            worker_count: DEFAULT_WORKER_COUNT,
            multiply_interval: DEFAULT_MULTIPLY_INTERVAL,
        }
    }

    /// Create a configuration from `{PREFIX}_WORKER_COUNT` and `{PREFIX}_MULTIPLY_INTERVAL`
    ///
    /// Unset, unparsable and non-positive values keep the defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_multiplier::MultiplierConfig;
    /// use std::time::Duration;
    ///
    /// let config = MultiplierConfig::from_env(|| {}, "ESOX_DOC_UNSET_PREFIX");
    /// assert_eq!(config.worker_count(), 1);
    /// assert_eq!(config.multiply_interval(), Duration::from_secs(1));
    /// ```
    pub fn from_env<F>(work: F, prefix: &str) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut config = Self::new(work);

        let count = env::get(&format!("{}_WORKER_COUNT", prefix)).as_integer_or(0);
        if let Ok(count) = usize::try_from(count) {
            config = config.with_worker_count(count);
        }

        if let Ok(interval) = env::get(&format!("{}_MULTIPLY_INTERVAL", prefix)).as_duration() {
            config = config.with_multiply_interval(interval);
        }

        config
    }

    /// Set the number of concurrently running workers
    pub fn with_worker_count(mut self, count: usize) -> Self {
        if count > 0 {
            self.worker_count = count;
        }
        self
    }

    /// Set how often missing workers are relaunched
    pub fn with_multiply_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.multiply_interval = interval;
        }
        self
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn multiply_interval(&self) -> Duration {
        self.multiply_interval
    }

    /// Start the multiplier
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the maintenance thread. Use
    /// [`try_run`](Self::try_run) to handle that case.
    pub fn run(self) -> Multiplier {
        match Multiplier::start(self) {
            Ok(multiplier) => multiplier,
            Err(err) => panic!("failed to start multiplier: {}", err),
        }
    }

    /// Start the multiplier, reporting a failure to spawn its maintenance thread
    pub fn try_run(self) -> PoolResult<Multiplier> {
        Multiplier::start(self)
    }
}

impl fmt::Debug for MultiplierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiplierConfig")
            .field("worker_count", &self.worker_count)
            .field("multiply_interval", &self.multiply_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MultiplierConfig::new(|| {});

        assert_eq!(config.worker_count(), 1);
        assert_eq!(config.multiply_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_non_positive_values_are_ignored() {
        let config = MultiplierConfig::new(|| {})
            .with_worker_count(3)
            .with_multiply_interval(Duration::from_millis(20))
            .with_worker_count(0)
            .with_multiply_interval(Duration::ZERO);

        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.multiply_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_from_env() {
        // SAFETY: the keys are unique to this test; std serialises concurrent
        // environment reads and writes from other tests behind its env lock
        unsafe {
            std::env::set_var("ESOX_CONFIG_TEST_WORKER_COUNT", "6");
            std::env::set_var("ESOX_CONFIG_TEST_MULTIPLY_INTERVAL", "150ms");
        }

        let config = MultiplierConfig::from_env(|| {}, "ESOX_CONFIG_TEST");

        assert_eq!(config.worker_count(), 6);
        assert_eq!(config.multiply_interval(), Duration::from_millis(150));
    }

    #[test]
    fn test_from_env_rejects_invalid_values() {
        // SAFETY: the keys are unique to this test; std serialises concurrent
        // environment reads and writes from other tests behind its env lock
        unsafe {
            std::env::set_var("ESOX_CONFIG_BAD_WORKER_COUNT", "-2");
            std::env::set_var("ESOX_CONFIG_BAD_MULTIPLY_INTERVAL", "soon");
        }

        let config = MultiplierConfig::from_env(|| {}, "ESOX_CONFIG_BAD");

        assert_eq!(config.worker_count(), DEFAULT_WORKER_COUNT);
        assert_eq!(config.multiply_interval(), DEFAULT_MULTIPLY_INTERVAL);
    }

    #[test]
    fn test_debug_omits_work() {
        let rendered = format!("{:?}", MultiplierConfig::new(|| {}).with_worker_count(2));

        assert!(rendered.contains("worker_count: 2"));
        assert!(rendered.contains(".."));
    }
}
