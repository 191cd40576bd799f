//! Health monitoring for multipliers

/// Share of panicking invocations above which a multiplier is reported unhealthy
const PANIC_RATE_THRESHOLD: f64 = 0.5;

/// Health status of a multiplier
///
/// Being briefly understaffed is normal between maintenance passes, so it
/// only produces a warning.
///
/// # Examples
///
/// ```
/// use esox_multiplier::HealthStatus;
///
/// let health = HealthStatus::new(2, 4, true, 10, 1);
/// assert!(health.is_healthy());
/// assert_eq!(health.staffing, 0.5);
/// assert_eq!(health.warning_count, 1);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the multiplier is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Live workers relative to the target (0.0 to 1.0)
    pub staffing: f64,

    /// Share of launched workers that panicked (0.0 to 1.0)
    pub panic_rate: f64,

    /// Workers currently running the work function
    pub live_workers: usize,

    /// Number of workers the multiplier keeps alive
    pub target_workers: usize,

    /// Whether the multiplier is still topping up workers
    pub running: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(live: usize, target: usize, running: bool, launched: usize, panicked: usize) -> Self {
        let staffing = if target > 0 {
            (live as f64 / target as f64).min(1.0)
        } else {
            0.0
        };
        let panic_rate = if launched > 0 {
            panicked as f64 / launched as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if !running {
            warnings.push("Multiplier is stopped".to_string());
            is_healthy = false;
        } else if live < target {
            warnings.push(format!("Understaffed: {} of {} workers live", live, target));
        }

        if panic_rate > PANIC_RATE_THRESHOLD {
            warnings.push(format!("High panic rate: {:.1}%", panic_rate * 100.0));
            is_healthy = false;
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            staffing,
            panic_rate,
            live_workers: live,
            target_workers: target,
            running,
            warnings,
        }
    }

    /// Check if the multiplier is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
