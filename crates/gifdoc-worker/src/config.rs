//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Maximum concurrent decode passes per job
    pub max_decode_handles: usize,
    /// Job timeout
    pub job_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Work directory for temporary files
    pub work_dir: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_decode_handles: 2,
            job_timeout: Duration::from_secs(600),
            shutdown_timeout: Duration::from_secs(30),
            work_dir: "/tmp/gifdoc".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("GIFDOC_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            max_decode_handles: std::env::var("GIFDOC_MAX_DECODE_HANDLES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            job_timeout: Duration::from_secs(
                std::env::var("GIFDOC_JOB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("GIFDOC_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            work_dir: std::env::var("GIFDOC_WORK_DIR")
                .unwrap_or_else(|_| "/tmp/gifdoc".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.max_decode_handles, 2);
        assert_eq!(config.job_timeout, Duration::from_secs(600));
        assert_eq!(config.work_dir, "/tmp/gifdoc");
    }

    // Single test for all GIFDOC_* variables; process env is global,
    // so splitting these across tests would race under the parallel
    // test runner.
    #[test]
    fn test_from_env_overrides_and_fallbacks() {
        std::env::set_var("GIFDOC_MAX_JOBS", "4");
        std::env::set_var("GIFDOC_MAX_DECODE_HANDLES", "3");
        std::env::set_var("GIFDOC_JOB_TIMEOUT", "120");
        std::env::set_var("GIFDOC_SHUTDOWN_TIMEOUT", "not-a-number");
        std::env::set_var("GIFDOC_WORK_DIR", "/var/tmp/gifdoc-env");

        let config = WorkerConfig::from_env();
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.max_decode_handles, 3);
        assert_eq!(config.job_timeout, Duration::from_secs(120));
        // Unparseable value falls back to the default
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.work_dir, "/var/tmp/gifdoc-env");

        for key in [
            "GIFDOC_MAX_JOBS",
            "GIFDOC_MAX_DECODE_HANDLES",
            "GIFDOC_JOB_TIMEOUT",
            "GIFDOC_SHUTDOWN_TIMEOUT",
            "GIFDOC_WORK_DIR",
        ] {
            std::env::remove_var(key);
        }

        let config = WorkerConfig::from_env();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.work_dir, "/tmp/gifdoc");
    }
}
