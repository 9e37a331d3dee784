use crate::error::Result;
use crate::supervisor::is_pid_alive;
use async_trait::async_trait;
use std::time::Duration;

/// Health checker trait for runtimes
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Check if the runtime is healthy
    async fn check(&self) -> Result<bool>;

    /// Get the timeout duration
    fn timeout(&self) -> Duration;
}

/// Reports whether a recorded pid still refers to a live process.
pub struct PidChecker {
    pid: u32,
}

impl PidChecker {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }
}

#[async_trait]
impl HealthChecker for PidChecker {
    async fn check(&self) -> Result<bool> {
        Ok(is_pid_alive(self.pid))
    }

    fn timeout(&self) -> Duration {
        Duration::ZERO
    }
}
