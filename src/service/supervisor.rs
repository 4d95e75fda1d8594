use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Restarts a long-running task after a cooldown whenever it fails. Every
/// restart builds the task again, so it resumes from whatever it persisted.
#[derive(Debug, Clone)]
pub struct Supervisor {
    name: String,
    cooldown: Duration,
    max_restarts: Option<u32>,
}

impl Supervisor {
    pub fn new(name: impl Into<String>, cooldown: Duration) -> Self {
        Self { name: name.into(), cooldown, max_restarts: None }
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = Some(max_restarts);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `task` until it returns `Ok`, or until the restart budget is
    /// spent, in which case the last error is returned.
    pub async fn supervise<F, Fut>(&self, mut task: F) -> eyre::Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = eyre::Result<()>>,
    {
        let mut restarts = 0u32;
        loop {
            info!("Starting {}", self.name);
            let err = match task().await {
                Ok(()) => {
                    info!("{} finished", self.name);
                    return Ok(());
                }
                Err(e) => e,
            };

            error!("{} failed: {:#}", self.name, err);
            if self.max_restarts.is_some_and(|max| restarts >= max) {
                error!("{} exceeded {} restarts, giving up", self.name, restarts);
                return Err(err);
            }

            restarts += 1;
            warn!("Restarting {} (#{}) in {:?}", self.name, restarts, self.cooldown);
            sleep(self.cooldown).await;
        }
    }
}
