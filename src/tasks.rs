//! Periodic background tasks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::events::ListenerError;

#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;

    /// Time between runs. The first run happens right away.
    fn interval(&self) -> Duration;

    async fn execute(&self) -> Result<(), ListenerError>;
}

/// Run `task` forever on its interval. Failed runs are logged and retried on
/// the next tick.
pub fn spawn_task(task: Arc<dyn Task>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(task.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = task.execute().await {
                warn!("Task {} failed: {}", task.name(), e);
            }
        }
    })
}
