//! Background sweeps, each a simple batch-query-and-write job on a fixed
//! interval: due reminders, events starting soon, and post-event feedback
//! requests. A failed pass is logged and retried on the next tick.

pub mod feedback;
pub mod reminders;
pub mod upcoming;

use std::future::Future;
use std::time::Duration;

use mongodb::Database;
use tracing::{info, warn};

use crate::push::PushClient;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

pub fn spawn_all(db: Database, push: PushClient) {
    {
        let db = db.clone();
        let push = push.clone();
        spawn_sweep("reminders", MINUTE, move || {
            let db = db.clone();
            let push = push.clone();
            async move { reminders::sweep(&db, &push).await }
        });
    }
    {
        let db = db.clone();
        spawn_sweep("upcoming_events", MINUTE, move || {
            let db = db.clone();
            let push = push.clone();
            async move { upcoming::sweep(&db, &push).await }
        });
    }
    spawn_sweep("feedback_requests", HOUR, move || {
        let db = db.clone();
        async move { feedback::sweep(&db).await }
    });
}

fn spawn_sweep<F, Fut>(name: &'static str, period: Duration, run: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<u64>> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match run().await {
                Ok(0) => {}
                Ok(processed) => info!(sweep = name, processed, "sweep completed"),
                Err(err) => warn!(sweep = name, error = %err, "sweep failed"),
            }
        }
    });
}
