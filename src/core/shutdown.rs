//! # Join barrier for dispatch tasks.
//!
//! Waits for every dispatch task after the shutdown token was cancelled.
//! Publishes [`EventKind::AllStoppedWithinGrace`] on success or
//! [`EventKind::GraceExceeded`] on timeout; stuck tasks are aborted so nothing
//! outlives the transport connection.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::ClientError;
use crate::events::{Bus, Event, EventKind};

/// Joins `tasks`, bounded by `grace` (`None` = no limit).
pub(crate) async fn join_with_grace(
    mut tasks: Vec<(String, JoinHandle<()>)>,
    grace: Option<Duration>,
    bus: &Bus,
) -> Result<(), ClientError> {
    let total = tasks.len();
    let done = async {
        for (_, task) in tasks.iter_mut() {
            // Handler panics are caught inside the task; a JoinError here is an abort.
            let _ = task.await;
        }
    };

    let finished = match grace {
        Some(limit) => tokio::time::timeout(limit, done).await.is_ok(),
        None => {
            done.await;
            true
        }
    };

    if finished {
        info!(tasks = total, "all dispatch tasks stopped");
        bus.publish(Event::now(EventKind::AllStoppedWithinGrace));
        return Ok(());
    }

    let grace = grace.unwrap_or_default();
    let mut stuck = Vec::new();
    for (pattern, task) in tasks {
        if !task.is_finished() {
            task.abort();
            stuck.push(pattern);
        }
    }
    error!(?grace, ?stuck, "dispatch tasks exceeded shutdown grace");
    bus.publish(
        Event::now(EventKind::GraceExceeded)
            .with_delay(grace)
            .with_reason(stuck.join(",")),
    );
    Err(ClientError::GraceExceeded { grace, stuck })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_finish_within_grace() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let tasks = vec![
            ("a".to_string(), tokio::spawn(async {})),
            ("b".to_string(), tokio::spawn(async {})),
        ];
        join_with_grace(tasks, Some(Duration::from_secs(1)), &bus)
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::AllStoppedWithinGrace);
    }

    #[tokio::test]
    async fn test_stuck_task_is_reported_and_aborted() {
        let bus = Bus::new(8);
        let stuck = tokio::spawn(std::future::pending::<()>());
        let tasks = vec![
            ("fast".to_string(), tokio::spawn(async {})),
            ("slow".to_string(), stuck),
        ];

        let err = join_with_grace(tasks, Some(Duration::from_millis(20)), &bus)
            .await
            .unwrap_err();
        match err {
            ClientError::GraceExceeded { stuck, .. } => assert_eq!(stuck, vec!["slow".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
