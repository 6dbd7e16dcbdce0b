//! Write worker: the single consumer of the write queue.
//!
//! Per job: apply the lifecycle rules, record every resulting
//! notification, answer the requester, then deliver the traps. Nothing
//! from the next job starts before all of this is done.

use crate::dispatcher::{record_notification, NotificationDispatcher};
use crate::job::{JobOutcome, JobRequest, WriteJob};
use crate::lifecycle::{self, Applied};
use crate::queue::WorkQueue;
use crate::{FmError, FmResult};
use fm_database::FmSession;
use fm_trap::TrapCategory;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct WriteWorker {
    session: FmSession,
    queue: Arc<WorkQueue<WriteJob>>,
    dispatcher: Arc<NotificationDispatcher>,
    poll_interval: Duration,
}

impl WriteWorker {
    pub fn new(
        session: FmSession,
        queue: Arc<WorkQueue<WriteJob>>,
        dispatcher: Arc<NotificationDispatcher>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            session,
            queue,
            dispatcher,
            poll_interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(poll_ms = self.poll_interval.as_millis() as u64, "Write worker started");
            loop {
                while let Some(job) = self.queue.pop() {
                    self.process(job).await;
                }
                self.queue.wait(self.poll_interval).await;
            }
        })
    }

    /// Run one queued job to completion.
    pub async fn process(&self, item: WriteJob) {
        let WriteJob { job, reply } = item;
        let kind = job.kind;

        let result = match self.apply(job).await {
            Ok(Applied {
                outcome,
                notifications,
            }) => {
                let traps = self.record(notifications).await;
                Ok((outcome, traps))
            }
            Err(e) => Err(e),
        };

        let traps = match result {
            Ok((outcome, traps)) => {
                debug!(kind = ?kind, outcome = ?outcome, "Write job applied");
                respond(reply, Ok(outcome));
                traps
            }
            Err(FmError::NotFound) => {
                debug!(kind = ?kind, "Nothing to clear");
                respond(reply, Err(FmError::NotFound));
                return;
            }
            Err(e) => {
                warn!(kind = ?kind, error = %e, "Write job failed");
                respond(reply, Err(e));
                return;
            }
        };

        for (category, job) in traps {
            self.dispatcher.send(category, &job.payload).await;
        }
    }

    async fn apply(&self, job: JobRequest) -> FmResult<Applied> {
        self.session
            .call(move |conn| Ok(lifecycle::apply(conn, job)))
            .await?
    }

    /// Store history for each notification in order; keep the ones that
    /// still need a trap.
    async fn record(&self, notifications: Vec<JobRequest>) -> Vec<(TrapCategory, JobRequest)> {
        let mut traps = Vec::with_capacity(notifications.len());
        for mut job in notifications {
            let recorded = self
                .session
                .call(move |conn| {
                    let recorded = record_notification(conn, &mut job)
                        .map(|category| category.map(|category| (category, job)));
                    Ok(recorded)
                })
                .await;

            match recorded {
                Ok(Ok(Some(trap))) => traps.push(trap),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => error!(error = %e, "Failed to record notification"),
                Err(e) => error!(error = %e, "Failed to record notification"),
            }
        }
        traps
    }
}

fn respond(
    reply: Option<tokio::sync::oneshot::Sender<FmResult<JobOutcome>>>,
    result: FmResult<JobOutcome>,
) {
    if let Some(reply) = reply {
        if reply.send(result).is_err() {
            debug!("Requester went away before the reply");
        }
    }
}
