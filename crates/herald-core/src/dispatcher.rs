use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use herald_types::delivery::{BroadcastReport, FailureTally, JobStatus};
use herald_types::models::{Draft, MessageHandle, UserId};

use crate::delivery::DeliveryClient;
use crate::directory::RecipientDirectory;
use crate::error::DispatchError;
use crate::rate::RateGate;

/// Rewrite the progress indicator after this many attempts.
const PROGRESS_EVERY: u64 = 100;

pub const ABORT_NOTICE: &str =
    "Broadcast aborted: the recipient list could not be read. Nothing was sent.";

/// One fan-out of a confirmed draft. Mutated only by the dispatcher.
#[derive(Debug, Clone)]
pub struct BroadcastJob {
    pub id: Uuid,
    pub draft: Draft,
    pub snapshot: Vec<UserId>,
    pub sent: u64,
    pub failed: u64,
    pub failures: FailureTally,
    pub status: JobStatus,
}

impl BroadcastJob {
    fn new(draft: Draft) -> Self {
        Self {
            id: Uuid::new_v4(),
            draft,
            snapshot: Vec::new(),
            sent: 0,
            failed: 0,
            failures: FailureTally::default(),
            status: JobStatus::Pending,
        }
    }

    pub fn owner(&self) -> UserId {
        self.draft.owner
    }

    pub fn report(&self) -> BroadcastReport {
        BroadcastReport {
            job_id: self.id,
            sent: self.sent,
            failed: self.failed,
            total: self.snapshot.len() as u64,
            failures: self.failures,
        }
    }
}

/// Runs broadcast jobs, one at a time, through a shared rate gate.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    directory: Arc<dyn RecipientDirectory>,
    delivery: Arc<dyn DeliveryClient>,

    /// Every delivery attempt, from any job, passes through here
    gate: RateGate,

    /// Set while a job holds a permit
    active: AtomicBool,
}

/// Exclusive right to run the next job. Released on drop.
pub struct JobPermit {
    inner: Arc<DispatcherInner>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.inner.active.store(false, Ordering::Release);
    }
}

impl Dispatcher {
    pub fn new(
        directory: Arc<dyn RecipientDirectory>,
        delivery: Arc<dyn DeliveryClient>,
        send_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                directory,
                delivery,
                gate: RateGate::new(send_interval),
                active: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Claim the single job slot. A second confirmation while a job is
    /// running is rejected rather than queued.
    pub fn try_reserve(&self) -> Result<JobPermit, DispatchError> {
        self.inner
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DispatchError::Busy)?;
        Ok(JobPermit {
            inner: self.inner.clone(),
        })
    }

    /// Run the job on its own task so the confirming operator is not blocked.
    pub fn spawn(&self, permit: JobPermit, draft: Draft) -> JoinHandle<BroadcastJob> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.run(permit, draft).await })
    }

    /// Snapshot the directory, fan the draft out to every id in it and report
    /// the outcome to the draft's owner.
    pub async fn run(&self, permit: JobPermit, draft: Draft) -> BroadcastJob {
        let mut job = BroadcastJob::new(draft);
        let owner = job.owner();
        info!("Broadcast {} confirmed by operator {}", job.id, owner);

        // Re-read on every run: a rerun after an abort never reuses an old list
        job.snapshot = match self.inner.directory.list().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Broadcast {} aborted, snapshot unavailable: {:#}", job.id, e);
                job.status = JobStatus::Aborted;
                self.notify(owner, ABORT_NOTICE).await;
                drop(permit);
                return job;
            }
        };

        job.status = JobStatus::Running;
        let total = job.snapshot.len();
        info!("Broadcast {} running for {} recipients", job.id, total);

        let indicator = self.notify(owner, &starting_text(total)).await;

        let content = job.draft.content;
        for idx in 0..total {
            let recipient = job.snapshot[idx];
            self.inner.gate.acquire().await;

            match self.inner.delivery.copy_content(recipient, content).await {
                Ok(()) => job.sent += 1,
                Err(failure) => {
                    debug!("Broadcast {}: delivery to {} failed: {}", job.id, recipient, failure);
                    job.failed += 1;
                    job.failures.record(&failure);
                }
            }

            let attempted = job.sent + job.failed;
            if attempted % PROGRESS_EVERY == 0 && (attempted as usize) < total {
                if let Some(handle) = indicator {
                    self.render(handle, &progress_text(attempted, total)).await;
                }
            }
        }

        job.status = JobStatus::Completed;
        let report = job.report();
        info!(
            "Broadcast {} completed: sent {}, failed {}, total {}",
            job.id, report.sent, report.failed, report.total
        );
        if report.failed > 0 {
            warn!(
                "Broadcast {} failures: blocked {}, deactivated {}, rate limited {}, transport {}",
                job.id,
                report.failures.blocked,
                report.failures.deactivated,
                report.failures.rate_limited,
                report.failures.transport
            );
        }

        self.notify(owner, &report.render()).await;

        if let Some(handle) = indicator {
            if let Err(e) = self.inner.delivery.delete_message(handle).await {
                debug!("Could not remove progress indicator: {}", e);
            }
        }

        drop(permit);
        job
    }

    async fn notify(&self, operator: UserId, text: &str) -> Option<MessageHandle> {
        match self.inner.delivery.send_text(operator, text).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Could not notify operator {}: {}", operator, e);
                None
            }
        }
    }

    async fn render(&self, handle: MessageHandle, text: &str) {
        if let Err(e) = self.inner.delivery.edit_text(handle, text, &[]).await {
            debug!("Progress update skipped: {}", e);
        }
    }
}

fn starting_text(total: usize) -> String {
    format!("Broadcast starting... (Total: {})", total)
}

fn progress_text(attempted: u64, total: usize) -> String {
    format!("Broadcasting... {}/{}", attempted, total)
}
