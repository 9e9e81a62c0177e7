//! Due-reminder sweep — finds queued reminders and delivers their emails.
//!
//! Each sweep transitions every due item at most once, to `sent` or to
//! `failed`. Failed items stay in the due set and are retried on every
//! following sweep until they succeed or are deleted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{DatabaseError, DeliveryError};
use crate::mailer::{Mailer, OutboundEmail};
use crate::reminders::model::{EmailStatus, Reminder};
use crate::store::Database;

/// Outcome counters for one sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub found: usize,
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    pub swept_at: DateTime<Utc>,
}

/// Process-wide spacing gate for the on-demand sweep trigger.
///
/// The scheduled ticker is NOT gated; only manual triggers pass through
/// here. State is a single last-acquired instant, shared via `Arc`.
pub struct SweepGate {
    min_spacing: Duration,
    last_run: Mutex<Option<tokio::time::Instant>>,
}

impl SweepGate {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_run: Mutex::new(None),
        }
    }

    /// Try to take the gate. On success the last-run marker advances;
    /// on refusal returns the seconds left until the next allowed run.
    pub async fn try_acquire(&self) -> Result<(), u64> {
        let mut last = self.last_run.lock().await;
        let now = tokio::time::Instant::now();
        if let Some(prev) = *last {
            let elapsed = now.duration_since(prev);
            if elapsed < self.min_spacing {
                let remaining = self.min_spacing - elapsed;
                return Err(remaining.as_secs().max(1));
            }
        }
        *last = Some(now);
        Ok(())
    }
}

/// Runs sweeps against the store, delivering through the mailer.
pub struct Dispatcher {
    store: Arc<dyn Database>,
    mailer: Arc<dyn Mailer>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Database>, mailer: Arc<dyn Mailer>, send_timeout: Duration) -> Self {
        Self {
            store,
            mailer,
            send_timeout,
        }
    }

    /// One sweep: load due reminders, attempt delivery for each, record the
    /// outcome per item. Individual failures are absorbed; only a failure
    /// before iteration starts (the due query itself) aborts.
    pub async fn run_due_sweep(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<SweepSummary, DatabaseError> {
        let due = self.store.find_due_reminders(now, limit).await?;
        let found = due.len();
        let mut sent = 0usize;
        let mut failed = 0usize;

        for mut reminder in due {
            match self.deliver(&reminder).await {
                Ok(()) => {
                    reminder.sent = true;
                    reminder.sent_at = Some(now);
                    reminder.email_status = EmailStatus::Sent;
                    reminder.last_error = None;
                    sent += 1;
                    info!(reminder_id = %reminder.id, "Reminder email sent");
                }
                Err(e) => {
                    reminder.email_status = EmailStatus::Failed;
                    reminder.last_error = Some(e.to_string());
                    failed += 1;
                    warn!(reminder_id = %reminder.id, error = %e, "Reminder delivery failed");
                }
            }
            reminder.updated_at = now;
            if let Err(e) = self.store.update_reminder(&reminder).await {
                error!(reminder_id = %reminder.id, error = %e, "Failed to record sweep outcome");
            }
        }

        let summary = SweepSummary {
            found,
            attempted: found,
            sent,
            failed,
            swept_at: now,
        };
        if found > 0 {
            info!(
                found = summary.found,
                sent = summary.sent,
                failed = summary.failed,
                "Sweep complete"
            );
        }
        Ok(summary)
    }

    async fn deliver(&self, reminder: &Reminder) -> Result<(), DeliveryError> {
        let to = reminder
            .target_email
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(DeliveryError::MissingTarget)?;

        let email = OutboundEmail {
            to: to.to_string(),
            subject: reminder.effective_subject().to_string(),
            body: reminder.effective_body().to_string(),
        };

        match tokio::time::timeout(self.send_timeout, self.mailer.send(&email)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout {
                seconds: self.send_timeout.as_secs(),
            }),
        }
    }
}

/// Spawn the background ticker that sweeps on a fixed interval.
///
/// The first tick fires after one full interval, not at startup. Sweep
/// errors are logged and the ticker keeps going.
pub fn spawn_sweep_ticker(
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    limit: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Consume the immediate first tick.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = dispatcher.run_due_sweep(Utc::now(), limit).await {
                error!(error = %e, "Scheduled sweep failed");
            }
        }
    })
}
