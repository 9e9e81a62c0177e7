//! End-to-end sweep tests: in-memory store + mock mailer, exercising the
//! full due-selection / delivery / outcome-recording cycle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use agency_portal::auth::Role;
use agency_portal::error::DeliveryError;
use agency_portal::mailer::{Mailer, OutboundEmail};
use agency_portal::reminders::dispatcher::{Dispatcher, SweepGate};
use agency_portal::reminders::model::{EmailStatus, NewReminder, Reminder};
use agency_portal::store::{Database, LibSqlBackend};

/// Mock mailer: records every send, fails for addresses on the reject list.
struct MockMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    reject: Vec<String>,
}

impl MockMailer {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject: Vec::new(),
        }
    }

    fn rejecting(address: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject: vec![address.to_string()],
        }
    }

    fn sent_to(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|e| e.to.clone()).collect()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        if self.reject.contains(&email.to) {
            return Err(DeliveryError::Send("mailbox unavailable".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

fn email_reminder(target: Option<&str>, minutes_ago: i64) -> Reminder {
    let mut r = Reminder::new(
        NewReminder {
            title: "Policy renewal".into(),
            message: "Your policy renews soon".into(),
            scheduled_time: Utc::now() - chrono::Duration::minutes(minutes_ago),
            send_email: true,
            target_email: target.map(String::from),
            email_subject: None,
            email_body: None,
            for_client: true,
            category: None,
            subcategory: None,
        },
        Uuid::new_v4(),
        Role::Employee,
    );
    // Bypass write-time validation to simulate rows that lost their target.
    r.target_email = target.map(String::from);
    r
}

async fn store() -> Arc<dyn Database> {
    Arc::new(LibSqlBackend::new_memory().await.unwrap())
}

#[tokio::test]
async fn sweep_records_mixed_outcomes() {
    let db = store().await;
    let good = email_reminder(Some("ok@example.com"), 10);
    let missing = email_reminder(None, 20);
    let bounced = email_reminder(Some("reject@example.com"), 30);
    for r in [&good, &missing, &bounced] {
        db.insert_reminder(r).await.unwrap();
    }

    let mailer = Arc::new(MockMailer::rejecting("reject@example.com"));
    let dispatcher = Dispatcher::new(Arc::clone(&db), mailer.clone(), Duration::from_secs(5));

    let summary = dispatcher.run_due_sweep(Utc::now(), 200).await.unwrap();
    assert_eq!(summary.found, 3);
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 2);

    let sent = db.get_reminder(good.id).await.unwrap().unwrap();
    assert!(sent.sent);
    assert!(sent.sent_at.is_some());
    assert_eq!(sent.email_status, EmailStatus::Sent);
    assert_eq!(sent.last_error, None);

    let no_target = db.get_reminder(missing.id).await.unwrap().unwrap();
    assert!(!no_target.sent);
    assert_eq!(no_target.email_status, EmailStatus::Failed);
    assert_eq!(no_target.last_error.as_deref(), Some("Missing targetEmail"));

    let failed = db.get_reminder(bounced.id).await.unwrap().unwrap();
    assert!(!failed.sent);
    assert_eq!(failed.email_status, EmailStatus::Failed);
    assert!(failed.last_error.as_deref().unwrap().contains("mailbox unavailable"));

    assert_eq!(mailer.sent_to(), vec!["ok@example.com".to_string()]);
}

#[tokio::test]
async fn sweep_skips_future_and_already_sent() {
    let db = store().await;

    let mut future = email_reminder(Some("later@example.com"), 0);
    future.scheduled_time = Utc::now() + chrono::Duration::hours(2);
    db.insert_reminder(&future).await.unwrap();

    let mut done = email_reminder(Some("done@example.com"), 60);
    done.sent = true;
    done.sent_at = Some(Utc::now());
    done.email_status = EmailStatus::Sent;
    db.insert_reminder(&done).await.unwrap();

    let mailer = Arc::new(MockMailer::new());
    let dispatcher = Dispatcher::new(Arc::clone(&db), mailer.clone(), Duration::from_secs(5));

    let summary = dispatcher.run_due_sweep(Utc::now(), 200).await.unwrap();
    assert_eq!(summary.found, 0);
    assert_eq!(summary.sent, 0);
    assert!(mailer.sent_to().is_empty());

    // The already-sent row must not be re-delivered or touched.
    let untouched = db.get_reminder(done.id).await.unwrap().unwrap();
    assert!(untouched.sent);
}

#[tokio::test]
async fn failed_delivery_is_retried_on_next_sweep() {
    let db = store().await;
    let r = email_reminder(Some("flaky@example.com"), 5);
    db.insert_reminder(&r).await.unwrap();

    let rejecting = Arc::new(MockMailer::rejecting("flaky@example.com"));
    let dispatcher = Dispatcher::new(Arc::clone(&db), rejecting, Duration::from_secs(5));
    let first = dispatcher.run_due_sweep(Utc::now(), 200).await.unwrap();
    assert_eq!(first.failed, 1);

    // Second sweep with a healthy mailer picks the same row back up.
    let healthy = Arc::new(MockMailer::new());
    let dispatcher = Dispatcher::new(Arc::clone(&db), healthy.clone(), Duration::from_secs(5));
    let second = dispatcher.run_due_sweep(Utc::now(), 200).await.unwrap();
    assert_eq!(second.sent, 1);

    let after = db.get_reminder(r.id).await.unwrap().unwrap();
    assert!(after.sent);
    assert_eq!(after.email_status, EmailStatus::Sent);
    assert_eq!(after.last_error, None);
}

#[tokio::test]
async fn rate_limited_trigger_runs_no_sweep() {
    let db = store().await;
    let r = email_reminder(Some("once@example.com"), 5);
    db.insert_reminder(&r).await.unwrap();

    let mailer = Arc::new(MockMailer::new());
    let dispatcher = Dispatcher::new(Arc::clone(&db), mailer.clone(), Duration::from_secs(5));
    let gate = SweepGate::new(Duration::from_secs(25));

    assert!(gate.try_acquire().await.is_ok());
    dispatcher.run_due_sweep(Utc::now(), 200).await.unwrap();
    assert_eq!(mailer.sent_to().len(), 1);

    // Second trigger inside the spacing window is refused before any work.
    let retry_after = gate.try_acquire().await.unwrap_err();
    assert!(retry_after >= 1);
    assert_eq!(mailer.sent_to().len(), 1);
}

#[tokio::test]
async fn slow_mailer_times_out_as_failure() {
    struct SlowMailer;

    #[async_trait]
    impl Mailer for SlowMailer {
        async fn send(&self, _email: &OutboundEmail) -> Result<(), DeliveryError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    let db = store().await;
    let r = email_reminder(Some("slow@example.com"), 5);
    db.insert_reminder(&r).await.unwrap();

    let dispatcher = Dispatcher::new(
        Arc::clone(&db),
        Arc::new(SlowMailer),
        Duration::from_millis(50),
    );
    let summary = dispatcher.run_due_sweep(Utc::now(), 200).await.unwrap();
    assert_eq!(summary.failed, 1);

    let after = db.get_reminder(r.id).await.unwrap().unwrap();
    assert_eq!(after.email_status, EmailStatus::Failed);
    assert!(after.last_error.as_deref().unwrap().contains("timed out"));
}
