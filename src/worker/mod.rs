//! Asynchronous email dispatch. Invitation handlers enqueue a job and return
//! immediately; a background task drains the channel and retries failed sends
//! a few times before dropping the job. Delivery failures never propagate to
//! the HTTP caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::services::mailer::Mailer;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct EmailJob {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
pub struct EmailQueue {
    tx: mpsc::UnboundedSender<EmailJob>,
}

impl EmailQueue {
    /// Fire-and-forget. A closed channel is logged, not surfaced.
    pub fn enqueue(&self, job: EmailJob) {
        if let Err(err) = self.tx.send(job) {
            error!("email queue closed, dropping mail to {}", err.0.to);
        }
    }
}

pub fn start_email_worker(mailer: Arc<dyn Mailer>) -> EmailQueue {
    let (tx, mut rx) = mpsc::unbounded_channel::<EmailJob>();

    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            deliver_with_retry(mailer.as_ref(), job).await;
        }
    });

    EmailQueue { tx }
}

async fn deliver_with_retry(mailer: &dyn Mailer, job: EmailJob) {
    for attempt in 1..=MAX_ATTEMPTS {
        match mailer.send_email(&job.to, &job.subject, &job.body).await {
            Ok(()) => {
                info!(to = %job.to, "email delivered");
                return;
            }
            Err(err) if attempt < MAX_ATTEMPTS => {
                warn!(to = %job.to, attempt, "email send failed, retrying: {}", err);
                sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64)).await;
            }
            Err(err) => {
                error!(to = %job.to, "email dropped after {} attempts: {}", MAX_ATTEMPTS, err);
            }
        }
    }
}
