use std::sync::Arc;
use std::sync::Weak;

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::configuration::BackendSettings;
use crate::configuration::WaitlistSettings;
use crate::count::CountBody;
use crate::count::CountError;
use crate::count::Health;
use crate::count::WaitlistCount;
use crate::domain::SubscriberEmail;
use crate::domain::ValidationError;
use crate::submission::accept;
use crate::submission::Submission;
use crate::submission::SubmissionError;
use crate::submission::SubmissionState;
use crate::transport::with_timeout;
use crate::transport::HttpTransport;
use crate::transport::TransportResponse;

/// What the backend said when it accepted a signup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// e.g. "Welcome back! You're already on our waitlist."
    pub message: Option<String>,
    pub total_subscribers: Option<u64>,
}

/// Owns one signup form and the displayed subscriber count.
///
/// Cheap to clone; clones share the same form, count and background tasks.
/// `start` must be called from within a tokio runtime. Once `stop`ped, the
/// client issues no further count requests and cannot be restarted.
#[derive(Clone)]
pub struct WaitlistClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn HttpTransport>,
    backend: BackendSettings,
    settings: WaitlistSettings,
    count: watch::Sender<WaitlistCount>,
    signup: Submission<String>,
    shutdown: CancellationToken,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl WaitlistClient {
    pub fn new(
        backend: BackendSettings,
        settings: WaitlistSettings,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let (count, _) = watch::channel(WaitlistCount::placeholder(settings.initial_count));
        Self {
            inner: Arc::new(Inner {
                transport,
                backend,
                settings,
                count,
                signup: Submission::new(),
                shutdown: CancellationToken::new(),
                poller: Mutex::new(None),
            }),
        }
    }

    /// Check an email without submitting it. Never touches the network.
    pub fn validate(raw_email: &str) -> Result<SubscriberEmail, ValidationError> {
        SubscriberEmail::parse(raw_email)
    }

    /// The email currently in the form (cleared after a successful signup)
    pub fn input(&self) -> String { self.inner.signup.input() }

    /// Record a user edit of the email field; a resolved attempt goes back to
    /// `Idle`.
    pub fn edit_input(
        &self,
        raw_email: &str,
    ) {
        self.inner.signup.edit(raw_email.to_string());
    }

    pub fn state(&self) -> SubmissionState { self.inner.signup.state() }

    /// Lets the caller disable its submit trigger
    pub fn is_submitting(&self) -> bool { self.inner.signup.is_in_flight() }

    pub fn count(&self) -> WaitlistCount { *self.inner.count.borrow() }

    /// Yields every change of the displayed count
    pub fn subscribe_count(&self) -> watch::Receiver<WaitlistCount> { self.inner.count.subscribe() }

    /// Validate `raw_email` and post it to `/api/waitlist/join`.
    ///
    /// Resolves to `Ok` only when the backend explicitly confirmed the signup.
    /// On success the form is cleared, the count is updated (to the reported
    /// total, or +1 if none was reported) and one extra count fetch is
    /// scheduled to pick up propagation lag. On failure the typed email stays
    /// in the form. Nothing is retried automatically.
    #[tracing::instrument(
        name = "Joining waitlist",
        skip(self, raw_email),
        fields(subscriber_email = tracing::field::Empty)
    )]
    pub async fn submit(
        &self,
        raw_email: &str,
    ) -> Result<Confirmation, SubmissionError> {
        let inner = &self.inner;
        let result = inner
            .signup
            .run(raw_email.to_string(), |raw| async move {
                let email = Self::validate(&raw)?;
                tracing::Span::current().record("subscriber_email", tracing::field::display(&email));

                let body = json!({
                    "name": inner.settings.display_name,
                    "email": email.as_ref(),
                });
                let url = inner.backend.endpoint("/api/waitlist/join");
                let response = with_timeout(
                    inner.backend.submit_timeout(),
                    inner.transport.post_json(&url, &body),
                )
                .await;
                let envelope = accept(response)?;

                match envelope.total_subscribers {
                    Some(total) => {
                        inner.count.send_replace(WaitlistCount::confirmed(total));
                    }
                    None => {
                        inner.count.send_modify(|c| *c = c.optimistic_increment());
                    }
                }
                Ok(Confirmation {
                    message: envelope.message,
                    total_subscribers: envelope.total_subscribers,
                })
            })
            .await;

        match &result {
            Ok(_) => {
                tracing::info!("joined waitlist");
                self.schedule_reconcile();
            }
            Err(SubmissionError::Validation(_)) | Err(SubmissionError::InFlight) => {
                tracing::debug!("submission not sent")
            }
            Err(e) => tracing::warn!(
                e.cause_chain=?e,
                "failed to join waitlist"
            ),
        }
        result
    }

    /// Fetch the authoritative count and overwrite the displayed one with it.
    ///
    /// On failure the displayed count is left as it was. Concurrent calls are
    /// fine: whichever resolves last wins.
    pub async fn fetch_count(&self) -> Result<WaitlistCount, CountError> { self.inner.fetch_count().await }

    /// Probe `/api/health`. Informational only; never touches the count.
    #[tracing::instrument(name = "Checking backend health", skip(self))]
    pub async fn health(&self) -> Result<Health, CountError> {
        let url = self.inner.backend.endpoint("/api/health");
        let response = with_timeout(
            self.inner.backend.fetch_timeout(),
            self.inner.transport.get_fresh(&url, &cache_buster()),
        )
        .await?;
        ok_json(&response)
    }

    /// Fetch the count now, then every `poll_interval` until `stop`. Calling
    /// `start` on a running client does nothing.
    pub fn start(&self) {
        if self.inner.shutdown.is_cancelled() {
            tracing::warn!("start called on a stopped waitlist client");
            return;
        }
        let mut poller = self.inner.poller.lock();
        if poller.is_some() {
            return;
        }
        let every = self.inner.settings.poll_interval();
        let inner = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();

        *poller = Some(tokio::spawn(async move {
            // first tick completes immediately
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(client) = inner.upgrade() else {
                    break;
                };
                // failures were already logged; the count just stays as it was
                let _ = client.fetch_count().await;
            }
            tracing::debug!("count polling stopped");
        }));
    }

    /// Tear down: cancel polling and any pending reconcile fetch. Requests
    /// still outstanding are dropped.
    pub fn stop(&self) {
        self.inner.shutdown.cancel();
        if let Some(handle) = self.inner.poller.lock().take() {
            handle.abort();
        }
    }

    /// One extra fetch, `reconcile_delay` from now, independent of polling
    fn schedule_reconcile(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        let delay = self.inner.settings.reconcile_delay();
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if let Some(inner) = inner.upgrade() {
                let _ = inner.fetch_count().await;
            }
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) { self.shutdown.cancel(); }
}

impl Inner {
    #[tracing::instrument(name = "Fetching subscriber count", skip(self))]
    async fn fetch_count(&self) -> Result<WaitlistCount, CountError> {
        if self.shutdown.is_cancelled() {
            return Err(CountError::Stopped);
        }
        let url = self.backend.endpoint("/api/waitlist/count");
        let query = cache_buster();
        let request = with_timeout(
            self.backend.fetch_timeout(),
            self.transport.get_fresh(&url, &query),
        );
        let result = tokio::select! {
            _ = self.shutdown.cancelled() => Err(CountError::Stopped),
            response = request => response
                .map_err(CountError::from)
                .and_then(|r| ok_json::<CountBody>(&r)),
        };

        match result {
            Ok(body) => {
                let count = WaitlistCount::confirmed(body.count);
                self.count.send_replace(count);
                tracing::debug!(count = body.count, "count reconciled");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(error.message = %e, "could not fetch subscriber count");
                Err(e)
            }
        }
    }
}

/// Query parameters that make every count request unique, so no cache in
/// between can answer it
fn cache_buster() -> [(&'static str, String); 2] {
    [
        ("_t", Utc::now().timestamp_millis().to_string()),
        ("r", rand::thread_rng().gen::<u32>().to_string()),
    ]
}

fn ok_json<T: serde::de::DeserializeOwned>(response: &TransportResponse) -> Result<T, CountError> {
    if !response.is_success() {
        return Err(CountError::Status(response.status));
    }
    Ok(response.json()?)
}
