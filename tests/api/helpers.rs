use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use waitlist_sync::configuration::BackendSettings;
use waitlist_sync::configuration::WaitlistSettings;
use waitlist_sync::partner_client::PartnerClient;
use waitlist_sync::telemetry::get_subscriber;
use waitlist_sync::telemetry::init_subscriber;
use waitlist_sync::transport::HttpTransport;
use waitlist_sync::transport::ReqwestTransport;
use waitlist_sync::transport::TransportError;
use waitlist_sync::transport::TransportResponse;
use waitlist_sync::waitlist_client::WaitlistClient;
use wiremock::MockServer;

/// Count shown before the first fetch, in every test client
pub const INITIAL_COUNT: u64 = 100;

/// Init the tracing subscriber once only.
///
/// To opt in to verbose logging, use the env var `TEST_LOG`:
///
/// ```sh
///      TEST_LOG=true cargo test [test_name] | bunyan
/// ```
static TRACING: Lazy<()> = Lazy::new(|| {
    // the two sinks are different closure types, hence the duplicated arms
    match std::env::var("TEST_LOG") {
        Ok(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::stdout);
            init_subscriber(subscriber).unwrap();
        }
        Err(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::sink);
            init_subscriber(subscriber).unwrap();
        }
    };
});

/// Clients wired to a `MockServer` standing in for the backend
pub struct TestApp {
    pub client: WaitlistClient,
    pub partners: PartnerClient,
    pub backend: MockServer,
}

pub async fn spawn_app() -> TestApp { spawn_app_with(|_| {}).await }

/// Like `spawn_app`, but `tweak` may adjust the backend settings (e.g. shorter
/// timeouts) before the clients are built
pub async fn spawn_app_with(tweak: impl FnOnce(&mut BackendSettings)) -> TestApp {
    Lazy::force(&TRACING);

    let backend = MockServer::start().await;
    let mut backend_cfg = BackendSettings {
        base_url: Some(backend.uri()),
        ..BackendSettings::default()
    };
    tweak(&mut backend_cfg);

    let transport = Arc::new(ReqwestTransport::new());
    let client = WaitlistClient::new(backend_cfg.clone(), waitlist_settings(), transport.clone());
    let partners = PartnerClient::new(backend_cfg, transport);

    TestApp {
        client,
        partners,
        backend,
    }
}

fn waitlist_settings() -> WaitlistSettings {
    WaitlistSettings {
        initial_count: INITIAL_COUNT,
        ..WaitlistSettings::default()
    }
}

/// How a `ScriptedTransport` answers
#[derive(Clone, Debug)]
pub enum Reply {
    Json(u16, serde_json::Value),
    /// Answer, but only after the given (tokio) time has passed
    After(Duration, u16, serde_json::Value),
    /// Never answer
    Hang,
    /// Fail immediately, as if the connection was refused
    Refuse,
}

/// In-memory backend with canned replies and request counters. Pair with
/// `#[tokio::test(start_paused = true)]` to test timers without waiting for
/// them.
pub struct ScriptedTransport {
    post: Reply,
    get: Reply,
    posts: AtomicUsize,
    gets: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(
        post: Reply,
        get: Reply,
    ) -> Arc<Self> {
        Arc::new(Self {
            post,
            get,
            posts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        })
    }

    /// Number of POSTs received so far
    pub fn posts(&self) -> usize { self.posts.load(Ordering::SeqCst) }

    /// Number of GETs received so far
    pub fn gets(&self) -> usize { self.gets.load(Ordering::SeqCst) }
}

async fn play(reply: &Reply) -> Result<TransportResponse, TransportError> {
    match reply {
        Reply::Json(status, body) => Ok(TransportResponse::new(*status, body.to_string())),
        Reply::After(delay, status, body) => {
            tokio::time::sleep(*delay).await;
            Ok(TransportResponse::new(*status, body.to_string()))
        }
        Reply::Hang => std::future::pending().await,
        Reply::Refuse => Err(TransportError::Unreachable(anyhow::anyhow!(
            "connection refused"
        ))),
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(
        &self,
        _url: &str,
        _body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        play(&self.post).await
    }

    async fn get_fresh(
        &self,
        _url: &str,
        _query: &[(&str, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        play(&self.get).await
    }
}

/// A client talking to `transport`, with default timings (15s submit, 10s
/// fetch, 10s polling, 1s reconcile delay)
pub fn scripted_client(transport: Arc<ScriptedTransport>) -> WaitlistClient {
    Lazy::force(&TRACING);
    let backend = BackendSettings {
        base_url: Some("http://backend.test".to_string()),
        ..BackendSettings::default()
    };
    WaitlistClient::new(backend, waitlist_settings(), transport)
}

/// `{"success": true, "total_subscribers": total}`
pub fn joined(total: u64) -> Reply { Reply::Json(200, serde_json::json!({"success": true, "total_subscribers": total})) }

/// `{"count": count}`
pub fn count_of(count: u64) -> Reply { Reply::Json(200, serde_json::json!({ "count": count })) }
