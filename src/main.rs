use std::sync::Arc;

use waitlist_sync::configuration::get_configuration;
use waitlist_sync::telemetry::get_subscriber;
use waitlist_sync::telemetry::init_subscriber;
use waitlist_sync::transport::ReqwestTransport;
use waitlist_sync::waitlist_client::WaitlistClient;

/// Initialise telemetry, load config, start count polling and (optionally)
/// submit the email passed as the first argument. Runs until Ctrl-C.
///
/// ```sh
///     cargo run -- someone@example.com | bunyan
/// ```
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("waitlist_sync", "info", std::io::stdout);
    init_subscriber(subscriber)?;

    let cfg = get_configuration()?;
    tracing::info!(backend = cfg.backend.url(), "configuration loaded");

    let client = WaitlistClient::new(
        cfg.backend,
        cfg.waitlist,
        Arc::new(ReqwestTransport::new()),
    );
    client.start();

    if let Some(email) = std::env::args().nth(1) {
        match client.submit(&email).await {
            Ok(confirmation) => tracing::info!(
                message = confirmation.message.as_deref().unwrap_or("You're on the list!"),
                "signup confirmed"
            ),
            Err(e) => tracing::error!(
                user_message = %e.user_message(),
                state = ?e.state(),
                "signup failed"
            ),
        }
    }

    let mut count = client.subscribe_count();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            changed = count.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *count.borrow_and_update();
                tracing::info!(
                    count = current.value,
                    pending = current.pending_reconciliation,
                    "subscriber count"
                );
            }
            _ = &mut ctrl_c => break,
        }
    }

    client.stop();
    tracing::info!("waitlist client stopped");
    Ok(())
}
