use std::time::Duration;

use claims::assert_err;
use claims::assert_ok;
use serde_json::json;
use waitlist_sync::submission::SubmissionError;
use waitlist_sync::submission::SubmissionState;
use waitlist_sync::submission::GENERIC_REJECTION;
use waitlist_sync::waitlist_client::WaitlistClient;
use wiremock::matchers::any;
use wiremock::matchers::body_json;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use crate::helpers::spawn_app;
use crate::helpers::spawn_app_with;
use crate::helpers::INITIAL_COUNT;

fn join() -> wiremock::MockBuilder { Mock::given(method("POST")).and(path("/api/waitlist/join")) }

#[tokio::test]
async fn join_ok() {
    let app = spawn_app().await;

    join()
        .and(body_json(json!({
            "name": "Website Subscriber",
            "email": "user@example.com",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Welcome to the future of pain management!",
            "total_subscribers": 185,
        })))
        .expect(1)
        .mount(&app.backend)
        .await;

    let confirmation = assert_ok!(app.client.submit("user@example.com").await);

    assert_eq!(confirmation.total_subscribers, Some(185));
    assert_eq!(app.client.state(), SubmissionState::Succeeded);
    assert_eq!(app.client.count().value, 185);
    assert!(!app.client.count().pending_reconciliation);
    assert!(app.client.count().last_fetched_at.is_some());
    assert_eq!(app.client.input(), "");
}

#[tokio::test]
async fn email_normalised_before_sending() {
    let app = spawn_app().await;

    join()
        .and(body_json(json!({
            "name": "Website Subscriber",
            "email": "user@example.com",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&app.backend)
        .await;

    assert_ok!(app.client.submit("  User@Example.COM ").await);
}

#[tokio::test]
async fn existing_subscriber_message_passed_through() {
    let app = spawn_app().await;

    join()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Welcome back! You're already on our waitlist.",
            "total_subscribers": 185,
        })))
        .mount(&app.backend)
        .await;

    let confirmation = assert_ok!(app.client.submit("user@example.com").await);
    assert_eq!(
        confirmation.message.as_deref(),
        Some("Welcome back! You're already on our waitlist.")
    );
}

#[tokio::test]
async fn success_without_total_bumps_count_by_one() {
    let app = spawn_app().await;

    join()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&app.backend)
        .await;

    assert_ok!(app.client.submit("user@example.com").await);
    let count = app.client.count();
    assert_eq!(count.value, INITIAL_COUNT + 1);
    assert!(count.pending_reconciliation);
}

#[tokio::test]
async fn invalid_email_never_sent() {
    let app = spawn_app().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.backend)
        .await;

    for (email, msg) in [
        ("not-an-email", "no at"),
        ("", "empty"),
        ("john@foo", "no tld"),
        ("john doe@foo.com", "whitespace"),
    ] {
        let e = assert_err!(app.client.submit(email).await);
        assert!(
            matches!(e, SubmissionError::Validation(_)),
            "{msg}: {e:?}"
        );
        assert_eq!(app.client.state(), SubmissionState::FailedValidation, "{msg}");
        assert_eq!(app.client.input(), email, "{msg}");
    }
    assert_eq!(app.client.count().value, INITIAL_COUNT);
}

#[tokio::test]
async fn validate_is_offline() {
    let app = spawn_app().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.backend)
        .await;

    let email = assert_ok!(WaitlistClient::validate("  User@Example.COM "));
    assert_eq!(email.as_ref(), "user@example.com");
    assert_err!(WaitlistClient::validate("user@example"));

    // checking does not touch the form
    assert_eq!(app.client.state(), SubmissionState::Idle);
    assert_eq!(app.client.input(), "");
}

#[tokio::test]
async fn explicit_failure_is_not_success() {
    let app = spawn_app().await;

    join()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "message": "m"})))
        .expect(1)
        .mount(&app.backend)
        .await;

    match assert_err!(app.client.submit("user@example.com").await) {
        SubmissionError::Rejected(message) => assert_eq!(message, "m"),
        e => panic!("expected rejection, got {e:?}"),
    }
    assert_eq!(app.client.state(), SubmissionState::FailedRejected);
    assert_eq!(app.client.input(), "user@example.com");
    assert_eq!(app.client.count().value, INITIAL_COUNT);
}

#[tokio::test]
async fn failure_without_message_gets_fallback() {
    let app = spawn_app().await;

    join()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .mount(&app.backend)
        .await;

    let e = assert_err!(app.client.submit("user@example.com").await);
    assert_eq!(e.user_message(), GENERIC_REJECTION);
}

#[tokio::test]
async fn error_status_is_network_failure() {
    let app = spawn_app().await;

    for status in [400, 422, 500, 503] {
        let _mock = join()
            // a body claiming success must not be trusted on a non-2xx
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"success": true})))
            .expect(1)
            .mount_as_scoped(&app.backend)
            .await;

        let e = assert_err!(app.client.submit("user@example.com").await);
        assert!(matches!(e, SubmissionError::Network(_)), "{status}: {e:?}");
        assert_eq!(app.client.state(), SubmissionState::FailedNetwork);
        assert_eq!(app.client.input(), "user@example.com");
    }
    assert_eq!(app.client.count().value, INITIAL_COUNT);
}

#[tokio::test]
async fn unparseable_body_is_network_failure() {
    let app = spawn_app().await;

    join()
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&app.backend)
        .await;

    let e = assert_err!(app.client.submit("user@example.com").await);
    assert_eq!(e.state(), SubmissionState::FailedNetwork);
}

#[tokio::test]
async fn slow_backend_times_out() {
    let app = spawn_app_with(|b| b.submit_timeout_milliseconds = 200).await;

    join()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "total_subscribers": 185}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&app.backend)
        .await;

    let e = assert_err!(app.client.submit("user@example.com").await);
    assert!(matches!(e, SubmissionError::Timeout(_)), "{e:?}");
    assert_eq!(app.client.state(), SubmissionState::FailedTimeout);
    assert_eq!(app.client.input(), "user@example.com");
    assert_eq!(app.client.count().value, INITIAL_COUNT);
}

#[tokio::test]
async fn retry_after_failure() {
    let app = spawn_app().await;

    {
        let _failing = join()
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount_as_scoped(&app.backend)
            .await;
        assert_err!(app.client.submit("user@example.com").await);
    }

    // the user fixes nothing, just presses the button again
    app.client.edit_input(&app.client.input());
    assert_eq!(app.client.state(), SubmissionState::Idle);

    join()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "total_subscribers": 7})))
        .expect(1)
        .mount(&app.backend)
        .await;
    assert_ok!(app.client.submit(&app.client.input()).await);
    assert_eq!(app.client.count().value, 7);
}
