//! Integration tests for the token-refreshing dispatcher

mod support;

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use support::{
    api_error, settle, wait_until, MockTimeProvider, MockTokenProvider, RecordingObserver,
    RefreshCall, ScriptedTransport, Step, INVALID_GRANT, INVALID_TIMESTAMP, INVALID_TOKEN,
};
use tokio_test::assert_ok;
use walletkit_core::{
    DispatchErrorKind, RefreshingDispatcher, RequestDispatcher, SharedCredentials, TransportError,
};
use walletkit_domain::{Credentials, RequestDescriptor};

const A: &str = "https://api.test/wallet/a";
const B: &str = "https://api.test/wallet/b";
const C: &str = "https://api.test/wallet/c";

struct Harness {
    transport: Arc<ScriptedTransport>,
    tokens: Arc<MockTokenProvider>,
    observer: Arc<RecordingObserver>,
    credentials: SharedCredentials,
    dispatcher: RefreshingDispatcher,
}

fn stale_credentials() -> Credentials {
    Credentials::new("A1").with_refresh_token("R1")
}

fn harness(
    credentials: Credentials,
    transport: ScriptedTransport,
    tokens: MockTokenProvider,
) -> Harness {
    let credentials: SharedCredentials = Arc::new(RwLock::new(credentials));
    let transport = Arc::new(transport.with_shared(Arc::clone(&credentials)));
    let tokens = Arc::new(tokens);
    let observer = Arc::new(RecordingObserver::default());
    let dispatcher =
        RefreshingDispatcher::builder(transport.clone(), tokens.clone(), Arc::clone(&credentials))
            .refresh_observer(observer.clone())
            .build();

    Harness { transport, tokens, observer, credentials, dispatcher }
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_replayed() {
    let h = harness(
        stale_credentials(),
        ScriptedTransport::new().script(A, vec![Step::status(401, INVALID_TOKEN), Step::ok("OK")]),
        MockTokenProvider::new(),
    );

    let body = h.dispatcher.submit(RequestDescriptor::get(A)).await;

    assert_eq!(assert_ok!(body), "OK");
    assert_eq!(
        h.tokens.calls(),
        vec![RefreshCall { refresh_token: "R1".to_string(), code: None, scopes: None }]
    );

    let tokens_seen: Vec<_> =
        h.transport.calls().into_iter().map(|call| call.access_token).collect();
    assert_eq!(tokens_seen, vec![Some("A1".to_string()), Some("A2".to_string())]);

    let current = h.credentials.read().clone();
    assert_eq!(current.access_token, "A2");
    assert_eq!(current.refresh_token.as_deref(), Some("R2"));
    assert_eq!(current.expires_in, Some(3600));

    let refreshed = h.observer.refreshed();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].access_token, "A2");
}

#[tokio::test]
async fn concurrent_expired_tokens_share_one_refresh_and_replay_in_order() {
    let h = harness(
        stale_credentials(),
        ScriptedTransport::new()
            .script(A, vec![Step::status(401, INVALID_TOKEN), Step::ok("a")])
            .script(B, vec![Step::status(401, INVALID_TOKEN), Step::ok("b")])
            .script(C, vec![Step::status(401, INVALID_TOKEN), Step::ok("c")]),
        MockTokenProvider::new().gated(),
    );

    let handles: Vec<_> =
        [A, B, C].into_iter().map(|url| h.dispatcher.submit(RequestDescriptor::get(url))).collect();

    wait_until(|| h.transport.calls().len() == 3 && h.tokens.call_count() == 1).await;
    settle().await;
    assert_eq!(h.tokens.call_count(), 1);

    h.tokens.release();
    let bodies: Vec<String> =
        join_all(handles).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(bodies, vec!["a", "b", "c"]);
    assert_eq!(h.tokens.call_count(), 1);
    assert_eq!(h.transport.urls(), vec![A, B, C, A, B, C]);
    assert!(h.transport.calls()[3..]
        .iter()
        .all(|call| call.access_token.as_deref() == Some("A2")));
}

#[tokio::test]
async fn expired_token_right_after_refresh_redispatches_without_refreshing() {
    let fresh = Credentials::issued("A1", Some("R1".to_string()), None, Some(3600), Utc::now());
    let h = harness(
        fresh,
        ScriptedTransport::new().script(A, vec![Step::status(401, INVALID_TOKEN), Step::ok("OK")]),
        MockTokenProvider::new(),
    );

    let body = h.dispatcher.submit(RequestDescriptor::get(A)).await.unwrap();

    assert_eq!(body, "OK");
    assert_eq!(h.tokens.call_count(), 0);
    assert_eq!(h.transport.calls_to(A), 2);
    assert!(h.observer.refreshed().is_empty());
}

#[tokio::test]
async fn configured_window_controls_recent_refresh_detection() {
    let issued_a_minute_ago = Credentials::issued(
        "A1",
        Some("R1".to_string()),
        None,
        Some(3600),
        Utc::now() - TimeDelta::seconds(60),
    );
    let credentials: SharedCredentials = Arc::new(RwLock::new(issued_a_minute_ago));
    let transport = Arc::new(
        ScriptedTransport::new()
            .script(A, vec![Step::status(401, INVALID_TOKEN), Step::ok("OK")])
            .with_shared(Arc::clone(&credentials)),
    );
    let tokens = Arc::new(MockTokenProvider::new());
    let dispatcher = RefreshingDispatcher::builder(transport.clone(), tokens.clone(), credentials)
        .recent_refresh_window(std::time::Duration::from_secs(120))
        .build();

    assert_eq!(dispatcher.submit(RequestDescriptor::get(A)).await.unwrap(), "OK");
    assert_eq!(tokens.call_count(), 0);
}

#[tokio::test]
async fn rejected_refresh_token_notifies_once_and_rejects_queue() {
    let refresh_error = api_error(400, INVALID_GRANT);
    let h = harness(
        stale_credentials(),
        ScriptedTransport::new()
            .script(A, vec![Step::status(401, INVALID_TOKEN)])
            .script(B, vec![Step::status(401, INVALID_TOKEN)])
            .script(C, vec![Step::status(401, INVALID_TOKEN)]),
        MockTokenProvider::failing(refresh_error.clone()),
    );

    let handles: Vec<_> =
        [A, B, C].into_iter().map(|url| h.dispatcher.submit(RequestDescriptor::get(url))).collect();
    let results = join_all(handles).await;

    for result in results {
        let err = result.unwrap_err();
        assert!(err.is_refresh_token_expired());
        assert_eq!(err, refresh_error);
    }
    assert_eq!(h.tokens.call_count(), 1);
    assert_eq!(h.observer.invalid(), vec![refresh_error]);
    assert!(h.observer.refreshed().is_empty());
    assert_eq!(h.credentials.read().access_token, "A1");
}

#[tokio::test]
async fn generic_refresh_failure_rejects_queue_without_invalid_notification() {
    let refresh_error = api_error(500, r#"{"error":"internal_error"}"#);
    let h = harness(
        stale_credentials(),
        ScriptedTransport::new().script(A, vec![Step::status(401, INVALID_TOKEN)]),
        MockTokenProvider::failing(refresh_error.clone()),
    );

    let err = h.dispatcher.submit(RequestDescriptor::get(A)).await.unwrap_err();

    assert_eq!(err, refresh_error);
    assert!(h.observer.invalid().is_empty());

    // The flow is over; the next request goes straight to the transport.
    assert_eq!(h.dispatcher.submit(RequestDescriptor::get(B)).await.unwrap(), "OK");
}

#[tokio::test]
async fn missing_refresh_token_rejects_without_queueing() {
    let h = harness(
        Credentials::new("A1"),
        ScriptedTransport::new().script(A, vec![Step::status(401, INVALID_TOKEN)]),
        MockTokenProvider::new(),
    );

    let err = h.dispatcher.submit(RequestDescriptor::get(A)).await.unwrap_err();

    assert_eq!(err.kind(), DispatchErrorKind::Generic);
    assert_eq!(err.code(), Some("invalid_refresh_token"));
    assert_eq!(h.tokens.call_count(), 0);

    assert_eq!(h.dispatcher.submit(RequestDescriptor::get(B)).await.unwrap(), "OK");
}

#[tokio::test]
async fn explicit_refresh_forwards_code_and_scopes() {
    let h = harness(stale_credentials(), ScriptedTransport::new(), MockTokenProvider::new());
    let scopes = vec!["balance".to_string(), "statements".to_string()];

    let refreshed =
        h.dispatcher.refresh_token(Some("auth-code".to_string()), Some(scopes.clone())).await;

    let refreshed = assert_ok!(refreshed);
    assert_eq!(refreshed.access_token, "A2");
    assert_eq!(
        h.tokens.calls(),
        vec![RefreshCall {
            refresh_token: "R1".to_string(),
            code: Some("auth-code".to_string()),
            scopes: Some(scopes),
        }]
    );
    assert_eq!(h.dispatcher.credentials().access_token, "A2");
    assert_eq!(h.observer.refreshed().len(), 1);
}

#[tokio::test]
async fn explicit_refresh_without_refresh_token_fails_fast() {
    let h = harness(Credentials::new("A1"), ScriptedTransport::new(), MockTokenProvider::new());

    let err = h.dispatcher.refresh_token(None, None).await.unwrap_err();

    assert_eq!(err.code(), Some("invalid_refresh_token"));
    assert_eq!(h.tokens.call_count(), 0);
}

#[tokio::test]
async fn explicit_refresh_joins_running_refresh() {
    let h = harness(
        stale_credentials(),
        ScriptedTransport::new().script(A, vec![Step::status(401, INVALID_TOKEN), Step::ok("a")]),
        MockTokenProvider::new().gated(),
    );

    let a = h.dispatcher.submit(RequestDescriptor::get(A));
    wait_until(|| h.tokens.call_count() == 1).await;

    let dispatcher = h.dispatcher.clone();
    let joined = tokio::spawn(async move { dispatcher.refresh_token(None, None).await });
    settle().await;
    h.tokens.release();

    let credentials = joined.await.unwrap().unwrap();
    assert_eq!(credentials.access_token, "A2");
    assert_eq!(a.await.unwrap(), "a");
    assert_eq!(h.tokens.call_count(), 1);
}

#[tokio::test]
async fn grant_extension_during_running_refresh_runs_its_own_exchange() {
    let h = harness(
        stale_credentials(),
        ScriptedTransport::new().script(A, vec![Step::status(401, INVALID_TOKEN), Step::ok("a")]),
        MockTokenProvider::new().gated(),
    );

    let a = h.dispatcher.submit(RequestDescriptor::get(A));
    wait_until(|| h.tokens.call_count() == 1).await;

    let dispatcher = h.dispatcher.clone();
    let extended = tokio::spawn(async move {
        dispatcher.refresh_token(Some("auth-code".to_string()), Some(vec!["balance".to_string()])).await
    });
    settle().await;
    assert_eq!(h.tokens.call_count(), 1);

    h.tokens.release();
    let credentials = extended.await.unwrap().unwrap();

    assert_eq!(credentials.access_token, "A3");
    assert_eq!(
        h.tokens.calls(),
        vec![
            RefreshCall { refresh_token: "R1".to_string(), code: None, scopes: None },
            RefreshCall {
                refresh_token: "R2".to_string(),
                code: Some("auth-code".to_string()),
                scopes: Some(vec!["balance".to_string()]),
            },
        ]
    );
    assert_eq!(a.await.unwrap(), "a");
    assert_eq!(h.dispatcher.credentials().access_token, "A3");
}

#[tokio::test]
async fn grant_extension_reports_failure_of_running_refresh() {
    let h = harness(
        stale_credentials(),
        ScriptedTransport::new().script(A, vec![Step::status(401, INVALID_TOKEN)]),
        MockTokenProvider::failing(api_error(400, INVALID_GRANT)).gated(),
    );

    let a = h.dispatcher.submit(RequestDescriptor::get(A));
    wait_until(|| h.tokens.call_count() == 1).await;

    let dispatcher = h.dispatcher.clone();
    let extended = tokio::spawn(async move {
        dispatcher.refresh_token(Some("auth-code".to_string()), None).await
    });
    settle().await;
    h.tokens.release();

    assert!(extended.await.unwrap().unwrap_err().is_refresh_token_expired());
    assert!(a.await.unwrap_err().is_refresh_token_expired());
    assert_eq!(h.tokens.call_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn queued_requests_replay_in_submission_order_on_worker_pool() {
    for _ in 0..20 {
        let h =
            harness(stale_credentials(), ScriptedTransport::new(), MockTokenProvider::new().gated());
        let dispatcher = h.dispatcher.clone();
        let refresh = tokio::spawn(async move { dispatcher.refresh_token(None, None).await });
        wait_until(|| h.tokens.call_count() == 1).await;

        let urls: Vec<String> = (0..16).map(|i| format!("https://api.test/wallet/{i}")).collect();
        let handles: Vec<_> =
            urls.iter().map(|url| h.dispatcher.submit(RequestDescriptor::get(url.clone()))).collect();
        assert!(h.transport.calls().is_empty());

        h.tokens.release();
        refresh.await.unwrap().unwrap();
        for result in join_all(handles).await {
            assert_ok!(result);
        }

        assert_eq!(h.transport.urls(), urls);
    }
}

#[tokio::test]
async fn requests_queue_behind_explicit_refresh() {
    let h = harness(stale_credentials(), ScriptedTransport::new(), MockTokenProvider::new().gated());

    let dispatcher = h.dispatcher.clone();
    let refresh = tokio::spawn(async move { dispatcher.refresh_token(None, None).await });
    wait_until(|| h.tokens.call_count() == 1).await;

    let b = h.dispatcher.submit(RequestDescriptor::get(B));
    settle().await;
    assert_eq!(h.transport.calls_to(B), 0);

    h.tokens.release();
    refresh.await.unwrap().unwrap();

    assert_eq!(b.await.unwrap(), "OK");
    assert_eq!(h.transport.calls()[0].access_token.as_deref(), Some("A2"));
}

#[tokio::test]
async fn stale_clock_and_expired_token_recover_in_sequence() {
    let credentials: SharedCredentials = Arc::new(RwLock::new(stale_credentials()));
    let transport = Arc::new(
        ScriptedTransport::new()
            .script(
                A,
                vec![
                    Step::status(401, INVALID_TIMESTAMP),
                    Step::status(401, INVALID_TOKEN),
                    Step::ok("a"),
                ],
            )
            .with_shared(Arc::clone(&credentials)),
    );
    let time = Arc::new(MockTimeProvider::succeeding(TimeDelta::seconds(5)));
    let tokens = Arc::new(MockTokenProvider::new());
    let observer = Arc::new(RecordingObserver::default());
    let dispatcher = RefreshingDispatcher::builder(transport.clone(), tokens.clone(), credentials)
        .time_provider(time.clone())
        .time_observer(observer.clone())
        .refresh_observer(observer.clone())
        .build();

    assert_eq!(dispatcher.submit(RequestDescriptor::get(A)).await.unwrap(), "a");

    assert_eq!(time.calls(), 1);
    assert_eq!(tokens.call_count(), 1);
    assert_eq!(transport.calls_to(A), 3);
    assert_eq!(observer.time_diffs(), vec![TimeDelta::seconds(5)]);
    assert_eq!(observer.refreshed().len(), 1);
}

#[tokio::test]
async fn cancelled_request_never_triggers_refresh() {
    let h = harness(
        stale_credentials(),
        ScriptedTransport::new().script(A, vec![Step::Fail(TransportError::Cancelled)]),
        MockTokenProvider::new(),
    );

    let err = h.dispatcher.submit(RequestDescriptor::get(A)).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(h.tokens.call_count(), 0);
}

fn recovering_dispatcher(
    transport: ScriptedTransport,
    time: &Arc<MockTimeProvider>,
    tokens: &Arc<MockTokenProvider>,
) -> (Arc<ScriptedTransport>, Arc<RecordingObserver>, RefreshingDispatcher) {
    let credentials: SharedCredentials = Arc::new(RwLock::new(stale_credentials()));
    let transport = Arc::new(transport.with_shared(Arc::clone(&credentials)));
    let observer = Arc::new(RecordingObserver::default());
    let dispatcher = RefreshingDispatcher::builder(transport.clone(), tokens.clone(), credentials)
        .time_provider(time.clone())
        .time_observer(observer.clone())
        .refresh_observer(observer.clone())
        .build();

    (transport, observer, dispatcher)
}

#[tokio::test]
async fn clock_sync_replay_waits_behind_running_token_refresh() {
    let time = Arc::new(MockTimeProvider::succeeding(TimeDelta::seconds(3)));
    let tokens = Arc::new(MockTokenProvider::new().gated());
    let (transport, observer, dispatcher) = recovering_dispatcher(
        ScriptedTransport::new()
            .script(A, vec![Step::status(401, INVALID_TOKEN), Step::ok("a")])
            .script(B, vec![Step::status(401, INVALID_TIMESTAMP), Step::ok("b")]),
        &time,
        &tokens,
    );

    let a = dispatcher.submit(RequestDescriptor::get(A));
    let b = dispatcher.submit(RequestDescriptor::get(B));
    wait_until(|| time.calls() == 1 && observer.time_diffs().len() == 1).await;
    settle().await;

    assert_eq!(tokens.call_count(), 1);
    assert_eq!(transport.urls(), vec![A, B]);

    tokens.release();
    assert_eq!(a.await.unwrap(), "a");
    assert_eq!(b.await.unwrap(), "b");

    assert_eq!(transport.urls(), vec![A, B, A, B]);
    assert_eq!(transport.calls()[3].access_token.as_deref(), Some("A2"));
    assert_eq!(time.calls(), 1);
    assert_eq!(tokens.call_count(), 1);
}

#[tokio::test]
async fn failed_refresh_rejects_requests_waiting_on_clock_sync() {
    let time = Arc::new(MockTimeProvider::succeeding(TimeDelta::seconds(3)).gated());
    let tokens = Arc::new(MockTokenProvider::failing(api_error(400, INVALID_GRANT)).gated());
    let (transport, observer, dispatcher) = recovering_dispatcher(
        ScriptedTransport::new()
            .script(A, vec![Step::status(401, INVALID_TOKEN)])
            .script(B, vec![Step::status(401, INVALID_TIMESTAMP)]),
        &time,
        &tokens,
    );

    let a = dispatcher.submit(RequestDescriptor::get(A));
    let b = dispatcher.submit(RequestDescriptor::get(B));
    wait_until(|| time.calls() == 1 && tokens.call_count() == 1).await;

    tokens.release();
    assert!(a.await.unwrap_err().is_refresh_token_expired());
    assert!(b.await.unwrap_err().is_refresh_token_expired());

    time.release();
    wait_until(|| observer.time_diffs().len() == 1).await;
    settle().await;

    assert_eq!(transport.urls(), vec![A, B]);
    assert_eq!(observer.invalid().len(), 1);
}
