//! Shared test helpers for `walletkit-core` integration tests.
//!
//! Lightweight in-memory mocks for the dispatcher ports. Providers can be
//! gated so a test can observe the dispatcher while a recovery flow is still
//! running.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::Semaphore;
use walletkit_core::{
    classify, DispatchError, RawResponse, SharedCredentials, TimeDifferenceObserver, TimeProvider,
    TokenProvider, TokenRefreshObserver, Transport, TransportError,
};
use walletkit_domain::{Credentials, RequestDescriptor, ServerInformation};

pub const INVALID_TIMESTAMP: &str =
    r#"{"error":"invalid_timestamp","error_description":"Timestamp is too old"}"#;
pub const INVALID_TOKEN: &str = r#"{"error":"invalid_token"}"#;
pub const INVALID_GRANT: &str = r#"{"error":"invalid_grant"}"#;

/// Error as the classifier would produce it for `body`
pub fn api_error(status: u16, body: &str) -> DispatchError {
    classify(Some(body), Some(status))
}

/// Closed until `open` is called
#[derive(Default)]
pub struct Gate {
    permits: Option<Semaphore>,
}

impl Gate {
    pub fn closed() -> Self {
        Self { permits: Some(Semaphore::new(0)) }
    }

    pub fn open(&self) {
        if let Some(permits) = &self.permits {
            permits.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    async fn pass(&self) {
        if let Some(permits) = &self.permits {
            permits.acquire().await.unwrap().forget();
        }
    }
}

/// One scripted transport outcome
pub enum Step {
    Respond(RawResponse),
    Fail(TransportError),
    /// Never completes; only cancellation ends the call
    Hang,
}

impl Step {
    pub fn ok(body: &str) -> Self {
        Self::Respond(RawResponse::new(200, body))
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Respond(RawResponse::new(status, body))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub url: String,
    pub access_token: Option<String>,
}

/// Transport answering from a per-URL script
///
/// URLs with an exhausted script answer `200 "OK"`. Every call is recorded
/// together with the access token visible through the shared credentials.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<RecordedCall>>,
    credentials: Option<SharedCredentials>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the access token visible through `credentials` on every call
    pub fn with_shared(mut self, credentials: SharedCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn script(self, url: &str, steps: Vec<Step>) -> Self {
        self.script.lock().unwrap().entry(url.to_string()).or_default().extend(steps);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.url).collect()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|call| call.url == url).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let access_token =
            self.credentials.as_ref().map(|credentials| credentials.read().access_token.clone());
        self.calls
            .lock()
            .unwrap()
            .push(RecordedCall { url: request.url.clone(), access_token });

        let step = self.script.lock().unwrap().get_mut(&request.url).and_then(VecDeque::pop_front);
        match step.unwrap_or_else(|| Step::ok("OK")) {
            Step::Respond(response) => Ok(response),
            Step::Fail(error) => Err(error),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// Time provider returning a fixed outcome
pub struct MockTimeProvider {
    outcome: Result<ServerInformation, DispatchError>,
    calls: AtomicUsize,
    gate: Gate,
}

impl MockTimeProvider {
    pub fn succeeding(time_diff: TimeDelta) -> Self {
        let now = Utc::now();
        Self {
            outcome: Ok(ServerInformation::from_server_time(now + time_diff, now)),
            calls: AtomicUsize::new(0),
            gate: Gate::default(),
        }
    }

    pub fn failing(error: DispatchError) -> Self {
        Self { outcome: Err(error), calls: AtomicUsize::new(0), gate: Gate::default() }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Gate::closed();
        self
    }

    pub fn release(&self) {
        self.gate.open();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeProvider for MockTimeProvider {
    async fn server_information(&self) -> Result<ServerInformation, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;
        self.outcome.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCall {
    pub refresh_token: String,
    pub code: Option<String>,
    pub scopes: Option<Vec<String>>,
}

/// Token provider answering from a queue of outcomes
///
/// An exhausted queue issues `A<n>`/`R<n>` credentials valid for an hour.
#[derive(Default)]
pub struct MockTokenProvider {
    outcomes: Mutex<VecDeque<Result<Credentials, DispatchError>>>,
    calls: Mutex<Vec<RefreshCall>>,
    gate: Gate,
}

impl MockTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: DispatchError) -> Self {
        let provider = Self::default();
        provider.outcomes.lock().unwrap().push_back(Err(error));
        provider
    }

    pub fn gated(mut self) -> Self {
        self.gate = Gate::closed();
        self
    }

    pub fn release(&self) {
        self.gate.open();
    }

    pub fn calls(&self) -> Vec<RefreshCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn refresh_token(
        &self,
        refresh_token: &str,
        code: Option<&str>,
        scopes: Option<&[String]>,
    ) -> Result<Credentials, DispatchError> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(RefreshCall {
                refresh_token: refresh_token.to_string(),
                code: code.map(str::to_string),
                scopes: scopes.map(<[String]>::to_vec),
            });
            calls.len()
        };
        self.gate.pass().await;

        let scripted = self.outcomes.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(Credentials::issued(
                format!("A{}", attempt + 1),
                Some(format!("R{}", attempt + 1)),
                Some("mac".to_string()),
                Some(3600),
                Utc::now(),
            ))
        })
    }
}

/// Records every observer callback
#[derive(Default)]
pub struct RecordingObserver {
    time_diffs: Mutex<Vec<TimeDelta>>,
    refreshed: Mutex<Vec<Credentials>>,
    invalid: Mutex<Vec<DispatchError>>,
}

impl RecordingObserver {
    pub fn time_diffs(&self) -> Vec<TimeDelta> {
        self.time_diffs.lock().unwrap().clone()
    }

    pub fn refreshed(&self) -> Vec<Credentials> {
        self.refreshed.lock().unwrap().clone()
    }

    pub fn invalid(&self) -> Vec<DispatchError> {
        self.invalid.lock().unwrap().clone()
    }
}

impl TimeDifferenceObserver for RecordingObserver {
    fn on_time_difference_refreshed(&self, diff: TimeDelta) {
        self.time_diffs.lock().unwrap().push(diff);
    }
}

impl TokenRefreshObserver for RecordingObserver {
    fn on_token_refreshed(&self, credentials: &Credentials) {
        self.refreshed.lock().unwrap().push(credentials.clone());
    }

    fn on_refresh_token_invalid(&self, error: &DispatchError) {
        self.invalid.lock().unwrap().push(error.clone());
    }
}

/// Yield to spawned tasks until `condition` holds
///
/// Sleeps briefly now and then so tasks on other worker threads catch up.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for attempt in 0..2_000 {
        if condition() {
            return;
        }
        if attempt % 100 == 99 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
    panic!("condition not reached");
}

/// Let every runnable task make progress
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
