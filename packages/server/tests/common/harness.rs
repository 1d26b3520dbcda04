//! Test harness: the full router over an in-memory store and a mock
//! extraction service.
//!
//! Requests go through `tower::ServiceExt::oneshot`, so no socket is bound.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use scrape_pipeline::testing::{fast_settings, MemoryStore, MockExtractor};
use scrape_pipeline::{Dispatcher, SecretString};
use serde_json::Value;
use server_core::kernel::{CycleLock, ScrapeQueue};
use server_core::server::{build_app, AppState, AuthSecrets};
use test_context::AsyncTestContext;
use tower::ServiceExt;

pub const OPERATOR_TOKEN: &str = "test-operator-token";
pub const CRON_SECRET: &str = "test-cron-secret";

/// Credentials attached to a test request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum As {
    Anonymous,
    Operator,
    Cron,
}

/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let (status, body) = ctx.get("/health").await;
/// }
/// ```
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub extractor: Arc<MockExtractor>,
    /// The router's single-flight guard
    pub cycle_lock: CycleLock,
    pub app: Router,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new(MockExtractor::new())
    }

    async fn teardown(self) {
        // In-memory store is dropped with the harness
    }
}

impl TestHarness {
    /// Harness with enabled, zero-delay settings and the given extractor.
    pub fn new(extractor: MockExtractor) -> Self {
        Self::build(extractor, None::<fn(Arc<Dispatcher>, CycleLock) -> ScrapeQueue>)
    }

    /// Same as [`TestHarness::new`], with submissions routed to a queue.
    /// `make_queue` receives the router's cycle lock for the worker.
    pub fn with_queue<F>(extractor: MockExtractor, make_queue: F) -> Self
    where
        F: FnOnce(Arc<Dispatcher>, CycleLock) -> ScrapeQueue,
    {
        Self::build(extractor, Some(make_queue))
    }

    fn build<F>(extractor: MockExtractor, make_queue: Option<F>) -> Self
    where
        F: FnOnce(Arc<Dispatcher>, CycleLock) -> ScrapeQueue,
    {
        let store = Arc::new(MemoryStore::with_settings(fast_settings()));
        let extractor = Arc::new(extractor);
        let dispatcher = Arc::new(Dispatcher::new(store.clone(), extractor.clone()));

        let mut state = AppState::new(store.clone(), extractor.clone(), dispatcher.clone());
        if let Some(make_queue) = make_queue {
            let queue = make_queue(dispatcher.clone(), state.cycle_lock.clone());
            state = state.with_queue(queue);
        }
        let cycle_lock = state.cycle_lock.clone();

        let app = build_app(
            state,
            AuthSecrets {
                operator_token: SecretString::new(OPERATOR_TOKEN),
                cron_secret: SecretString::new(CRON_SECRET),
            },
        );

        Self {
            store,
            extractor,
            cycle_lock,
            app,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri), As::Anonymous, Body::empty())
            .await
    }

    pub async fn post_json(&self, uri: &str, who: As, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri).header("content-type", "application/json"),
            who,
            Body::from(body.to_string()),
        )
        .await
    }

    pub async fn patch_json(&self, uri: &str, who: As, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::patch(uri).header("content-type", "application/json"),
            who,
            Body::from(body.to_string()),
        )
        .await
    }

    pub async fn post_text(&self, uri: &str, who: As, body: &str) -> (StatusCode, Value) {
        self.send(
            Request::post(uri).header("content-type", "text/csv"),
            who,
            Body::from(body.to_string()),
        )
        .await
    }

    async fn send(
        &self,
        builder: axum::http::request::Builder,
        who: As,
        body: Body,
    ) -> (StatusCode, Value) {
        let builder = match who {
            As::Anonymous => builder,
            As::Operator => builder.header("authorization", format!("Bearer {}", OPERATOR_TOKEN)),
            As::Cron => builder.header("x-cron-secret", CRON_SECRET),
        };
        let request = builder.body(body).expect("valid request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, json)
    }
}
