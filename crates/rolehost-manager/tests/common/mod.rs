// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for rolehost-manager integration tests.
//!
//! Provides TestContext wiring a router to a mock starter and a fixed host.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use rolehost_manager::completion::{CompletionContext, CompletionSettings};
use rolehost_manager::handlers::ManagerHandlerState;
use rolehost_manager::host::FixedHostResolver;
use rolehost_manager::port::EphemeralPortAllocator;
use rolehost_manager::server::router;
use rolehost_manager::starter::MockStarter;

/// Host every test instance advertises.
pub const TEST_HOST: &str = "10.20.30.40";

/// Test context holding the router and its collaborators.
pub struct TestContext {
    pub router: Router,
    pub state: Arc<ManagerHandlerState>,
    pub starter: Arc<MockStarter>,
    pub resolver: Arc<FixedHostResolver>,
}

impl TestContext {
    /// Context with a well-behaved mock starter.
    pub fn new() -> Self {
        Self::with_starter(MockStarter::new())
    }

    /// Context with a specific mock starter.
    pub fn with_starter(starter: MockStarter) -> Self {
        Self::build(starter, FixedHostResolver::new(TEST_HOST))
    }

    /// Context whose host discovery always fails.
    pub fn offline() -> Self {
        Self::build(MockStarter::new(), FixedHostResolver::unreachable())
    }

    fn build(starter: MockStarter, resolver: FixedHostResolver) -> Self {
        let starter = Arc::new(starter);
        let resolver = Arc::new(resolver);
        let completion = CompletionContext::new(
            resolver.clone(),
            Arc::new(EphemeralPortAllocator::new()),
            CompletionSettings::default().with_tmp_dir("/tmp"),
        );
        let state = Arc::new(ManagerHandlerState::new(starter.clone(), completion));

        Self {
            router: router(state.clone()),
            state,
            starter,
            resolver,
        }
    }

    /// Send a request and return status plus parsed JSON body (Null if empty).
    pub async fn send(&self, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, "").await
    }

    pub async fn post(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        self.send(Method::POST, uri, body).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, "").await
    }

    /// Start an instance in auto mode and return its id.
    pub async fn start(&self, role: &str) -> String {
        let (status, body) = self
            .post(&format!("/instances/{role}?autoMode=true"), "")
            .await;
        assert_eq!(status, StatusCode::OK, "start failed: {body}");
        body["instanceId"].as_str().unwrap().to_string()
    }
}
