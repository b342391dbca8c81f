// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for configuration completion through the public API.

use std::collections::HashSet;
use std::sync::Arc;

use rolehost_manager::Role;
use rolehost_manager::completion::{CompletionContext, CompletionSettings, ConfigDocument, keys};
use rolehost_manager::host::{FixedHostResolver, NetworkHostResolver};
use rolehost_manager::port::EphemeralPortAllocator;
use serde_json::{Value, json};

fn context() -> CompletionContext {
    CompletionContext::new(
        Arc::new(FixedHostResolver::new("192.168.0.10")),
        Arc::new(EphemeralPortAllocator::new()),
        CompletionSettings::default().with_tmp_dir("/var/rolehost"),
    )
}

fn ports(role: Role, doc: &ConfigDocument) -> Vec<u64> {
    let as_port = |v: &Value| match v {
        Value::String(s) => s.parse().unwrap(),
        other => other.as_u64().unwrap(),
    };
    match role {
        Role::Controller => vec![as_port(&doc[keys::controller::PORT])],
        Role::Broker => vec![as_port(&doc[keys::broker::QUERY_PORT])],
        Role::Server => vec![
            as_port(&doc[keys::server::PORT]),
            as_port(&doc[keys::server::ADMIN_API_PORT]),
        ],
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_completions_never_share_a_port() {
    let ctx = Arc::new(context());

    let tasks: Vec<_> = (0..24)
        .map(|i| {
            let ctx = ctx.clone();
            let role = Role::ALL[i % 3];
            tokio::spawn(async move { (role, ctx.complete(role, ConfigDocument::new()).unwrap()) })
        })
        .collect();

    let mut seen = HashSet::new();
    for task in tasks {
        let (role, doc) = task.await.unwrap();
        for port in ports(role, &doc) {
            assert!(seen.insert(port), "port {port} allocated twice");
        }
    }
}

#[test]
fn test_derived_keys_follow_output_host_and_port() {
    let ctx = context();
    let input = match json!({ (keys::controller::PORT): "7000" }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    };

    let out = ctx.complete(Role::Controller, input).unwrap();

    assert_eq!(out[keys::controller::HOST], "192.168.0.10");
    assert_eq!(out[keys::controller::PORT], "7000");
    assert_eq!(
        out[keys::controller::DATA_DIR],
        "/var/rolehost/Controller_192.168.0.10_7000/data"
    );
    assert_eq!(
        out[keys::controller::METRICS_PREFIX],
        "pinot.controller.192.168.0.10_7000"
    );
}

#[test]
fn test_custom_metrics_prefixes() {
    let settings = CompletionSettings {
        broker_metrics_prefix: "acme.broker.".to_string(),
        ..CompletionSettings::default()
    };
    let ctx = CompletionContext::new(
        Arc::new(FixedHostResolver::new("h")),
        Arc::new(EphemeralPortAllocator::new()),
        settings,
    );

    let out = ctx.complete(Role::Broker, ConfigDocument::new()).unwrap();
    let port = out[keys::broker::QUERY_PORT].as_u64().unwrap();

    assert_eq!(out[keys::broker::METRICS_PREFIX], format!("acme.broker.h_{port}"));
}

#[test]
fn test_real_resolver_produces_usable_host() {
    let ctx = CompletionContext::new(
        Arc::new(NetworkHostResolver::new()),
        Arc::new(EphemeralPortAllocator::new()),
        CompletionSettings::default(),
    );

    let out = ctx.complete(Role::Server, ConfigDocument::new()).unwrap();
    let host = out[keys::server::HOST].as_str().unwrap();

    assert!(!host.is_empty());
    assert!(
        out[keys::server::DATA_DIR]
            .as_str()
            .unwrap()
            .contains(&format!("Server_{host}_"))
    );
}
