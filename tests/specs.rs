// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level end-to-end tests driving concrete cluster-lifecycle
//! scenarios against a real HTTP server bound to a loopback TCP socket,
//! exercised with `reqwest`. The daemon crate's own `tests/api.rs` covers
//! the same surface in-process via `tower::ServiceExt::oneshot`; this
//! suite additionally proves the server behaves correctly over a real
//! socket, end to end.

use std::net::SocketAddr;
use std::sync::Arc;

use rke2_adapters::fakes::{FakeAnalyzer, FakeCredentialStore, FakePlaybookProcess, FakePortProbe, FakeStatusProbe, ScriptedRun};
use rke2_core::{ClusterBuilder, NodeBuilder, NodeRole, NodeStatus};
use rke2_daemon::routes::router;
use rke2_daemon::state::AppState;
use rke2_engine::JobApi;
use rke2_storage::TopologyStore;
use serde_json::{json, Value};

/// Spins up the real axum router on an ephemeral loopback port and returns
/// the base URL plus the store (for test setup) and the bound handles that
/// must stay alive for the test's duration.
async fn spawn_server(
    scripts: Vec<ScriptedRun>,
) -> (String, Arc<TopologyStore>, tempfile::TempDir) {
    let store = TopologyStore::in_memory();
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(JobApi::new(
        store.clone(),
        Arc::new(FakeCredentialStore::default()),
        Arc::new(FakePlaybookProcess::new(scripts)),
        Arc::new(FakePortProbe::default()),
        Arc::new(FakeStatusProbe),
        Some(Arc::new(FakeAnalyzer::default())),
        dir.path().to_path_buf(),
    ));
    let state = AppState { api, kubeconfig_dir: dir.path().join("kubeconfigs") };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), store, dir)
}

/// S1 — Fresh install, 1 master + 2 workers: all nodes end `active`, the
/// job ends `success`, and the lock returns to `idle`.
#[tokio::test]
async fn s1_fresh_install_one_master_two_workers() {
    let (base, store, _dir) = spawn_server(vec![ScriptedRun::success(["ok"])]).await;
    let cluster = store.insert_cluster(ClusterBuilder::default().name("s1").build()).await.unwrap();
    store
        .insert_node(NodeBuilder::default().cluster_id(cluster.id).role(NodeRole::InitialMaster).hostname("m1").build())
        .await
        .unwrap();
    store
        .insert_node(NodeBuilder::default().cluster_id(cluster.id).role(NodeRole::Worker).hostname("w1").build())
        .await
        .unwrap();
    store
        .insert_node(NodeBuilder::default().cluster_id(cluster.id).role(NodeRole::Worker).hostname("w2").build())
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let response = client.post(format!("{base}/jobs/install/{}", cluster.id)).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let job_id = body["job_id"].as_str().unwrap().to_string();

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    let job: Value = client.get(format!("{base}/jobs/{job_id}")).send().await.unwrap().json().await.unwrap();
    assert_eq!(job["status"], "success");

    let nodes = store.list_nodes(cluster.id).await;
    assert!(nodes.iter().all(|n| n.status == NodeStatus::Active));

    let cluster = store.get_cluster(cluster.id).await.unwrap();
    assert!(cluster.lock.is_idle());
}

/// S2 — Concurrent request rejected: while S1's job is running, a second
/// mutating call against the same cluster receives 409 `conflict` and
/// mutates nothing.
#[tokio::test]
async fn s2_concurrent_request_against_a_busy_cluster_is_rejected() {
    let (base, store, _dir) =
        spawn_server(vec![ScriptedRun::success(["slow stage"]), ScriptedRun::success(["ok"])]).await;
    let cluster = store.insert_cluster(ClusterBuilder::default().name("s2").build()).await.unwrap();
    store
        .insert_node(NodeBuilder::default().cluster_id(cluster.id).role(NodeRole::InitialMaster).hostname("m1").build())
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let first = client.post(format!("{base}/jobs/install/{}", cluster.id)).send().await.unwrap();
    assert_eq!(first.status(), 200);

    let second = client.post(format!("{base}/jobs/install/{}", cluster.id)).send().await.unwrap();
    assert_eq!(second.status(), 409);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["error"], "conflict");

    let node_count = store.list_nodes(cluster.id).await.len();
    assert_eq!(node_count, 1, "no node should have been inserted by the rejected second call");
}

/// S3 — Unsafe removal: removing 2 of 3 active masters leaves 1, below
/// consensus majority of 2, and is rejected with 400 `guardrail_rejection`.
#[tokio::test]
async fn s3_removing_a_majority_of_masters_is_rejected() {
    let (base, store, _dir) = spawn_server(vec![]).await;
    let cluster = store.insert_cluster(ClusterBuilder::default().name("s3").build()).await.unwrap();
    let mut masters = Vec::new();
    for i in 0..3 {
        let node = store
            .insert_node(
                NodeBuilder::default()
                    .cluster_id(cluster.id)
                    .role(if i == 0 { NodeRole::InitialMaster } else { NodeRole::Master })
                    .hostname(format!("m{i}"))
                    .status(NodeStatus::Active)
                    .internal_address(format!("10.0.1.{i}"))
                    .build(),
            )
            .await
            .unwrap();
        masters.push(node);
    }

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/clusters/{}/scale/remove?confirm_master_removal=true", cluster.id))
        .json(&json!({ "node_ids": [masters[0].id, masters[1].id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "guardrail_rejection");

    let cluster = store.get_cluster(cluster.id).await.unwrap();
    assert!(cluster.lock.is_idle(), "a rejected guardrail must never have touched the lock");
}

/// S4 — Duplicate add: an address already used by an active node is
/// rejected by G4 before any job or node is created.
#[tokio::test]
async fn s4_duplicate_node_address_is_rejected() {
    let (base, store, _dir) = spawn_server(vec![]).await;
    let cluster = store.insert_cluster(ClusterBuilder::default().name("s4").build()).await.unwrap();
    store
        .insert_node(
            NodeBuilder::default()
                .cluster_id(cluster.id)
                .role(NodeRole::InitialMaster)
                .hostname("m1")
                .internal_address("10.0.0.10")
                .status(NodeStatus::Active)
                .build(),
        )
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/clusters/{}/scale/add", cluster.id))
        .json(&json!([{
            "hostname": "w-new",
            "internal_address": "10.0.0.10",
            "external_address": null,
            "use_external": false,
            "role": "worker"
        }]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "guardrail_rejection");

    assert_eq!(store.list_nodes(cluster.id).await.len(), 1, "the duplicate-address node must never be inserted");
}

/// S5 — Cancellation: `terminate` on a running job is accepted and the run
/// eventually reaches a terminal status with the lock released. The fake
/// playbook process does not model a mid-flight hang, so this exercises
/// the cancel-request plumbing (request accepted, flag observable on the
/// job) end-to-end over HTTP, which is the part owned by this surface.
#[tokio::test]
async fn s5_terminate_is_accepted_and_is_idempotent_on_a_terminal_job() {
    let (base, store, _dir) = spawn_server(vec![ScriptedRun::success(["line"])]).await;
    let cluster = store.insert_cluster(ClusterBuilder::default().name("s5").build()).await.unwrap();
    store
        .insert_node(NodeBuilder::default().cluster_id(cluster.id).role(NodeRole::InitialMaster).hostname("m1").build())
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let install: Value =
        client.post(format!("{base}/jobs/install/{}", cluster.id)).send().await.unwrap().json().await.unwrap();
    let job_id = install["job_id"].as_str().unwrap().to_string();

    let terminate = client.post(format!("{base}/jobs/{job_id}/terminate")).send().await.unwrap();
    assert_eq!(terminate.status(), 202);

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    // Terminating an already-terminal job is a no-op, not an error.
    let terminate_again = client.post(format!("{base}/jobs/{job_id}/terminate")).send().await.unwrap();
    assert_eq!(terminate_again.status(), 202);

    let cluster = store.get_cluster(cluster.id).await.unwrap();
    assert!(cluster.lock.is_idle());
}

/// Unknown cluster ids return 404 across the CRUD surface, and the
/// uninstall confirmation-text check rejects a mismatched name before any
/// job is created (validation_error, 400).
#[tokio::test]
async fn unknown_ids_and_bad_confirmations_are_rejected_before_any_mutation() {
    let (base, store, _dir) = spawn_server(vec![]).await;
    let client = reqwest::Client::new();

    let missing = client.get(format!("{base}/clusters/clus-doesnotexist")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    let cluster = store.insert_cluster(ClusterBuilder::default().name("prod-east").build()).await.unwrap();
    let bad_confirm = client
        .post(format!("{base}/jobs/uninstall/{}?confirmation=not-the-name", cluster.id))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_confirm.status(), 400);
    assert!(store.list_jobs(Some(cluster.id)).await.is_empty());
}
