// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end HTTP surface tests, driven with
//! `tower::ServiceExt::oneshot` against an in-memory store and the fake
//! Collaborator Adapters.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rke2_adapters::fakes::{FakeAnalyzer, FakeCredentialStore, FakePlaybookProcess, FakePortProbe, FakeStatusProbe, ScriptedRun};
use rke2_core::{ClusterBuilder, NodeBuilder, NodeRole, NodeStatus};
use rke2_daemon::routes::router;
use rke2_daemon::state::AppState;
use rke2_engine::JobApi;
use rke2_storage::TopologyStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(scripts: Vec<ScriptedRun>) -> (axum::Router, Arc<TopologyStore>, tempfile::TempDir) {
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
    (router(state), store, dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_returns_ok() {
    let (app, _store, _dir) = app(vec![]);
    let response = app.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn install_runs_to_success_over_http() {
    let (app, store, _dir) = app(vec![ScriptedRun::success(["ok"])]);
    let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
    store
        .insert_node(NodeBuilder::default().cluster_id(cluster.id).role(NodeRole::InitialMaster).hostname("m0").build())
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/jobs/install/{}", cluster.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job_id = body_json(response).await["job_id"].as_str().unwrap().to_string();

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let response =
        app.oneshot(Request::builder().uri(format!("/jobs/{job_id}")).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job = body_json(response).await;
    assert_eq!(job["status"], "success");
}

#[tokio::test]
async fn concurrent_install_conflicts_with_409() {
    let (app, store, _dir) = app(vec![ScriptedRun::success(["slow"]), ScriptedRun::success(["ok"])]);
    let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
    store
        .insert_node(NodeBuilder::default().cluster_id(cluster.id).role(NodeRole::InitialMaster).hostname("m0").build())
        .await
        .unwrap();

    let install = |app: axum::Router, cluster_id: rke2_core::ClusterId| async move {
        app.oneshot(
            Request::builder().method("POST").uri(format!("/jobs/install/{cluster_id}")).body(Body::empty()).unwrap(),
        )
        .await
        .unwrap()
    };

    let first = install(app.clone(), cluster.id).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = install(app.clone(), cluster.id).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = body_json(second).await;
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn scale_remove_of_a_master_without_confirmation_returns_400() {
    let (app, store, _dir) = app(vec![]);
    let cluster = store.insert_cluster(ClusterBuilder::default().name("c1").build()).await.unwrap();
    let master = store
        .insert_node(
            NodeBuilder::default()
                .cluster_id(cluster.id)
                .role(NodeRole::Master)
                .hostname("m1")
                .status(NodeStatus::Active)
                .build(),
        )
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/clusters/{}/scale/remove", cluster.id))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "node_ids": [master.id] }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "guardrail_rejection");
}

#[tokio::test]
async fn unknown_cluster_returns_404() {
    let (app, _store, _dir) = app(vec![]);
    let response = app.oneshot(Request::builder().uri("/clusters/clus-doesnotexist").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uninstall_requires_matching_confirmation() {
    let (app, store, _dir) = app(vec![]);
    let cluster = store.insert_cluster(ClusterBuilder::default().name("prod").build()).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/jobs/uninstall/{}?confirmation=wrong-name", cluster.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
