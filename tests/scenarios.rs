// tests/scenarios.rs
#![cfg(unix)]

//! End-to-end runs of the whole supervisor against real shell commands.

mod common;
use crate::common::{free_port, get, init_tracing, spawn_app};

use std::fs;
use std::time::Duration;

use http::StatusCode;
use tokio::time::timeout;

use relaunch::config::Config;
use relaunch::engine::ShutdownHandle;
use relaunch::Supervisor;
use relaunch_test_utils::builders::ConfigBuilder;

struct Running {
    addr: std::net::SocketAddr,
    shutdown: ShutdownHandle,
    handle: tokio::task::JoinHandle<Result<(), relaunch::errors::RelaunchError>>,
}

async fn launch(config: &Config, command: &str, root: &std::path::Path) -> Running {
    init_tracing();
    let supervisor = Supervisor::start(config, command.to_string(), root.to_path_buf())
        .await
        .unwrap();
    let addr = supervisor.local_addr();
    let shutdown = supervisor.shutdown_handle();
    let handle = tokio::spawn(supervisor.run());
    Running {
        addr,
        shutdown,
        handle,
    }
}

impl Running {
    async fn stop(self) {
        self.shutdown.stop().await;
        timeout(Duration::from_secs(5), self.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

fn ports() -> (u16, u16) {
    (free_port(), free_port())
}

#[tokio::test]
async fn first_request_waits_for_the_app_to_bind() {
    let dir = tempfile::tempdir().unwrap();
    let (app_port, proxy_port) = ports();
    let config = ConfigBuilder::new()
        .with_ports(app_port, proxy_port)
        .with_app_host("127.0.0.1")
        .with_timeout(10)
        .build();

    let running = launch(&config, "sleep 100", dir.path()).await;

    let addr = running.addr;
    let request = tokio::spawn(async move { get(addr, "/").await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!request.is_finished());
    let _app = spawn_app(app_port, StatusCode::OK, "up").await;

    let (status, body) = request.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "up");

    running.stop().await;
}

#[tokio::test]
async fn build_error_is_shown_then_fixed_source_is_served() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("build.sh"),
        "if grep -q broken main.src; then echo 'main.src:1: unexpected token' >&2; exit 1; fi\n",
    )
    .unwrap();
    fs::write(dir.path().join("main.src"), "broken").unwrap();

    let (app_port, proxy_port) = ports();
    let config = ConfigBuilder::new()
        .with_build("sh build.sh")
        .with_ports(app_port, proxy_port)
        .with_app_host("127.0.0.1")
        .with_timeout(10)
        .build();
    let _app = spawn_app(app_port, StatusCode::OK, "built and running").await;

    let running = launch(&config, "sleep 100", dir.path()).await;

    let (status, body) = get(running.addr, "/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "main.src:1: unexpected token\n");

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(dir.path().join("main.src"), "fixed").unwrap();

    let (status, body) = get(running.addr, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "built and running");
    assert!(dir.path().join("tmp").is_dir());

    running.stop().await;
}

#[tokio::test]
async fn slow_starting_app_is_reached_within_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let (app_port, proxy_port) = ports();
    let config = ConfigBuilder::new()
        .with_ports(app_port, proxy_port)
        .with_app_host("127.0.0.1")
        .with_timeout(10)
        .build();

    let running = launch(&config, "sleep 100", dir.path()).await;

    let addr = running.addr;
    let request = tokio::spawn(async move { get(addr, "/slow").await });

    tokio::time::sleep(Duration::from_secs(2)).await;
    let _app = spawn_app(app_port, StatusCode::OK, "slow but fine").await;

    let (status, body) = timeout(Duration::from_secs(10), request).await.unwrap().unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "slow but fine");

    running.stop().await;
}
