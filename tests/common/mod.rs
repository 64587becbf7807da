//! Shared fixtures for integration tests.
#![allow(dead_code)]

use axum::{http::HeaderMap, http::StatusCode, routing::get, Router};
use sockcheck::types::Socket;
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub const LIST_JSON: &str = r#"{"sockets": [
    {"id": "ssh", "socket_name": "SSH", "host_name": "127.0.0.1", "port_tcp": 22},
    {"id": "web", "socket_name": "Web", "host_name": "http://127.0.0.1", "port_tcp": 8080,
     "expected_http_code_array": [200], "path_http": "/"}
]}"#;

/// Serve a small fixture app on an ephemeral port.
///
/// - `/ok` answers 200, `/fail` answers 500, `/created` answers 201
/// - `/sockets.json` returns [`LIST_JSON`] only with `x-token: secret`
pub async fn spawn_http_fixture() -> SocketAddr {
    let app = Router::new()
        .route("/ok", get(|| async { StatusCode::OK }))
        .route("/fail", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/created", get(|| async { StatusCode::CREATED }))
        .route(
            "/sockets.json",
            get(|headers: HeaderMap| async move {
                match headers.get("x-token").and_then(|v| v.to_str().ok()) {
                    Some("secret") => (StatusCode::OK, LIST_JSON),
                    _ => (StatusCode::UNAUTHORIZED, ""),
                }
            }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A listener that stays open for the life of the test.
pub async fn open_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// A port on 127.0.0.1 that nothing listens on.
pub async fn closed_port() -> u16 {
    let (listener, port) = open_listener().await;
    drop(listener);
    port
}

pub fn tcp_socket(id: &str, port: u16) -> Socket {
    Socket {
        id: id.into(),
        name: id.to_uppercase(),
        host: "127.0.0.1".into(),
        port,
        ..Socket::default()
    }
}

pub fn http_socket(id: &str, addr: SocketAddr, path: &str, codes: &[u16]) -> Socket {
    Socket {
        id: id.into(),
        name: id.to_uppercase(),
        host: format!("http://{}", addr.ip()),
        port: addr.port(),
        http_codes: codes.to_vec(),
        http_path: path.into(),
    }
}
