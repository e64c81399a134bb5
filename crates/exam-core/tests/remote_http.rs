use secrecy::SecretString;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use exam_core::remote::{HttpRemoteStore, RemoteStore};
use exam_core::ExamError;

#[derive(Debug)]
struct Recorded {
    method: String,
    path: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: String,
}

/// Answer exactly one request with `status` and `body`, recording it.
async fn respond_once(status: u16, body: &'static str) -> (String, JoinHandle<Recorded>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept should succeed");

        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.expect("read should succeed");
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut lines = head.lines();
        let request_line = lines.next().expect("request line");
        let mut parts = request_line.split_whitespace();
        let method = parts.next().expect("method").to_string();
        let path = parts.next().expect("path").to_string();

        let mut authorization = None;
        let mut content_type = None;
        let mut content_length = 0usize;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "authorization" => authorization = Some(value),
                "content-type" => content_type = Some(value),
                "content-length" => content_length = value.parse().expect("content length"),
                _ => {}
            }
        }

        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.expect("read should succeed");
            assert!(n > 0, "client closed before sending body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let request_body =
            String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string();

        let response = format!(
            "HTTP/1.1 {} Test\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write should succeed");
        socket.shutdown().await.ok();

        Recorded {
            method,
            path,
            authorization,
            content_type,
            body: request_body,
        }
    });

    (format!("http://{}", addr), handle)
}

fn token() -> SecretString {
    SecretString::from("s3cret-token".to_string())
}

#[tokio::test]
async fn test_get_sends_bearer_and_returns_body() {
    let (base, server) = respond_once(200, r#"[{"id":"p1"}]"#).await;
    let store = HttpRemoteStore::new(base).expect("client should build");

    let value = store.get("exam-papers", &token()).await.expect("get should succeed");
    let recorded = server.await.expect("server task");

    assert_eq!(value.as_deref(), Some(r#"[{"id":"p1"}]"#));
    assert_eq!(recorded.method, "GET");
    assert_eq!(recorded.path, "/exam-papers");
    assert_eq!(recorded.authorization.as_deref(), Some("Bearer s3cret-token"));
    assert_eq!(recorded.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_get_missing_key_is_none() {
    for (status, body) in [(404, "Not Found"), (200, "")] {
        let (base, server) = respond_once(status, body).await;
        let store = HttpRemoteStore::new(base).expect("client should build");

        let value = store.get("absent", &token()).await.expect("get should succeed");
        server.await.expect("server task");

        assert_eq!(value, None, "status {}", status);
    }
}

#[tokio::test]
async fn test_put_sends_raw_body() {
    let (base, server) = respond_once(200, "Success").await;
    let store = HttpRemoteStore::new(base).expect("client should build");

    store
        .put("exam-folders", r#"{"keys":["exam-papers"]}"#, &token())
        .await
        .expect("put should succeed");
    let recorded = server.await.expect("server task");

    assert_eq!(recorded.method, "PUT");
    assert_eq!(recorded.path, "/exam-folders");
    assert_eq!(recorded.body, r#"{"keys":["exam-papers"]}"#);
    assert_eq!(recorded.authorization.as_deref(), Some("Bearer s3cret-token"));
}

#[tokio::test]
async fn test_delete_uses_delete_method() {
    let (base, server) = respond_once(200, "Deleted").await;
    let store = HttpRemoteStore::new(base).expect("client should build");

    store.delete("exam-papers-old", &token()).await.expect("delete should succeed");
    let recorded = server.await.expect("server task");

    assert_eq!(recorded.method, "DELETE");
    assert_eq!(recorded.path, "/exam-papers-old");
}

#[tokio::test]
async fn test_401_is_unauthorized() {
    let (base, server) = respond_once(401, "Invalid or Missing Token").await;
    let store = HttpRemoteStore::new(base).expect("client should build");

    let result = store.put("exam-papers", "[]", &token()).await;
    server.await.expect("server task");

    assert!(matches!(result, Err(ExamError::Unauthorized)));
}

#[tokio::test]
async fn test_other_failure_is_remote_error() {
    let (base, server) = respond_once(500, "worker exploded").await;
    let store = HttpRemoteStore::new(base).expect("client should build");

    let result = store.get("exam-papers", &token()).await;
    server.await.expect("server task");

    match result {
        Err(ExamError::Remote { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "worker exploded");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let store = HttpRemoteStore::new(format!("http://{}", addr)).expect("client should build");
    let result = store.get("exam-papers", &token()).await;

    assert!(matches!(result, Err(ExamError::Network(_))));
}
