//! In-process HTTP server answering canned JSON by request-target prefix.

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub(crate) struct CapturedRequest {
    pub target: String,
    pub authorization: Option<String>,
}

async fn read_request_head(stream: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buffer = Vec::new();
    loop {
        let mut chunk = [0_u8; 2048];
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") {
            return Some(String::from_utf8_lossy(&buffer).to_string());
        }
    }
}

fn capture(head: &str) -> CapturedRequest {
    let mut lines = head.lines();
    let target = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();
    let authorization = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("authorization"))
        .map(|(_, value)| value.trim().to_string());
    CapturedRequest {
        target,
        authorization,
    }
}

/// Serves `routes` as `(target prefix, status, body)`; the first matching
/// prefix wins and unmatched requests get a 500.
pub(crate) async fn start(
    routes: Vec<(&'static str, u16, String)>,
) -> (String, Arc<Mutex<Vec<CapturedRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let captured = Arc::new(Mutex::new(Vec::new()));
    let routes = Arc::new(routes);
    let captured_clone = Arc::clone(&captured);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let captured = Arc::clone(&captured_clone);
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let Some(head) = read_request_head(&mut stream).await else {
                    return;
                };
                let request = capture(&head);
                let (status, body) = routes
                    .iter()
                    .find(|(prefix, _, _)| request.target.starts_with(prefix))
                    .map(|(_, status, body)| (*status, body.clone()))
                    .unwrap_or((500, r#"{"error":"unexpected request"}"#.to_string()));
                captured.lock().await.push(request);
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.flush().await;
            });
        }
    });

    (format!("http://{}", addr), captured)
}
