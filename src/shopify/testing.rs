//! Loopback Admin API stand-in for client and tool tests.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::{ShopifyClient, ShopifyConfig};

/// Serves one canned response per connection and records each request as
/// its request line (`METHOD /path?query HTTP/1.1`), a newline, then the body.
pub(crate) async fn fake_server(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for response in responses {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 8192];
            let header_end = loop {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break None;
                }
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break Some(pos + 4);
                }
            };
            let head = String::from_utf8_lossy(&request[..header_end.unwrap_or(request.len())]).to_string();
            let body_len = head
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if let Some(end) = header_end {
                while request.len() < end + body_len {
                    let n = sock.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
            }
            let body = header_end
                .map(|end| String::from_utf8_lossy(&request[end..]).to_string())
                .unwrap_or_default();
            seen.push(format!("{}\n{}", head.lines().next().unwrap_or_default(), body));
            sock.write_all(response.as_bytes()).await.unwrap();
            let _ = sock.shutdown().await;
        }
        seen
    });
    (format!("http://{addr}"), handle)
}

pub(crate) fn http_response(status: &str, extra_headers: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{extra_headers}\r\n{body}",
        body.len()
    )
}

pub(crate) fn ok_json(body: &str) -> String {
    http_response("200 OK", "", body)
}

/// Client pointed at `base` with every pause disabled.
pub(crate) fn test_client(base: String) -> ShopifyClient {
    let mut cfg = ShopifyConfig::new("shop.myshopify.com", "tok");
    cfg.base_url = Some(base);
    cfg.min_interval_ms = 0;
    cfg.backoff_ms = 1;
    cfg.page_delay_ms = 0;
    ShopifyClient::new(cfg).unwrap()
}
