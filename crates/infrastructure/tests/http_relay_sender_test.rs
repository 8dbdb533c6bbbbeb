use anyhow::Result;
use notifier_config::ChannelEndpointConfig;
use notifier_domain::{ChannelKind, ChannelSender};
use notifier_errors::NotifierError;
use notifier_infrastructure::channels::HttpRelaySender;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// 接受一个请求，返回固定响应，并把收到的原始请求交还给测试
async fn relay_stub(status_line: &'static str, body: &'static str) -> Result<(String, JoinHandle<String>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let endpoint = format!("http://{}/v1/messages", listener.local_addr()?);

    let handle = tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return String::new();
        };

        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let Ok(n) = socket.read(&mut buf).await else { break };
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request_complete(&request) {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&request).into_owned()
    });

    Ok((endpoint, handle))
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    request.len() >= header_end + 4 + content_length
}

fn config(endpoint: String) -> ChannelEndpointConfig {
    ChannelEndpointConfig {
        endpoint,
        api_key: "relay-key".to_string(),
        sender: Some("+15550000000".to_string()),
        subject: None,
    }
}

#[tokio::test]
async fn test_successful_send_returns_message_id() -> Result<()> {
    let (endpoint, server) = relay_stub("200 OK", r#"{"id":"msg-42"}"#).await?;
    let sender = HttpRelaySender::new(ChannelKind::Sms, config(endpoint));

    let receipt = sender
        .send("+15550001111", ChannelKind::Sms, "We are live!")
        .await?;
    assert_eq!(receipt.provider_message_id.as_deref(), Some("msg-42"));

    let request = server.await?;
    assert!(request.starts_with("POST /v1/messages"));
    assert!(request
        .to_ascii_lowercase()
        .contains("authorization: bearer relay-key"));
    assert!(request.contains(r#""to":"+15550001111""#));
    assert!(request.contains(r#""channel":"sms""#));
    assert!(request.contains(r#""body":"We are live!""#));
    Ok(())
}

#[tokio::test]
async fn test_rejection_carries_relay_message() -> Result<()> {
    let (endpoint, server) =
        relay_stub("429 Too Many Requests", r#"{"message":"rate limited"}"#).await?;
    let sender = HttpRelaySender::new(ChannelKind::Whatsapp, config(endpoint));

    let err = sender
        .send("+15550001111", ChannelKind::Whatsapp, "hi")
        .await
        .unwrap_err();
    server.await?;

    assert!(matches!(err, NotifierError::Delivery(_)));
    assert_eq!(err.failure_reason(), "rate limited");
    Ok(())
}

#[tokio::test]
async fn test_rejection_without_message_uses_status() -> Result<()> {
    let (endpoint, server) = relay_stub("500 Internal Server Error", "oops").await?;
    let sender = HttpRelaySender::new(ChannelKind::Email, config(endpoint));

    let err = sender
        .send("ada@example.com", ChannelKind::Email, "hi")
        .await
        .unwrap_err();
    server.await?;

    assert!(err.failure_reason().contains("500"), "{}", err.failure_reason());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_relay_is_network_error() -> Result<()> {
    // 绑定后立即释放端口，连接会被拒绝
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let endpoint = format!("http://{}/v1/messages", listener.local_addr()?);
    drop(listener);

    let sender = HttpRelaySender::new(ChannelKind::Sms, config(endpoint));
    let err = sender
        .send("+15550001111", ChannelKind::Sms, "hi")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        NotifierError::Network(_) | NotifierError::Timeout(_)
    ));
    assert!(err.is_retryable());
    Ok(())
}
