use anyhow::anyhow;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::error::Error as StdError;
use std::io::ErrorKind;

fn error_chain_has_kind(
    err: &(dyn StdError + 'static),
    kind: ErrorKind,
    needle: &str,
) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_has_kind(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_has_kind(err, ErrorKind::TimedOut, "timed out")
}

/// Turns a transport failure into a message that names the setting to fix.
pub(crate) fn api_request_error(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: u64,
) -> anyhow::Error {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        return anyhow!(
            "Request timed out after {}s while calling '{}'. \
             Increase SLP_HTTP_TIMEOUT_SECS or check service responsiveness.",
            timeout_secs,
            api_url
        );
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(&err) {
            return anyhow!(
                "Connection refused by '{}'. \
                 Ensure the service is reachable and SLP_ENDPOINT is correct.",
                api_url
            );
        }

        return anyhow!(
            "Failed to connect to '{}'. Check SLP_ENDPOINT and network connectivity.",
            api_url
        );
    }

    anyhow!("Failed to call '{}': {}", api_url, err)
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "<empty response body>".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

pub(crate) async fn api_status_error(api_url: &str, response: Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read response body>".to_string());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "Request to '{}' was rejected with status {}: {}. Run `smartloop login` again.",
            api_url,
            status,
            describe_error_body(&body)
        );
    }

    anyhow!(
        "Request to '{}' failed with status {}: {}",
        api_url,
        status,
        describe_error_body(&body)
    )
}

#[cfg(test)]
mod tests {
    use super::{api_request_error, describe_error_body, error_chain_has_timeout};
    use reqwest::Client;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn free_local_addr() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn maps_connection_refused_errors_to_actionable_message() {
        let addr = free_local_addr();
        let api_url = format!("http://{}/users/me", addr);
        let client = Client::builder()
            .timeout(Duration::from_millis(300))
            .build()
            .expect("client should build");

        let req_err = client
            .get(&api_url)
            .send()
            .await
            .expect_err("request should fail with connection-refused");
        let mapped = api_request_error(req_err, &api_url, 1);
        let msg = format!("{mapped:#}");

        assert!(msg.contains("Connection refused"), "unexpected message: {msg}");
        assert!(msg.contains("SLP_ENDPOINT"), "unexpected message: {msg}");
    }

    #[tokio::test]
    async fn maps_timeout_errors_to_actionable_message() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        let server = thread::spawn(move || {
            let (_stream, _) = listener.accept().expect("accept should succeed");
            thread::sleep(Duration::from_secs(1));
        });

        let api_url = format!("http://{}/users/me", addr);
        let client = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("client should build");

        let req_err = client
            .get(&api_url)
            .send()
            .await
            .expect_err("request should fail with timeout");
        let mapped = api_request_error(req_err, &api_url, 2);
        let msg = format!("{mapped:#}");

        assert!(msg.contains("timed out after 2s"), "unexpected message: {msg}");
        assert!(
            msg.contains("SLP_HTTP_TIMEOUT_SECS"),
            "unexpected message: {msg}"
        );

        server.join().expect("server thread should join");
    }

    #[test]
    fn detects_timeout_from_error_kind() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        assert!(error_chain_has_timeout(&err));
    }

    #[test]
    fn describe_error_body_prefers_detail_field() {
        assert_eq!(
            describe_error_body(r#"{"detail":"File type not supported"}"#),
            "File type not supported"
        );
        assert_eq!(
            describe_error_body(r#"{"detail":[{"msg":"field required"}]}"#),
            r#"[{"msg":"field required"}]"#
        );
        assert_eq!(describe_error_body("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(describe_error_body(""), "<empty response body>");
    }
}
