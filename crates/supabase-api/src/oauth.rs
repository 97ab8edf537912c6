//! OAuth callback server for browser-based authentication.

use crate::auth::OAuthProvider;
use crate::error::{SupabaseError, SupabaseResult};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

/// Default OAuth callback port.
pub const DEFAULT_OAUTH_PORT: u16 = 9421;

/// Default OAuth timeout in seconds.
pub const DEFAULT_OAUTH_TIMEOUT_SECS: u64 = 120;

/// OAuth callback result.
#[derive(Debug, Clone)]
pub struct OAuthResult {
    /// Whether authentication succeeded.
    pub success: bool,
    /// Access token (if successful).
    pub access_token: Option<String>,
    /// Refresh token (if successful).
    pub refresh_token: Option<String>,
    /// User ID (if successful).
    pub user_id: Option<String>,
    /// User email (if successful).
    pub email: Option<String>,
    /// Expiration time in seconds (if successful).
    pub expires_in: Option<i64>,
    /// Error message (if failed).
    pub error: Option<String>,
}

impl OAuthResult {
    /// Create a successful result.
    pub fn success(
        access_token: String,
        refresh_token: String,
        user_id: String,
        email: Option<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            success: true,
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            user_id: Some(user_id),
            email,
            expires_in: Some(expires_in),
            error: None,
        }
    }

    /// Create a failed result.
    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            access_token: None,
            refresh_token: None,
            user_id: None,
            email: None,
            expires_in: None,
            error: Some(error),
        }
    }
}

/// OAuth callback server that listens for the authentication redirect.
pub struct OAuthCallbackServer {
    port: u16,
    timeout_secs: u64,
}

impl OAuthCallbackServer {
    /// Create a new OAuth callback server.
    pub fn new(port: u16, timeout_secs: u64) -> Self {
        Self { port, timeout_secs }
    }

    /// Create with default settings.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_OAUTH_PORT, DEFAULT_OAUTH_TIMEOUT_SECS)
    }

    /// Get the callback URL for this server.
    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Get the GoTrue authorize URL that starts the flow for a provider,
    /// redirecting back to this server.
    pub fn authorize_url(&self, api_url: &str, provider: OAuthProvider) -> String {
        let callback = self.callback_url();
        let encoded_callback = urlencoding_encode(&callback);
        format!(
            "{}/auth/v1/authorize?provider={}&redirect_to={}",
            api_url,
            provider.as_str(),
            encoded_callback
        )
    }

    /// Start the server and wait for the OAuth callback.
    ///
    /// This method will:
    /// 1. Start a local HTTP server on the configured port
    /// 2. Wait for a callback request with auth tokens
    /// 3. Return the result and shut down the server
    ///
    /// The caller is responsible for opening the browser to the authorize URL.
    pub async fn wait_for_callback(&self) -> SupabaseResult<OAuthResult> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| SupabaseError::OAuth(format!("Failed to bind to {}: {}", addr, e)))?;

        info!(port = self.port, "OAuth callback server listening");

        let (tx, rx) = oneshot::channel::<OAuthResult>();
        let tx = Arc::new(tokio::sync::Mutex::new(Some(tx)));

        // Spawn the server task
        let server_handle = tokio::spawn({
            let tx = tx.clone();
            async move {
                loop {
                    match listener.accept().await {
                        Ok((mut socket, _)) => {
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(&mut socket, tx).await {
                                    error!("Error handling connection: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        // Wait for result with timeout
        let timeout = tokio::time::Duration::from_secs(self.timeout_secs);
        let result = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => OAuthResult::failure("Internal error: channel closed".to_string()),
            Err(_) => OAuthResult::failure("OAuth timeout".to_string()),
        };

        // Abort the server
        server_handle.abort();

        Ok(result)
    }
}

/// Handle an incoming HTTP connection.
async fn handle_connection(
    socket: &mut tokio::net::TcpStream,
    tx: Arc<tokio::sync::Mutex<Option<oneshot::Sender<OAuthResult>>>>,
) -> SupabaseResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.trim(), "Received request");

    // Parse the request line: GET /callback?... HTTP/1.1
    if !request_line.starts_with("GET ") {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(());
    }

    let path_end = request_line.find(" HTTP/").unwrap_or(request_line.len());
    let path = &request_line[4..path_end];

    if !path.starts_with("/callback") {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(());
    }

    // Parse query parameters
    let query = if let Some(idx) = path.find('?') {
        &path[idx + 1..]
    } else {
        ""
    };

    let params: std::collections::HashMap<String, String> = query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.to_string();
            let value = parts.next().unwrap_or("").to_string();
            Some((key, urlencoding_decode(&value)))
        })
        .collect();

    let access_token = params.get("access_token").cloned();
    let refresh_token = params.get("refresh_token").cloned();
    let user_id = params.get("user_id").cloned();
    let email = params.get("email").cloned();
    let expires_in = params.get("expires_in").and_then(|s| s.parse().ok());
    let error = params.get("error").cloned();

    // Build result
    let result = if let Some(err) = error {
        send_response(&mut writer, 200, "OK", &error_page(&err)).await?;
        OAuthResult::failure(err)
    } else if let (Some(token), Some(refresh), Some(uid)) = (access_token, refresh_token, user_id) {
        send_response(&mut writer, 200, "OK", &success_page()).await?;
        OAuthResult::success(token, refresh, uid, email, expires_in.unwrap_or(3600))
    } else {
        send_response(
            &mut writer,
            200,
            "OK",
            &error_page("Missing required parameters"),
        )
        .await?;
        OAuthResult::failure("Missing required parameters".to_string())
    };

    // Send result through channel
    if let Some(tx) = tx.lock().await.take() {
        let _ = tx.send(result);
    }

    Ok(())
}

/// Send an HTTP response.
async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> SupabaseResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Generate success page HTML.
fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>channeldir - Sign-in Successful</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px; background: #f5f5f5;">
<div style="max-width: 400px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">
<h1 style="color: #22c55e; margin-bottom: 20px;">Signed In!</h1>
<p style="color: #666;">You can close this window and return to channeldir.</p>
</div>
<script>setTimeout(() => window.close(), 2000);</script>
</body>
</html>"#
        .to_string()
}

/// Generate error page HTML.
fn error_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>channeldir - Sign-in Failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px; background: #f5f5f5;">
<div style="max-width: 400px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">
<h1 style="color: #ef4444; margin-bottom: 20px;">Sign-in Failed</h1>
<p style="color: #666;">Error: {}</p>
<p style="color: #888; font-size: 14px;">You can close this window and try again.</p>
</div>
</body>
</html>"#,
        error
    )
}

/// Simple URL encoding.
fn urlencoding_encode(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => result.push(c),
            _ => {
                for byte in c.to_string().as_bytes() {
                    result.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    result
}

/// Simple URL decoding.
fn urlencoding_decode(s: &str) -> String {
    let mut result = Vec::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                result.push(byte);
            }
        } else if c == '+' {
            result.push(b' ');
        } else {
            result.push(c as u8);
        }
    }

    String::from_utf8_lossy(&result).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url() {
        let server = OAuthCallbackServer::new(9421, 120);
        assert_eq!(server.callback_url(), "http://localhost:9421/callback");
    }

    #[test]
    fn test_authorize_url() {
        let server = OAuthCallbackServer::new(9421, 120);
        let url = server.authorize_url("https://project.supabase.co", OAuthProvider::Google);
        assert!(url.starts_with("https://project.supabase.co/auth/v1/authorize?provider=google"));
        assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A9421%2Fcallback"));
    }

    #[test]
    fn test_authorize_url_github() {
        let server = OAuthCallbackServer::with_defaults();
        let url = server.authorize_url("https://project.supabase.co", OAuthProvider::Github);
        assert!(url.contains("provider=github"));
    }

    #[test]
    fn test_urlencoding() {
        let encoded = urlencoding_encode("http://localhost:9421/callback");
        assert_eq!(encoded, "http%3A%2F%2Flocalhost%3A9421%2Fcallback");

        let decoded = urlencoding_decode("http%3A%2F%2Flocalhost%3A9421%2Fcallback");
        assert_eq!(decoded, "http://localhost:9421/callback");
    }

    #[test]
    fn test_urlencoding_decode_plus() {
        assert_eq!(urlencoding_decode("hello+world"), "hello world");
    }

    #[test]
    fn test_oauth_result_success() {
        let result = OAuthResult::success(
            "access".to_string(),
            "refresh".to_string(),
            "user123".to_string(),
            Some("user@example.com".to_string()),
            3600,
        );
        assert!(result.success);
        assert_eq!(result.access_token, Some("access".to_string()));
        assert_eq!(result.user_id, Some("user123".to_string()));
        assert_eq!(result.email, Some("user@example.com".to_string()));
        assert_eq!(result.expires_in, Some(3600));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_oauth_result_failure() {
        let result = OAuthResult::failure("access_denied".to_string());
        assert!(!result.success);
        assert!(result.access_token.is_none());
        assert!(result.refresh_token.is_none());
        assert!(result.expires_in.is_none());
        assert_eq!(result.error, Some("access_denied".to_string()));
    }

    #[test]
    fn test_callback_url_with_different_ports() {
        let server1 = OAuthCallbackServer::new(DEFAULT_OAUTH_PORT, DEFAULT_OAUTH_TIMEOUT_SECS);
        assert_eq!(server1.callback_url(), "http://localhost:9421/callback");

        let server2 = OAuthCallbackServer::new(8080, 60);
        assert_eq!(server2.callback_url(), "http://localhost:8080/callback");
    }

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_OAUTH_PORT, 9421);
        assert_eq!(DEFAULT_OAUTH_TIMEOUT_SECS, 120);
    }

    async fn send_callback_request(port: u16, path_and_query: &str) -> String {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpStream;

        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path_and_query);
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).to_string()
    }

    #[tokio::test]
    async fn callback_roundtrip_delivers_tokens() {
        let server = OAuthCallbackServer::new(39421, 5);
        let wait = tokio::spawn(async move { server.wait_for_callback().await });

        // Give the listener time to bind
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let response = send_callback_request(
            39421,
            "/callback?access_token=at&refresh_token=rt&user_id=u1&expires_in=7200",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        let result = wait.await.unwrap().unwrap();
        assert!(result.success);
        assert_eq!(result.access_token.as_deref(), Some("at"));
        assert_eq!(result.refresh_token.as_deref(), Some("rt"));
        assert_eq!(result.user_id.as_deref(), Some("u1"));
        assert_eq!(result.expires_in, Some(7200));
    }

    #[tokio::test]
    async fn callback_error_param_fails_flow() {
        let server = OAuthCallbackServer::new(39422, 5);
        let wait = tokio::spawn(async move { server.wait_for_callback().await });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let response = send_callback_request(39422, "/callback?error=access_denied").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        let result = wait.await.unwrap().unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("access_denied"));
    }

    #[tokio::test]
    async fn callback_missing_params_fails_flow() {
        let server = OAuthCallbackServer::new(39423, 5);
        let wait = tokio::spawn(async move { server.wait_for_callback().await });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let _ = send_callback_request(39423, "/callback?access_token=at").await;

        let result = wait.await.unwrap().unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Missing required parameters"));
    }

    #[tokio::test]
    async fn callback_times_out_without_redirect() {
        let server = OAuthCallbackServer::new(39424, 1);
        let result = server.wait_for_callback().await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("OAuth timeout"));
    }
}
