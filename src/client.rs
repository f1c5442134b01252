//! The rewards service client. See [`ApiClient`].

use std::num::NonZeroU64;

use anyhow::Context;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use url::Url;

use crate::config::{AuthScheme, Config, Credential};

mod request;
pub use request::{Endpoint, Language, ServiceRequest};

mod response;
pub use response::{Fault, ServiceResult};

/// Query parameter carrying the API key under [`AuthScheme::SecretKey`].
const SECRET_KEY_PARAM: &str = "secret_key";

/// Authenticated client for the rewards service.
///
/// Owns a pooled HTTP client for its whole lifetime. Every operation makes exactly one attempt,
/// bounded by the configured timeout, and always yields a [`ServiceResult`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth: AuthScheme,
    credential: Credential,
    authorization: HeaderValue,
}

impl ApiClient {
    pub fn new(config: &Config, credential: Credential) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        let mut authorization = HeaderValue::from_str(credential.expose())
            .context("API key is not a valid header value")?;
        authorization.set_sensitive(true);

        // `Url::join` replaces the last segment unless the path ends in a slash
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(ApiClient {
            http,
            base_url,
            auth: config.auth,
            credential,
            authorization,
        })
    }

    pub async fn register_user(&self, user_id: &str) -> ServiceResult {
        self.call(ServiceRequest::register_user(user_id)).await
    }

    pub async fn get_user(&self, user_id: &str) -> ServiceResult {
        self.call(ServiceRequest::get_user(user_id)).await
    }

    pub async fn claim_daily(&self, user_id: &str) -> ServiceResult {
        self.call(ServiceRequest::claim_daily(user_id)).await
    }

    pub async fn activate_farm(&self, user_id: &str) -> ServiceResult {
        self.call(ServiceRequest::activate_farm(user_id)).await
    }

    pub async fn purchase_ad(
        &self,
        user_id: &str,
        coins: NonZeroU64,
        invite: &str,
        language: Language,
        alt_filter: bool,
    ) -> ServiceResult {
        self.call(ServiceRequest::purchase_ad(
            user_id, coins, invite, language, alt_filter,
        ))
        .await
    }

    pub async fn transfer_coins(
        &self,
        receiver_id: &str,
        donor_id: &str,
        coins: NonZeroU64,
    ) -> ServiceResult {
        self.call(ServiceRequest::transfer_coins(receiver_id, donor_id, coins))
            .await
    }

    pub async fn get_guild_info(&self, guild_id: &str) -> ServiceResult {
        self.call(ServiceRequest::get_guild_info(guild_id)).await
    }

    pub async fn can_leave_guild(&self, guild_id: &str, user_id: &str) -> ServiceResult {
        self.call(ServiceRequest::can_leave_guild(guild_id, user_id))
            .await
    }

    pub async fn list_leavable_guilds(&self, user_id: &str) -> ServiceResult {
        self.call(ServiceRequest::list_leavable_guilds(user_id)).await
    }

    /// Send a request and normalize whatever comes back.
    pub async fn call(&self, request: ServiceRequest) -> ServiceResult {
        let endpoint = request.endpoint();
        tracing::debug!(%endpoint, "calling rewards service");

        let result = match self.send(&request).await {
            Ok((status, body)) => ServiceResult::from_response(status, &body),
            // The alternate format prints the whole chain of causes.
            Err(e) => ServiceResult::transport(format!("{:#}", e)),
        };

        match result.fault() {
            Some(fault) => tracing::warn!(
                %endpoint,
                %fault,
                message = ?result.message(),
                raw = ?result.raw(),
                "rewards service call failed"
            ),
            None => tracing::debug!(%endpoint, success = result.is_success(), "rewards service answered"),
        }
        result
    }

    async fn send(&self, request: &ServiceRequest) -> anyhow::Result<(u16, String)> {
        let endpoint = request.endpoint();
        let url = self
            .base_url
            .join(endpoint.path())
            .with_context(|| format!("invalid endpoint path {endpoint}"))?;

        let builder = self.http.request(endpoint.method(self.auth), url);
        let builder = match self.auth {
            AuthScheme::Header => builder
                .header(AUTHORIZATION, self.authorization.clone())
                .json(request.payload()),
            AuthScheme::SecretKey => {
                let mut query = request.query_pairs();
                query.push((
                    SECRET_KEY_PARAM.to_string(),
                    self.credential.expose().to_string(),
                ));
                builder.query(&query)
            }
        };

        // Strip URLs from errors; under the secret-key scheme they contain the key.
        let response = builder
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("request to the rewards service failed")?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(reqwest::Error::without_url)
            .context("failed to read the rewards service response")?;

        Ok((status, body))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    use super::*;

    fn config(base_url: Url, auth: AuthScheme) -> Config {
        Config {
            base_url,
            auth,
            timeout: Duration::from_secs(5),
            ..Config::default()
        }
    }

    fn client(base_url: Url, auth: AuthScheme) -> ApiClient {
        ApiClient::new(&config(base_url, auth), Credential::new("test-key")).unwrap()
    }

    /// Whether `buf` holds a full HTTP/1.1 request (headers plus `content-length` bytes of body).
    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        buf.len() >= header_end + 4 + content_length
    }

    /// Answer exactly one request with a canned response, handing back what was received.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&received) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).into_owned()
        });
        let url = Url::parse(&format!("http://{addr}/api/v1")).unwrap();
        (url, handle)
    }

    #[tokio::test]
    async fn header_scheme_posts_json_with_authorization() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"success":true,"data":{"coins":25}}"#,
        )
        .await;

        let result = client(url, AuthScheme::Header).register_user("42").await;
        assert!(result.is_success());
        assert_eq!(result.field("coins"), Some(&serde_json::json!(25)));

        let received = server.await.unwrap();
        let lowered = received.to_ascii_lowercase();
        assert!(received.starts_with("POST /api/v1/user/create "));
        assert!(lowered.contains("authorization: test-key"));
        assert!(lowered.contains("content-type: application/json"));
        assert!(received.contains(r#"{"user_id":"42"}"#));
        assert!(!received.contains("secret_key"));
    }

    #[tokio::test]
    async fn secret_key_scheme_uses_the_query_string() {
        let (url, server) = serve_once("200 OK", r#"{"success":false}"#).await;

        let result = client(url, AuthScheme::SecretKey).get_user("42").await;
        assert!(!result.is_success());
        assert_eq!(result.fault(), None);

        let received = server.await.unwrap();
        let request_line = received.lines().next().unwrap();
        assert!(request_line.starts_with("GET /api/v1/user/get?"));
        assert!(request_line.contains("user_id=42"));
        assert!(request_line.contains("secret_key=test-key"));
        assert!(!received.to_ascii_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn html_error_page_is_a_failure_not_a_panic() {
        let (url, server) = serve_once(
            "502 Bad Gateway",
            "<html><body><h1>502 Bad Gateway</h1></body></html>",
        )
        .await;

        let result = client(url, AuthScheme::Header).claim_daily("42").await;
        server.await.unwrap();
        assert!(!result.is_success());
        assert_eq!(result.fault(), Some(Fault::Status(502)));
        assert!(result.raw().unwrap().contains("502 Bad Gateway"));
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/api/v1/")).unwrap();
        let result = client(url, AuthScheme::SecretKey).activate_farm("42").await;
        assert!(!result.is_success());
        assert_eq!(result.fault(), Some(Fault::Transport));
        // Errors are stripped of their URL, which would carry the key.
        assert!(!result.message().unwrap().contains("test-key"));
    }

    #[tokio::test]
    async fn stalled_service_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stall = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let config = Config {
            base_url: Url::parse(&format!("http://{addr}/")).unwrap(),
            timeout: Duration::from_millis(200),
            ..Config::default()
        };
        let client = ApiClient::new(&config, Credential::new("test-key")).unwrap();
        let result = client.list_leavable_guilds("42").await;
        assert_eq!(result.fault(), Some(Fault::Transport));
        stall.abort();
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_its_path() {
        let client = client(
            Url::parse("https://join4join.xyz/api/v1").unwrap(),
            AuthScheme::Header,
        );
        assert_eq!(
            client.base_url.join(Endpoint::CheckAll.path()).unwrap().as_str(),
            "https://join4join.xyz/api/v1/join4join/check/all"
        );
    }
}
