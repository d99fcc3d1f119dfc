//! GitHub OAuth device flow.
//!
//! 1. Request a device code and show the user code plus verification URL
//! 2. Poll the token endpoint until the user approves, denies, or the code expires
//!
//! Polling checks the cancellation token before every attempt and while
//! waiting between attempts.

use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::AuthError;

pub const DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
pub const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SCOPE: &str = "repo";
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

fn default_interval() -> u64 {
    5
}

fn default_expires_in() -> u64 {
    900
}

/// Device code issued by GitHub for one login attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Minimum seconds between poll attempts
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

/// How a login attempt ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authorized(String),
    Cancelled,
}

#[derive(Debug)]
enum PollStatus {
    Token(String),
    Pending,
    SlowDown,
    Failed(AuthError),
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn interpret_poll_response(body: &str) -> PollStatus {
    let response: TokenResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => return PollStatus::Failed(AuthError::InvalidResponse(e)),
    };

    if let Some(token) = response.access_token.filter(|t| !t.is_empty()) {
        return PollStatus::Token(token);
    }

    match response.error.as_deref() {
        Some("authorization_pending") => PollStatus::Pending,
        Some("slow_down") => PollStatus::SlowDown,
        Some("expired_token") => PollStatus::Failed(AuthError::Expired),
        Some("access_denied") => PollStatus::Failed(AuthError::Denied),
        Some(other) => PollStatus::Failed(AuthError::Provider(
            response
                .error_description
                .unwrap_or_else(|| other.to_string()),
        )),
        None => PollStatus::Failed(AuthError::Provider(
            "token response had neither a token nor an error".to_string(),
        )),
    }
}

pub struct DeviceFlow {
    http: reqwest::Client,
    client_id: String,
    device_code_url: String,
    token_url: String,
}

impl DeviceFlow {
    pub fn new(client_id: impl Into<String>) -> Result<Self, AuthError> {
        Self::with_endpoints(client_id, DEVICE_CODE_URL, TOKEN_URL)
    }

    pub fn with_endpoints(
        client_id: impl Into<String>,
        device_code_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder().user_agent("pr-helper").build()?;
        Ok(Self {
            http,
            client_id: client_id.into(),
            device_code_url: device_code_url.into(),
            token_url: token_url.into(),
        })
    }

    #[instrument(skip(self))]
    pub async fn request_code(&self) -> Result<DeviceCode, AuthError> {
        let response = self
            .http
            .post(&self.device_code_url)
            .header(ACCEPT, "application/json")
            .form(&[("client_id", self.client_id.as_str()), ("scope", SCOPE)])
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        let code: DeviceCode = serde_json::from_str(&body)?;
        debug!(interval = code.interval, expires_in = code.expires_in, "received device code");
        Ok(code)
    }

    /// Poll until the user finishes authorizing, the code expires, or
    /// `cancel` fires.
    #[instrument(skip(self, code, cancel))]
    pub async fn poll_for_token(
        &self,
        code: &DeviceCode,
        cancel: &CancellationToken,
    ) -> Result<LoginOutcome, AuthError> {
        let http = &self.http;
        let url = self.token_url.as_str();
        let form = [
            ("client_id", self.client_id.as_str()),
            ("device_code", code.device_code.as_str()),
            ("grant_type", GRANT_TYPE),
        ];
        let form = &form;

        poll_until_done(code, cancel, move || async move {
            let body = http
                .post(url)
                .header(ACCEPT, "application/json")
                .form(form)
                .send()
                .await?
                .text()
                .await?;
            Ok::<_, AuthError>(body)
        })
        .await
    }
}

/// Drive the poll schedule. `fetch` performs one token request and returns
/// the raw response body.
async fn poll_until_done<F, Fut>(
    code: &DeviceCode,
    cancel: &CancellationToken,
    mut fetch: F,
) -> Result<LoginOutcome, AuthError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, AuthError>>,
{
    let deadline = Instant::now() + Duration::from_secs(code.expires_in);
    let mut interval = Duration::from_secs(code.interval.max(1));

    loop {
        if cancel.is_cancelled() {
            info!("device flow cancelled");
            return Ok(LoginOutcome::Cancelled);
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("device flow cancelled");
                return Ok(LoginOutcome::Cancelled);
            }
            _ = tokio::time::sleep(interval) => {}
        }

        if Instant::now() >= deadline {
            return Err(AuthError::Expired);
        }

        match interpret_poll_response(&fetch().await?) {
            PollStatus::Token(token) => return Ok(LoginOutcome::Authorized(token)),
            PollStatus::Pending => debug!("authorization pending"),
            PollStatus::SlowDown => {
                interval += SLOW_DOWN_STEP;
                debug!(interval_secs = interval.as_secs(), "slowing down polling");
            }
            PollStatus::Failed(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn code(interval: u64) -> DeviceCode {
        DeviceCode {
            device_code: "dev".to_string(),
            user_code: "ABCD-1234".to_string(),
            verification_uri: "https://github.com/login/device".to_string(),
            interval,
            expires_in: 900,
        }
    }

    #[test]
    fn test_device_code_defaults() {
        let code: DeviceCode = serde_json::from_str(
            r#"{"device_code": "d", "user_code": "U", "verification_uri": "https://github.com/login/device"}"#,
        )
        .unwrap();
        assert_eq!(code.interval, 5);
        assert_eq!(code.expires_in, 900);
    }

    #[test]
    fn test_interpret_poll_response() {
        assert!(matches!(
            interpret_poll_response(r#"{"access_token": "gho_x", "token_type": "bearer", "scope": "repo"}"#),
            PollStatus::Token(ref t) if t == "gho_x"
        ));
        assert!(matches!(
            interpret_poll_response(r#"{"error": "authorization_pending"}"#),
            PollStatus::Pending
        ));
        assert!(matches!(
            interpret_poll_response(r#"{"error": "slow_down", "interval": 10}"#),
            PollStatus::SlowDown
        ));
        assert!(matches!(
            interpret_poll_response(r#"{"error": "expired_token"}"#),
            PollStatus::Failed(AuthError::Expired)
        ));
        assert!(matches!(
            interpret_poll_response(r#"{"error": "access_denied"}"#),
            PollStatus::Failed(AuthError::Denied)
        ));
        assert!(matches!(
            interpret_poll_response(r#"{"error": "incorrect_client_credentials", "error_description": "bad client"}"#),
            PollStatus::Failed(AuthError::Provider(ref m)) if m == "bad client"
        ));
        assert!(matches!(
            interpret_poll_response("<html>"),
            PollStatus::Failed(AuthError::InvalidResponse(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_backs_off_until_token() {
        let mut responses = VecDeque::from([
            r#"{"error": "authorization_pending"}"#,
            r#"{"error": "slow_down"}"#,
            r#"{"access_token": "gho_done", "token_type": "bearer"}"#,
        ]);
        let mut calls = 0;
        let started = Instant::now();

        let outcome = poll_until_done(&code(1), &CancellationToken::new(), || {
            calls += 1;
            let body = responses.pop_front().unwrap_or_default().to_string();
            async move { Ok::<_, AuthError>(body) }
        })
        .await
        .unwrap();

        assert_eq!(outcome, LoginOutcome::Authorized("gho_done".to_string()));
        assert_eq!(calls, 3);
        // 1s, 1s, then 1s + 5s after slow_down
        assert!(started.elapsed() >= Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_at_expiry() {
        let mut short = code(1);
        short.expires_in = 3;
        let mut calls = 0;

        let result = poll_until_done(&short, &CancellationToken::new(), || {
            calls += 1;
            async { Ok::<_, AuthError>(r#"{"error": "authorization_pending"}"#.to_string()) }
        })
        .await;

        assert!(matches!(result, Err(AuthError::Expired)));
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_surfaces_denial() {
        let result = poll_until_done(&code(1), &CancellationToken::new(), || async {
            Ok::<_, AuthError>(r#"{"error": "access_denied"}"#.to_string())
        })
        .await;
        assert!(matches!(result, Err(AuthError::Denied)));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_poll() {
        // Unroutable endpoints: a request would fail, so success proves none was made.
        let flow = DeviceFlow::with_endpoints("client", "http://127.0.0.1:9/code", "http://127.0.0.1:9/token").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = flow.poll_for_token(&code(1), &cancel).await.unwrap();
        assert_eq!(outcome, LoginOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting() {
        let flow = DeviceFlow::with_endpoints("client", "http://127.0.0.1:9/code", "http://127.0.0.1:9/token").unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = flow.poll_for_token(&code(60), &cancel).await.unwrap();
        assert_eq!(outcome, LoginOutcome::Cancelled);
    }
}
