//! Exchange client backed by an external helper program.
//!
//! The helper receives one JSON request on stdin:
//!
//! ```json
//! {"AccessKeyId": "...", "SecretAccessKey": "...", "DurationSeconds": 900,
//!  "SerialNumber": null, "TokenCode": null}
//! ```
//!
//! On success it exits with status 0 and prints a `credential_process`
//! style object (`AccessKeyId`, `SecretAccessKey`, `SessionToken`,
//! `Expiration`). On failure it exits non-zero and may print
//! `{"code": "...", "message": "..."}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sessionforge_core::{
    ExchangeClient, ExchangeError, ExchangeOutput, ExchangeSession, Secret, SessionError,
    SessionTokenRequest, StaticCredentials,
};
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct HelperRequest<'a> {
    access_key_id: &'a str,
    secret_access_key: &'a Secret,
    duration_seconds: u64,
    serial_number: Option<&'a str>,
    token_code: Option<&'a Secret>,
}

#[derive(Deserialize)]
struct HelperFailure {
    code: String,
    #[serde(default)]
    message: String,
}

/// Runs a helper program for every exchange.
#[derive(Debug, Clone)]
pub struct CommandExchangeClient {
    program: String,
    args: Vec<String>,
}

impl CommandExchangeClient {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a `[program, args...]` list.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

#[async_trait]
impl ExchangeClient for CommandExchangeClient {
    async fn open_session(
        &self,
        credentials: StaticCredentials,
    ) -> Result<Box<dyn ExchangeSession>, SessionError> {
        if self.program.is_empty() {
            return Err(SessionError::Rejected {
                message: "no exchange command configured".to_string(),
            });
        }

        Ok(Box::new(CommandSession {
            client: self.clone(),
            credentials,
        }))
    }
}

struct CommandSession {
    client: CommandExchangeClient,
    credentials: StaticCredentials,
}

impl CommandSession {
    async fn run(&self, payload: Vec<u8>) -> Result<Output, ExchangeError> {
        let mut child = Command::new(&self.client.program)
            .args(&self.client.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| transport(format!("failed to start {}: {}", self.client.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| transport(format!("failed to write request: {}", e)))?;
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| transport(format!("failed to wait for {}: {}", self.client.program, e)))
    }
}

#[async_trait]
impl ExchangeSession for CommandSession {
    async fn get_session_token(
        &self,
        request: SessionTokenRequest,
        cancellation: CancellationToken,
    ) -> Result<ExchangeOutput, ExchangeError> {
        let payload = serde_json::to_vec(&HelperRequest {
            access_key_id: &self.credentials.access_key_id,
            secret_access_key: &self.credentials.secret_access_key,
            duration_seconds: request.duration.as_secs(),
            serial_number: request.serial_number.as_deref(),
            token_code: request.token_code.as_ref(),
        })
        .map_err(|e| transport(format!("failed to encode request: {}", e)))?;

        debug!(program = %self.client.program, "running exchange helper");

        // Dropping the child on cancellation kills it.
        let output = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(ExchangeError::Cancelled),
            output = self.run(payload) => output?,
        };

        parse_output(&output)
    }
}

fn parse_output(output: &Output) -> Result<ExchangeOutput, ExchangeError> {
    if output.status.success() {
        return serde_json::from_slice(&output.stdout)
            .map_err(|e| transport(format!("unreadable helper response: {}", e)));
    }

    if let Ok(failure) = serde_json::from_slice::<HelperFailure>(&output.stdout) {
        return Err(ExchangeError::service(failure.code, failure.message));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(transport(format!(
        "exchange helper failed ({}): {}",
        output.status,
        stderr.trim()
    )))
}

fn transport(message: String) -> ExchangeError {
    ExchangeError::Transport { message }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use sessionforge_core::ExchangeErrorKind;
    use std::time::Duration;

    fn shell(script: &str) -> CommandExchangeClient {
        CommandExchangeClient::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    fn credentials() -> StaticCredentials {
        StaticCredentials {
            access_key_id: "AKIALONGLIVED".to_string(),
            secret_access_key: Secret::new("long-lived-secret"),
        }
    }

    fn request() -> SessionTokenRequest {
        SessionTokenRequest {
            duration: Duration::from_secs(900),
            serial_number: None,
            token_code: None,
        }
    }

    async fn exchange(client: &CommandExchangeClient) -> Result<ExchangeOutput, ExchangeError> {
        let session = client.open_session(credentials()).await.unwrap();
        session
            .get_session_token(request(), CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let client = shell(
            r#"cat >/dev/null; echo '{"AccessKeyId":"ASIATEMP","SecretAccessKey":"s","SessionToken":"t","Expiration":"2030-01-01T00:00:00Z"}'"#,
        );

        let output = exchange(&client).await.unwrap();

        assert_eq!(output.access_key_id.as_deref(), Some("ASIATEMP"));
        assert_eq!(output.session_token.unwrap().expose(), "t");
        assert!(output.expiration.is_some());
    }

    #[tokio::test]
    async fn test_request_is_sent_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let captured = dir.path().join("request.json");
        let client = CommandExchangeClient::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"cat > "$1"; echo '{}'"#.to_string(),
                "sh".to_string(),
                captured.display().to_string(),
            ],
        );

        let session = client.open_session(credentials()).await.unwrap();
        let request = SessionTokenRequest {
            duration: Duration::from_secs(900),
            serial_number: Some("arn:aws:iam::123456789012:mfa/dev".to_string()),
            token_code: Some(Secret::new("123456")),
        };
        session
            .get_session_token(request, CancellationToken::new())
            .await
            .unwrap();

        let sent: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&captured).unwrap()).unwrap();
        assert_eq!(sent["AccessKeyId"], "AKIALONGLIVED");
        assert_eq!(sent["SecretAccessKey"], "long-lived-secret");
        assert_eq!(sent["DurationSeconds"], 900);
        assert_eq!(sent["SerialNumber"], "arn:aws:iam::123456789012:mfa/dev");
        assert_eq!(sent["TokenCode"], "123456");
    }

    #[tokio::test]
    async fn test_service_failure_keeps_code() {
        let client = shell(
            r#"cat >/dev/null; echo '{"code":"RegionDisabledException","message":"STS is not activated"}'; exit 1"#,
        );

        let err = exchange(&client).await.unwrap_err();

        assert_eq!(err.kind(), ExchangeErrorKind::RegionDisabled);
        assert_eq!(err.to_string(), "RegionDisabledException: STS is not activated");
    }

    #[tokio::test]
    async fn test_unstructured_failure_is_transport() {
        let client = shell("cat >/dev/null; echo boom >&2; exit 3");

        let err = exchange(&client).await.unwrap_err();

        assert_eq!(err.kind(), ExchangeErrorKind::Transport);
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_garbage_response_is_transport() {
        let client = shell("cat >/dev/null; echo not-json");

        let err = exchange(&client).await.unwrap_err();
        assert_eq!(err.kind(), ExchangeErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_missing_program_is_transport() {
        let client = CommandExchangeClient::new("/nonexistent/sessionforge-helper", Vec::new());

        let err = exchange(&client).await.unwrap_err();
        assert_eq!(err.kind(), ExchangeErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_cancellation_stops_helper() {
        let client = shell("sleep 30");
        let session = client.open_session(credentials()).await.unwrap();
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let err = session.get_session_token(request(), token).await.unwrap_err();

        assert_eq!(err, ExchangeError::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_empty_command_rejects_session() {
        assert!(CommandExchangeClient::from_command(&[]).is_none());

        let client = CommandExchangeClient::new("", Vec::new());
        let result = client.open_session(credentials()).await;
        assert!(matches!(result, Err(SessionError::Rejected { .. })));
    }
}
