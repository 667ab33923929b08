//! Interpretation of the CLI's `--output-format json` result.

use {serde_json::Value, std::process::ExitStatus, tracing::warn};

use crate::{AgentError, AgentReply, Result};

/// Turn captured process output into a reply.
///
/// Any stdout wins over the exit status: the CLI exits non-zero for some
/// turns that still carry a usable result (e.g. budget exhausted mid-turn).
pub fn parse_output(stdout: &str, stderr: &str, status: ExitStatus) -> Result<AgentReply> {
    let trimmed = stdout.trim();
    if !trimmed.is_empty() {
        return Ok(match serde_json::from_str::<Value>(trimmed) {
            Ok(json) => reply_from_json(json),
            Err(e) => {
                warn!(error = %e, "agent output is not JSON, using raw text");
                AgentReply::text(trimmed)
            },
        });
    }

    if !status.success() {
        return Err(AgentError::Exit {
            code: status.code(),
            stderr: stderr.to_string(),
        });
    }

    Ok(AgentReply::default())
}

fn reply_from_json(json: Value) -> AgentReply {
    let cost_usd = json.get("total_cost_usd").and_then(Value::as_f64);
    let duration_ms = json.get("duration_ms").and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    });
    let session_id = json
        .get("session_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let text = match json.get("result").and_then(Value::as_str) {
        Some(result) => result.to_string(),
        None => match &json {
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        },
    };

    AgentReply {
        text,
        cost_usd,
        duration_ms,
        session_id,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests {
    use {super::*, std::os::unix::process::ExitStatusExt};

    fn status(code: i32) -> ExitStatus {
        ExitStatus::from_raw(code << 8)
    }

    #[test]
    fn extracts_result_and_metadata() {
        let stdout = r#"{"type":"result","subtype":"success","is_error":false,
            "duration_ms":4210,"result":"All done.","session_id":"abc",
            "total_cost_usd":0.0123}"#;
        let reply = parse_output(stdout, "", status(0)).unwrap();
        assert_eq!(reply.text, "All done.");
        assert_eq!(reply.cost_usd, Some(0.0123));
        assert_eq!(reply.duration_ms, Some(4210));
        assert_eq!(reply.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn json_without_result_is_pretty_printed() {
        let reply = parse_output(r#"{"error":"boom"}"#, "", status(0)).unwrap();
        assert_eq!(reply.text, "{\n  \"error\": \"boom\"\n}");
        assert_eq!(reply.cost_usd, None);
    }

    #[test]
    fn raw_text_when_not_json() {
        let reply = parse_output("  plain words \n", "", status(0)).unwrap();
        assert_eq!(reply.text, "plain words");
    }

    #[test]
    fn stdout_wins_over_failed_exit() {
        let reply = parse_output(r#"{"result":"partial"}"#, "warn", status(1)).unwrap();
        assert_eq!(reply.text, "partial");
    }

    #[test]
    fn empty_output_and_failure_is_exit_error() {
        let err = parse_output("", "No conversation found with session ID x", status(1))
            .unwrap_err();
        match &err {
            AgentError::Exit { code, .. } => assert_eq!(*code, Some(1)),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.invalidates_session());
    }

    #[test]
    fn empty_output_and_success_is_empty_reply() {
        assert_eq!(
            parse_output("", "", status(0)).unwrap(),
            AgentReply::default()
        );
    }

    #[test]
    fn fractional_duration_is_accepted() {
        let reply = parse_output(r#"{"result":"x","duration_ms":1500.7}"#, "", status(0)).unwrap();
        assert_eq!(reply.duration_ms, Some(1500));
    }
}
