//! Webhook gateway: credential check, payload decoding, dispatch.
//!
//! The HTTP transport hands over the API key from the request path and the raw
//! `payload` form field; everything after that happens here.

use serde::Deserialize;

use intexration_utils::error::{IntexrationError, WebhookError};

use crate::keys::KeyStore;
use crate::model::Submission;
use crate::orchestrator::{BatchSummary, Orchestrator};

#[derive(Debug, Deserialize)]
struct PushPayload {
    repository: PushRepository,
    after: String,
}

#[derive(Debug, Deserialize)]
struct PushRepository {
    url: String,
    name: String,
}

/// Decode a push payload into a [`Submission`].
///
/// Only `repository.url`, `repository.name` and `after` are read; everything
/// else in the payload is ignored. An `after` starting with `-` is rejected, since
/// it is handed to git as a revision.
pub fn decode_payload(payload: &str) -> Result<Submission, WebhookError> {
    let push: PushPayload =
        serde_json::from_str(payload).map_err(|e| WebhookError::MalformedPayload {
            reason: e.to_string(),
        })?;

    for (field, value) in [
        ("repository.url", &push.repository.url),
        ("repository.name", &push.repository.name),
        ("after", &push.after),
    ] {
        if value.trim().is_empty() {
            return Err(WebhookError::MalformedPayload {
                reason: format!("{field} is empty"),
            });
        }
    }

    if push.after.trim_start().starts_with('-') {
        return Err(WebhookError::MalformedPayload {
            reason: format!("after '{}' is not a revision", push.after.escape_debug()),
        });
    }

    Ok(Submission::new(
        push.repository.url,
        push.repository.name,
        push.after,
    ))
}

/// Accepts webhook calls on behalf of an [`Orchestrator`].
#[derive(Debug, Clone, Copy)]
pub struct WebhookGateway<'a> {
    orchestrator: &'a Orchestrator,
    keys: &'a KeyStore,
}

impl<'a> WebhookGateway<'a> {
    pub fn new(orchestrator: &'a Orchestrator, keys: &'a KeyStore) -> Self {
        Self { orchestrator, keys }
    }

    /// Authorize, decode and submit.
    ///
    /// The key is checked before the payload is looked at, so an unauthorized
    /// caller learns nothing about payload validation.
    pub fn handle(&self, api_key: &str, payload: &str) -> Result<BatchSummary, IntexrationError> {
        if !self.keys.is_valid(api_key) {
            tracing::warn!("Webhook rejected: unknown API key");
            return Err(WebhookError::Unauthorized.into());
        }

        let submission = decode_payload(payload).inspect_err(|e| {
            tracing::warn!(error = %e, "Webhook rejected: malformed payload");
        })?;

        tracing::info!(
            url = %submission.source_url,
            repository = %submission.repository,
            git_ref = %submission.git_ref,
            "Webhook accepted"
        );
        Ok(self.orchestrator.submit_request(&submission)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_github_push() {
        let payload = r#"{
            "ref": "refs/heads/master",
            "before": "000000",
            "after": "abc123",
            "repository": {
                "name": "paper",
                "url": "https://github.com/acme/paper",
                "owner": {"name": "acme"}
            },
            "commits": []
        }"#;

        let submission = decode_payload(payload).unwrap();
        assert_eq!(
            submission,
            Submission::new("https://github.com/acme/paper", "paper", "abc123")
        );
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let err = decode_payload(r#"{"repository": {"url": "u"}, "after": "x"}"#).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload { .. }));
        assert_eq!(err.status_code(), 400);

        assert!(decode_payload("not json").is_err());
        assert!(
            decode_payload(r#"{"repository": {"url": "u", "name": "n"}, "after": " "}"#).is_err()
        );
    }

    #[test]
    fn test_decode_rejects_option_like_ref() {
        let err = decode_payload(
            r#"{"repository": {"url": "https://github.com/acme/paper", "name": "paper"}, "after": "--orphan=evil"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload { .. }));
        assert_eq!(err.status_code(), 400);
    }
}
