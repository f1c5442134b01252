use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest slice of a malformed body kept for diagnostics.
const RAW_LIMIT: usize = 512;

/// Why a call failed without the rewards service having answered it properly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Connection, TLS or timeout failure; nothing usable came back.
    Transport,
    /// The service answered with a non-2xx status.
    Status(u16),
    /// The body was not a JSON object.
    Malformed,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Transport => f.write_str("transport error"),
            Fault::Status(code) => write!(f, "HTTP status {code}"),
            Fault::Malformed => f.write_str("malformed response"),
        }
    }
}

/// The normalized outcome of one call to the rewards service.
///
/// Every call produces one of these, whatever happened on the wire. A failed result never
/// carries `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResult {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(rename = "link", default, skip_serializing_if = "Option::is_none")]
    confirmation_link: Option<String>,
    #[serde(skip)]
    fault: Option<Fault>,
    #[serde(skip)]
    raw: Option<String>,
    #[serde(skip)]
    rejected: bool,
}

impl ServiceResult {
    /// A call that never got a response.
    pub fn transport(diagnostic: impl Into<String>) -> Self {
        ServiceResult::failure(Fault::Transport, diagnostic.into())
    }

    /// Normalize an HTTP response into a result.
    ///
    /// Domain failures (`"success": false` with a message) pass through untouched; bad statuses
    /// and bodies that are not a JSON object become failures with a [`Fault`].
    pub fn from_response(status: u16, body: &str) -> Self {
        let object = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(object)) => Some(object),
            _ => None,
        };

        if !(200..300).contains(&status) {
            let service_message = object
                .as_ref()
                .and_then(|object| object.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned);
            let rejected = (400..500).contains(&status) && service_message.is_some();
            let message = service_message
                .unwrap_or_else(|| format!("the rewards service answered with HTTP {status}"));
            let mut result = ServiceResult::failure(Fault::Status(status), message);
            result.rejected = rejected;
            if object.is_none() {
                result.raw = Some(truncate(body));
            }
            return result;
        }

        let Some(mut object) = object else {
            let mut result = ServiceResult::failure(
                Fault::Malformed,
                "the rewards service sent a response that is not a JSON object".to_string(),
            );
            result.raw = Some(truncate(body));
            return result;
        };

        let success = object
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let message = match object.remove("message") {
            Some(Value::String(message)) => Some(message),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        let confirmation_link = object
            .remove("link")
            .and_then(|link| link.as_str().map(str::to_owned));
        let data = match object.remove("data") {
            Some(Value::Null) => None,
            data if success => data,
            _ => None,
        };

        ServiceResult {
            success,
            data,
            message,
            confirmation_link,
            fault: None,
            raw: None,
            rejected: false,
        }
    }

    fn failure(fault: Fault, message: String) -> Self {
        ServiceResult {
            success: false,
            data: None,
            message: Some(message),
            confirmation_link: None,
            fault: Some(fault),
            raw: None,
            rejected: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// A field of the `data` object, if both exist.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// A link the user must follow to approve the action before it takes effect.
    pub fn confirmation_link(&self) -> Option<&str> {
        self.confirmation_link.as_deref()
    }

    /// Set when the failure did not come from the service's own logic.
    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    /// The service's own message for a request it refused with a 4xx status.
    pub fn rejection(&self) -> Option<&str> {
        if self.rejected {
            self.message()
        } else {
            None
        }
    }

    /// The start of a body that could not be understood.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(RAW_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_data_passes_through_unchanged() {
        let body = json!({
            "success": true,
            "data": { "coins": 12, "guilds": ["1", "2"], "nested": { "ready": true } },
        });
        let result = ServiceResult::from_response(200, &body.to_string());
        assert!(result.is_success());
        assert_eq!(result.data(), Some(&body["data"]));
        assert_eq!(result.fault(), None);
    }

    #[test]
    fn envelope_survives_a_serialization_round_trip() {
        let result = ServiceResult::from_response(
            200,
            r#"{"success":true,"data":[1,2,3],"message":"ok","link":"https://x/confirm"}"#,
        );
        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: ServiceResult = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, result);
        assert_eq!(ServiceResult::from_response(200, &encoded), result);
    }

    #[test]
    fn malformed_bodies_become_failures() {
        for body in [
            "",
            "{\"success\": tr",
            "<html><body>502 Bad Gateway</body></html>",
            "[true]",
            "null",
        ] {
            let result = ServiceResult::from_response(200, body);
            assert!(!result.is_success(), "body: {body:?}");
            assert_eq!(result.data(), None);
            assert_eq!(result.fault(), Some(Fault::Malformed));
            assert!(result.message().is_some());
            assert_eq!(result.raw(), Some(body));
        }
    }

    #[test]
    fn raw_body_is_truncated() {
        let body = "x".repeat(RAW_LIMIT * 2);
        let result = ServiceResult::from_response(200, &body);
        assert_eq!(result.raw().map(str::len), Some(RAW_LIMIT));
    }

    #[test]
    fn domain_failure_keeps_the_service_message() {
        let result = ServiceResult::from_response(
            200,
            r#"{"success":false,"message":"This user already has an account."}"#,
        );
        assert!(!result.is_success());
        assert_eq!(result.message(), Some("This user already has an account."));
        assert_eq!(result.fault(), None);
    }

    #[test]
    fn failed_results_never_carry_data() {
        let result =
            ServiceResult::from_response(200, r#"{"success":false,"data":{"coins":3}}"#);
        assert_eq!(result.data(), None);
    }

    #[test]
    fn missing_success_flag_counts_as_failure() {
        let result = ServiceResult::from_response(200, r#"{"data":{"coins":3}}"#);
        assert!(!result.is_success());
        assert_eq!(result.data(), None);
    }

    #[test]
    fn bad_status_is_a_fault_even_with_json() {
        let result =
            ServiceResult::from_response(401, r#"{"success":false,"message":"Invalid key"}"#);
        assert_eq!(result.fault(), Some(Fault::Status(401)));
        assert_eq!(result.message(), Some("Invalid key"));
        assert_eq!(result.rejection(), Some("Invalid key"));
        assert_eq!(result.raw(), None);

        let result = ServiceResult::from_response(503, "Service Unavailable");
        assert_eq!(result.fault(), Some(Fault::Status(503)));
        assert_eq!(
            result.message(),
            Some("the rewards service answered with HTTP 503")
        );
        assert_eq!(result.raw(), Some("Service Unavailable"));
        assert_eq!(result.rejection(), None);
    }

    #[test]
    fn only_client_errors_with_a_service_message_are_rejections() {
        let result = ServiceResult::from_response(404, r#"{"success":false}"#);
        assert_eq!(result.rejection(), None);
        assert!(result.message().is_some());

        let result = ServiceResult::from_response(
            500,
            r#"{"success":false,"message":"Traceback (most recent call last)"}"#,
        );
        assert_eq!(result.rejection(), None);

        let result = ServiceResult::from_response(
            200,
            r#"{"success":false,"message":"Not enough coins."}"#,
        );
        assert_eq!(result.rejection(), None);
    }

    #[test]
    fn link_is_exposed_as_confirmation() {
        let result =
            ServiceResult::from_response(200, r#"{"success":true,"link":"https://x/confirm"}"#);
        assert!(result.is_success());
        assert_eq!(result.confirmation_link(), Some("https://x/confirm"));
        assert_eq!(result.data(), None);
    }
}
