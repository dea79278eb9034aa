//! JSON-RPC style request and response envelopes.
//!
//! Requests are `{"method": ..., "params": ...}` with `params` omitted when
//! empty. Responses are `{"error_code": ..., "result": ...}`; a nonzero
//! `error_code` means `result` must be ignored.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::Error;

/// A request envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request<P = Value> {
    /// Device method name, e.g. `get_device_info`.
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

impl Request<Value> {
    /// A request without parameters.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: None,
        }
    }
}

impl<P: Serialize> Request<P> {
    /// A request with parameters.
    pub fn with_params(method: impl Into<String>, params: P) -> Self {
        Self {
            method: method.into(),
            params: Some(params),
        }
    }

    /// Serializes the envelope to JSON text.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self)
            .map_err(|e| Error::MalformedPayload(format!("cannot serialize request: {}", e)))
    }
}

/// Parses a response envelope, checks its `error_code`, and deserializes
/// `result` if present.
///
/// A nonzero code is returned as [`Error::DeviceRejected`] before `result`
/// is looked at. A missing `error_code` counts as success.
pub fn decode_response<T: DeserializeOwned>(json: &str) -> Result<Option<T>, Error> {
    let mut envelope: Value = serde_json::from_str(json)
        .map_err(|e| Error::MalformedPayload(format!("response is not JSON: {}", e)))?;

    Error::check_code(error_code(&envelope)?)?;

    match envelope.get_mut("result").map(Value::take) {
        None | Some(Value::Null) => Ok(None),
        Some(result) => serde_json::from_value(result)
            .map(Some)
            .map_err(|e| Error::MalformedPayload(format!("unexpected result shape: {}", e))),
    }
}

/// Like [`decode_response`], but a successful response must carry `result`.
pub fn decode_result<T: DeserializeOwned>(json: &str) -> Result<T, Error> {
    decode_response(json)?
        .ok_or_else(|| Error::MalformedPayload("response has no result".into()))
}

/// Reads `error_code` from a parsed envelope; absent means `0`.
pub(crate) fn error_code(envelope: &Value) -> Result<i32, Error> {
    match envelope.get("error_code") {
        None | Some(Value::Null) => Ok(0),
        Some(code) => code
            .as_i64()
            .and_then(|c| i32::try_from(c).ok())
            .ok_or_else(|| Error::MalformedPayload(format!("invalid error_code {}", code))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceErrorKind;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Token {
        token: String,
    }

    #[test]
    fn test_request_omits_missing_params() {
        let json = Request::new("get_device_info").to_json().unwrap();
        assert_eq!(json, r#"{"method":"get_device_info"}"#);
    }

    #[test]
    fn test_request_with_params() {
        let json = Request::with_params("set_device_info", json!({"device_on": true}))
            .to_json()
            .unwrap();
        assert_eq!(
            json,
            r#"{"method":"set_device_info","params":{"device_on":true}}"#
        );
    }

    #[test]
    fn test_decode_success() {
        let token: Token = decode_result(r#"{"error_code":0,"result":{"token":"T1"}}"#).unwrap();
        assert_eq!(token.token, "T1");
    }

    #[test]
    fn test_decode_without_result() {
        let result: Option<Value> = decode_response(r#"{"error_code":0}"#).unwrap();
        assert!(result.is_none());
        assert!(matches!(
            decode_result::<Token>(r#"{"error_code":0}"#),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_error_code_checked_before_result() {
        // The result is garbage, but the code must win
        let err = decode_result::<Token>(r#"{"error_code":-1501,"result":42}"#).unwrap_err();
        assert!(matches!(
            err,
            Error::DeviceRejected {
                kind: DeviceErrorKind::InvalidRequest,
                code: -1501
            }
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            decode_response::<Value>("{not json"),
            Err(Error::MalformedPayload(_))
        ));
        assert!(matches!(
            decode_response::<Value>(r#"{"error_code":"zero"}"#),
            Err(Error::MalformedPayload(_))
        ));
        assert!(matches!(
            decode_result::<Token>(r#"{"error_code":0,"result":{"nope":1}}"#),
            Err(Error::MalformedPayload(_))
        ));
    }
}
