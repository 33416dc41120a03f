use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Correlation id carried in `req[0]` of a request and echoed in `res[0]` of its response.
///
/// ClearNode uses numeric ids, but any non-empty string is accepted as well so that
/// alternative envelope builders can plug in their own id scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    Text(String),
}

impl RequestId {
    /// Extract an id from a JSON value. Zero, negative, fractional and empty ids are rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().filter(|id| *id != 0).map(Self::Number),
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

/// Remote operations supported by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
    Ping,
    GetConfig,
    GetAssets { chain_id: Option<u64> },
}

impl RpcRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::GetConfig => "get_config",
            Self::GetAssets { .. } => "get_assets",
        }
    }

    pub fn params(&self) -> Value {
        match self {
            Self::Ping | Self::GetConfig | Self::GetAssets { chain_id: None } => json!([]),
            Self::GetAssets {
                chain_id: Some(chain_id),
            } => json!([{ "chain_id": chain_id }]),
        }
    }
}

impl fmt::Display for RpcRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// A response envelope matched back to a request
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub id: RequestId,
    pub method: Option<String>,
    pub params: Value,
    pub timestamp: Option<u64>,
    /// The full parsed envelope, including any signatures
    pub envelope: Value,
}

impl RpcResponse {
    /// Parse a raw frame. Returns `None` for anything that is not a response envelope.
    pub fn from_slice(payload: &[u8]) -> Option<Self> {
        let envelope: Value = serde_json::from_slice(payload).ok()?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Value) -> Option<Self> {
        let res = envelope.get("res")?.as_array()?;
        let id = RequestId::from_value(res.first()?)?;
        let method = res.get(1).and_then(Value::as_str).map(str::to_string);
        let params = res.get(2).cloned().unwrap_or(Value::Null);
        let timestamp = res.get(3).and_then(Value::as_u64);

        Some(Self {
            id,
            method,
            params,
            timestamp,
            envelope,
        })
    }

    pub fn is_error(&self) -> bool {
        self.method.as_deref() == Some("error")
    }

    /// Error text of an `error` response, whether params is an object or a one-element array
    pub fn error_message(&self) -> Option<&str> {
        if !self.is_error() {
            return None;
        }
        let params = match &self.params {
            Value::Array(items) => items.first()?,
            other => other,
        };
        params.get("error").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_from_value() {
        assert_eq!(RequestId::from_value(&json!(42)), Some(RequestId::Number(42)));
        assert_eq!(
            RequestId::from_value(&json!("abc")),
            Some(RequestId::Text("abc".to_string()))
        );
        assert_eq!(RequestId::from_value(&json!(0)), None);
        assert_eq!(RequestId::from_value(&json!("")), None);
        assert_eq!(RequestId::from_value(&json!(-3)), None);
        assert_eq!(RequestId::from_value(&json!(null)), None);
    }

    #[test]
    fn test_get_assets_params() {
        assert_eq!(RpcRequest::GetAssets { chain_id: None }.params(), json!([]));
        assert_eq!(
            RpcRequest::GetAssets {
                chain_id: Some(137)
            }
            .params(),
            json!([{ "chain_id": 137 }])
        );
    }

    #[test]
    fn test_response_parsing() {
        let payload = br#"{"res":[7,"get_config",[{"broker_address":"0xabc"}],1700000000000],"sig":["0x00"]}"#;
        let response = RpcResponse::from_slice(payload).unwrap();
        assert_eq!(response.id, RequestId::Number(7));
        assert_eq!(response.method.as_deref(), Some("get_config"));
        assert_eq!(response.timestamp, Some(1_700_000_000_000));
        assert!(!response.is_error());
    }

    #[test]
    fn test_non_response_frames_are_ignored() {
        assert!(RpcResponse::from_slice(b"not json").is_none());
        assert!(RpcResponse::from_slice(br#"{"req":[1,"ping",[],0]}"#).is_none());
        assert!(RpcResponse::from_slice(br#"{"res":"nope"}"#).is_none());
        assert!(RpcResponse::from_slice(br#"{"res":[]}"#).is_none());
    }

    #[test]
    fn test_error_response() {
        let payload = br#"{"res":[9,"error",{"error":"invalid signature"},1]}"#;
        let response = RpcResponse::from_slice(payload).unwrap();
        assert!(response.is_error());
        assert_eq!(response.error_message(), Some("invalid signature"));
    }
}
