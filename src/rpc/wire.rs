use serde::{Deserialize, Serialize};

/// Bidirectional streaming call carrying image chunks to the filter worker.
pub const APPLY_FILTER_STREAM: &str = "/filters.ImageFilterService/ApplyFilterStream";
/// Unary call asking the analyzer worker for a dominant-color palette.
pub const ANALYZE_COLORS: &str = "/analyzer.ColorAnalyzer/AnalyzeColors";

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_ARGUMENT: i64 = -32602;
pub const INTERNAL: i64 = -32603;

/// First frame on every connection: names the call being opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallHeader {
    pub method: String,
}

impl CallHeader {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
        }
    }
}

/// Terminal status a server reports instead of a normal end-of-stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    pub code: i64,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(INVALID_ARGUMENT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL, message)
    }
}

/// Every frame after the call header is one of these.
///
/// ```text
/// {"kind":"message","body":{...}}
/// {"kind":"close"}
/// {"kind":"status","code":-32603,"message":"..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope<T> {
    /// One application message.
    Message { body: T },
    /// The sender will write nothing more in this direction.
    Close,
    /// Server-side termination with an error.
    Status(RpcStatus),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shapes() {
        let close: Envelope<()> = Envelope::Close;
        assert_eq!(serde_json::to_value(&close).unwrap(), json!({"kind": "close"}));

        let status: Envelope<()> = Envelope::Status(RpcStatus::internal("boom"));
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"kind": "status", "code": INTERNAL, "message": "boom"})
        );

        let msg = Envelope::Message { body: json!({"colors": ["#ffffff"]}) };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"kind": "message", "body": {"colors": ["#ffffff"]}})
        );
    }

    #[test]
    fn test_close_decodes_for_any_body_type() {
        let parsed: Envelope<Vec<u32>> = serde_json::from_str(r#"{"kind":"close"}"#).unwrap();
        assert_eq!(parsed, Envelope::Close);
    }
}
