use crate::transport::framing::MAX_FRAME_SIZE;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Room left in a frame for the envelope and field names around `image_data`.
const ANALYZE_ENVELOPE_OVERHEAD: usize = 1024;

/// Largest image an `AnalyzeRequest` can carry in a single frame once base64 encoded.
pub const MAX_ANALYZE_PAYLOAD: usize = (MAX_FRAME_SIZE - ANALYZE_ENVELOPE_OVERHEAD) / 4 * 3;

/// Request for the `AnalyzeColors` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeRequest {
    #[serde(with = "base64_bytes")]
    pub image_data: Bytes,
}

/// Response of the `AnalyzeColors` call. Workers may omit `colors` entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub colors: Option<Vec<String>>,
}

/// Dominant colors of an image, most frequent first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorPalette(pub Vec<String>);

impl ColorPalette {
    pub fn colors(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<AnalyzeResponse> for ColorPalette {
    fn from(resp: AnalyzeResponse) -> Self {
        ColorPalette(resp.colors.unwrap_or_default())
    }
}

/// Binary fields travel as standard base64 strings inside JSON messages.
pub mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_data_is_base64() {
        let req = AnalyzeRequest {
            image_data: Bytes::from_static(b"\x89PNG"),
        };
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({"image_data": "iVBORw=="}));
    }

    #[test]
    fn test_missing_colors_is_empty_palette() {
        let resp: AnalyzeResponse = serde_json::from_str("{}").unwrap();
        assert!(ColorPalette::from(resp).is_empty());

        let resp: AnalyzeResponse = serde_json::from_str(r#"{"colors":null}"#).unwrap();
        assert!(ColorPalette::from(resp).is_empty());
    }

    #[test]
    fn test_full_upload_fits_one_frame() {
        assert!(MAX_ANALYZE_PAYLOAD >= crate::config::DEFAULT_MAX_UPLOAD_BYTES);
        let encoded = MAX_ANALYZE_PAYLOAD.div_ceil(3) * 4;
        assert!(encoded + ANALYZE_ENVELOPE_OVERHEAD <= MAX_FRAME_SIZE);
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let parsed = serde_json::from_str::<AnalyzeRequest>(r#"{"image_data":"%%%"}"#);
        assert!(parsed.is_err());
    }
}
