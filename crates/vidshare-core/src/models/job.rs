//! Wire format of the encoding job message.
//!
//! ```json
//! { "pattern": "encode_video", "data": { "videoId": "v1" }, "options": { "deliveryMode": 2 } }
//! ```
//!
//! The message only names the video; everything else is read from the record store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{IdError, VideoId};

/// Pattern name the producer uses for encoding jobs.
pub const ENCODE_VIDEO_PATTERN: &str = "encode_video";

/// AMQP delivery mode: 1 is transient, 2 survives a broker restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DeliveryMode {
    Transient = 1,
    Persistent = 2,
}

impl DeliveryMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DeliveryMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DeliveryMode::Transient),
            2 => Ok(DeliveryMode::Persistent),
            other => Err(format!("invalid delivery mode: {}", other)),
        }
    }
}

impl From<DeliveryMode> for u8 {
    fn from(mode: DeliveryMode) -> Self {
        mode.as_u8()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingJobData {
    #[serde(rename = "videoId")]
    pub video_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOptions {
    pub delivery_mode: DeliveryMode,
}

/// Message published by the upload collaborator once the original is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingJobMessage {
    pub pattern: String,
    pub data: EncodingJobData,
    pub options: PublishOptions,
}

/// A decoded, validated job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingJob {
    pub pattern: String,
    pub video_id: VideoId,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("`pattern` is missing, empty or not a string")]
    MissingPattern,

    #[error("`data` is missing or not an object")]
    DataNotObject,

    #[error("`data.videoId` is missing or not a string")]
    MissingVideoId,

    #[error("`data.videoId` is invalid: {0}")]
    InvalidVideoId(#[from] IdError),
}

impl EncodingJobMessage {
    /// Build a persistent encoding job for `video_id`.
    pub fn new(video_id: &VideoId) -> Self {
        Self {
            pattern: ENCODE_VIDEO_PATTERN.to_string(),
            data: EncodingJobData {
                video_id: video_id.to_string(),
            },
            options: PublishOptions {
                delivery_mode: DeliveryMode::Persistent,
            },
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode and validate a raw payload.
    ///
    /// Only `pattern` and `data.videoId` are required; `options` is a transport
    /// hint and is ignored when absent or unrecognized.
    pub fn parse(payload: &[u8]) -> Result<EncodingJob, MessageError> {
        let value: Value = serde_json::from_slice(payload)?;
        let object = value.as_object().ok_or(MessageError::NotAnObject)?;

        let pattern = match object.get("pattern").and_then(Value::as_str) {
            Some(p) if !p.trim().is_empty() => p.to_string(),
            _ => return Err(MessageError::MissingPattern),
        };

        let data = object
            .get("data")
            .and_then(Value::as_object)
            .ok_or(MessageError::DataNotObject)?;

        let raw_id = data
            .get("videoId")
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingVideoId)?;

        let video_id = VideoId::parse(raw_id)?;

        Ok(EncodingJob { pattern, video_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_has_expected_wire_shape() {
        let id = VideoId::parse("v1").unwrap();
        let json = serde_json::to_value(EncodingJobMessage::new(&id)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "pattern": "encode_video",
                "data": { "videoId": "v1" },
                "options": { "deliveryMode": 2 }
            })
        );
    }

    #[test]
    fn parses_valid_payload() {
        let payload = br#"{"pattern":"encode_video","data":{"videoId":"v1"},"options":{"deliveryMode":2}}"#;
        let job = EncodingJobMessage::parse(payload).unwrap();
        assert_eq!(job.video_id.as_str(), "v1");
        assert_eq!(job.pattern, ENCODE_VIDEO_PATTERN);
    }

    #[test]
    fn options_are_optional() {
        let job = EncodingJobMessage::parse(br#"{"pattern":"encode_video","data":{"videoId":"v9"}}"#)
            .unwrap();
        assert_eq!(job.video_id.as_str(), "v9");
    }

    #[test]
    fn rejects_null_data() {
        let err = EncodingJobMessage::parse(br#"{"data":null}"#).unwrap_err();
        assert!(matches!(err, MessageError::MissingPattern));

        let err = EncodingJobMessage::parse(br#"{"pattern":"encode_video","data":null}"#)
            .unwrap_err();
        assert!(matches!(err, MessageError::DataNotObject));
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            EncodingJobMessage::parse(b"not json"),
            Err(MessageError::InvalidJson(_))
        ));
        assert!(matches!(
            EncodingJobMessage::parse(b"[1,2]"),
            Err(MessageError::NotAnObject)
        ));
        assert!(matches!(
            EncodingJobMessage::parse(br#"{"pattern":"","data":{"videoId":"v1"}}"#),
            Err(MessageError::MissingPattern)
        ));
        assert!(matches!(
            EncodingJobMessage::parse(br#"{"pattern":"encode_video","data":{"videoId":7}}"#),
            Err(MessageError::MissingVideoId)
        ));
        assert!(matches!(
            EncodingJobMessage::parse(br#"{"pattern":"encode_video","data":{"videoId":"../x"}}"#),
            Err(MessageError::InvalidVideoId(_))
        ));
    }

    #[test]
    fn delivery_mode_rejects_unknown_values() {
        assert!(serde_json::from_str::<DeliveryMode>("3").is_err());
        assert_eq!(
            serde_json::from_str::<DeliveryMode>("1").unwrap(),
            DeliveryMode::Transient
        );
    }
}
