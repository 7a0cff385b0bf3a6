//! Body codecs
//!
//! A codec turns a typed payload into bytes plus a content type, and back.
//! The request builder encodes eagerly, so an encoding failure shows up when
//! the request is built, before any connection is opened.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::content_type::ContentType;
use crate::error::{HttpError, Result};

/// Encode/decode capability for one payload type
pub trait BodyCodec<T> {
    /// Content type produced by [`BodyCodec::encode`]
    fn content_type(&self) -> ContentType;

    /// Encode a payload into body bytes
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode body bytes, given the content type the server declared
    fn decode(&self, content_type: Option<&ContentType>, bytes: &[u8]) -> Result<T>;
}

/// Identity codec over raw bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawCodec;

impl BodyCodec<Vec<u8>> for RawCodec {
    fn content_type(&self) -> ContentType {
        ContentType::new(ContentType::OCTET_STREAM)
    }

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, _content_type: Option<&ContentType>, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// UTF-8 text codec
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextCodec;

impl BodyCodec<String> for TextCodec {
    fn content_type(&self) -> ContentType {
        ContentType::new(ContentType::TEXT_UTF8)
    }

    fn encode(&self, value: &String) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, content_type: Option<&ContentType>, bytes: &[u8]) -> Result<String> {
        if let Some(charset) = content_type.and_then(ContentType::charset) {
            if !matches!(charset, "utf-8" | "utf8" | "us-ascii") {
                return Err(HttpError::Decode(format!("unsupported charset: {}", charset)));
            }
        }
        String::from_utf8(bytes.to_vec()).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

/// `application/x-www-form-urlencoded` codec for key/value payloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormCodec;

impl<T> BodyCodec<T> for FormCodec
where
    T: Serialize + DeserializeOwned,
{
    fn content_type(&self) -> ContentType {
        ContentType::new(ContentType::FORM)
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_urlencoded::to_string(value)?.into_bytes())
    }

    fn decode(&self, content_type: Option<&ContentType>, bytes: &[u8]) -> Result<T> {
        check_declared(content_type, ContentType::FORM)?;
        Ok(serde_urlencoded::from_bytes(bytes)?)
    }
}

/// `application/json` codec backed by `serde_json`
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl<T> BodyCodec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn content_type(&self) -> ContentType {
        ContentType::new(ContentType::JSON)
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| HttpError::Encode(e.to_string()))
    }

    fn decode(&self, content_type: Option<&ContentType>, bytes: &[u8]) -> Result<T> {
        decode_json(content_type, bytes)
    }
}

/// Decode a JSON body; only needs `DeserializeOwned`
#[cfg(feature = "json")]
pub(crate) fn decode_json<T: DeserializeOwned>(
    content_type: Option<&ContentType>,
    bytes: &[u8],
) -> Result<T> {
    check_declared(content_type, ContentType::JSON)?;
    Ok(serde_json::from_slice(bytes)?)
}

fn check_declared(declared: Option<&ContentType>, expected: &str) -> Result<()> {
    match declared {
        Some(content_type) if !content_type.matches(expected) => Err(HttpError::Decode(format!(
            "expected {} body, got {}",
            expected,
            content_type.essence()
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Login {
        user: String,
        remember: bool,
    }

    #[test]
    fn test_raw_round_trip() {
        let payload = vec![0u8, 159, 146, 150, 255];
        let bytes = RawCodec.encode(&payload).expect("raw encode");
        let content_type = BodyCodec::<Vec<u8>>::content_type(&RawCodec);
        assert_eq!(content_type.as_str(), "application/octet-stream");

        let decoded = RawCodec
            .decode(Some(&content_type), &bytes)
            .expect("raw decode");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_form_round_trip() {
        let payload = Login {
            user: "jane doe&co".to_string(),
            remember: true,
        };
        let bytes = FormCodec.encode(&payload).expect("form encode");
        assert_eq!(bytes, b"user=jane+doe%26co&remember=true".to_vec());

        let content_type = BodyCodec::<Login>::content_type(&FormCodec);
        let decoded: Login = FormCodec
            .decode(Some(&content_type), &bytes)
            .expect("form decode");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_form_pairs_keep_order() {
        let pairs = vec![
            ("tag".to_string(), "a".to_string()),
            ("tag".to_string(), "b".to_string()),
        ];
        let bytes = FormCodec.encode(&pairs).expect("form encode");
        assert_eq!(bytes, b"tag=a&tag=b".to_vec());

        let decoded: Vec<(String, String)> = FormCodec.decode(None, &bytes).expect("form decode");
        assert_eq!(decoded, pairs);
    }

    #[test]
    fn test_form_rejects_other_content_type() {
        let declared = ContentType::new("application/json");
        let result: Result<Vec<(String, String)>> = FormCodec.decode(Some(&declared), b"a=b");
        assert!(matches!(result, Err(HttpError::Decode(_))));
    }

    #[test]
    fn test_text_rejects_invalid_utf8() {
        let result = TextCodec.decode(None, &[0xff, 0xfe]);
        assert!(matches!(result, Err(HttpError::Decode(_))));

        let latin1 = ContentType::new("text/plain; charset=iso-8859-1");
        let result = TextCodec.decode(Some(&latin1), b"hello");
        assert!(matches!(result, Err(HttpError::Decode(_))));

        let text = TextCodec.decode(None, "héllo".as_bytes()).expect("utf-8 text");
        assert_eq!(text, "héllo");
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_malformed_is_decode_error() {
        let result: Result<Login> = JsonCodec.decode(None, b"{\"user\": ");
        assert!(matches!(result, Err(HttpError::Decode(_))));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_round_trip() {
        let payload = Login {
            user: "root".to_string(),
            remember: false,
        };
        let bytes = JsonCodec.encode(&payload).expect("json encode");
        let content_type = ContentType::new("application/json; charset=utf-8");
        let decoded: Login = JsonCodec
            .decode(Some(&content_type), &bytes)
            .expect("json decode");
        assert_eq!(decoded, payload);
    }
}
