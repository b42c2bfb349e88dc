//! JSONレスポンスエンベロープ
//!
//! 成功時は `{"data": <payload>, "errno": 0}`、失敗時は `{"errmsg": "<message>", "errno": <status>}`
//! を返す。フィールド名は[`FieldNames`]で変更できる。

use std::fmt;

use bytes::Bytes;
use log::{error, warn};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::common::{status_text, ResponseWriter};
use crate::error::Error;

/// ビジネスハンドラーが返すエラー
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// ビジネスハンドラーの返り値 `(payload, statusCode, error)`
pub type Reply = (Payload, u16, Option<HandlerError>);

/// エンベロープ構築時にJSONへ変換される値
pub trait JsonPayload: Send + Sync {
    fn to_json(&self) -> Result<Value, serde_json::Error>;
}

impl<T: Serialize + Send + Sync> JsonPayload for T {
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// ビジネスハンドラーが返すペイロード
pub enum Payload {
    /// そのままレスポンスボディとして書き込むバイト列（エンベロープなし）
    Raw(Bytes),
    /// エンベロープのデータフィールドに入る値
    Json(Box<dyn JsonPayload>),
}

impl Payload {
    /// シリアライズ可能な値からペイロードを作成
    pub fn json<T: Serialize + Send + Sync + 'static>(value: T) -> Self {
        Payload::Json(Box::new(value))
    }

    /// 生のバイト列からペイロードを作成
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Payload::Raw(bytes.into())
    }

    /// JSONの`null`
    pub fn null() -> Self {
        Payload::json(Value::Null)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Payload::Raw(_))
    }

    pub fn as_raw(&self) -> Option<&Bytes> {
        match self {
            Payload::Raw(bytes) => Some(bytes),
            Payload::Json(_) => None,
        }
    }

    /// JSON値として取得（生バイト列の場合は`None`）
    pub fn to_json(&self) -> Option<Result<Value, serde_json::Error>> {
        match self {
            Payload::Raw(_) => None,
            Payload::Json(value) => Some(value.to_json()),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::null()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Raw(bytes) => write!(f, "Raw({} bytes)", bytes.len()),
            Payload::Json(value) => match value.to_json() {
                Ok(v) => write!(f, "Json({})", v),
                Err(e) => write!(f, "Json(<unserializable: {}>)", e),
            },
        }
    }
}

/// エンベロープのフィールド名
///
/// 3つの名前は常に空でなく、互いに異なる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    data: String,
    code: String,
    message: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            data: "data".to_string(),
            code: "errno".to_string(),
            message: "errmsg".to_string(),
        }
    }
}

impl FieldNames {
    /// フィールド名を指定して作成
    pub fn new(
        data: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, Error> {
        let names = Self {
            data: data.into(),
            code: code.into(),
            message: message.into(),
        };
        names.validate()?;
        Ok(names)
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// データフィールド名を変更。不正な場合は変更しない
    pub fn set_data(&mut self, name: impl Into<String>) -> Result<(), Error> {
        self.replace_with(Self {
            data: name.into(),
            ..self.clone()
        })
    }

    /// コードフィールド名を変更。不正な場合は変更しない
    pub fn set_code(&mut self, name: impl Into<String>) -> Result<(), Error> {
        self.replace_with(Self {
            code: name.into(),
            ..self.clone()
        })
    }

    /// メッセージフィールド名を変更。不正な場合は変更しない
    pub fn set_message(&mut self, name: impl Into<String>) -> Result<(), Error> {
        self.replace_with(Self {
            message: name.into(),
            ..self.clone()
        })
    }

    fn replace_with(&mut self, candidate: Self) -> Result<(), Error> {
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    fn validate(&self) -> Result<(), Error> {
        let names = [
            ("data", &self.data),
            ("code", &self.code),
            ("message", &self.message),
        ];
        for (role, name) in names {
            if name.is_empty() {
                return Err(Error::ConfigurationError(format!(
                    "{} field name must not be empty",
                    role
                )));
            }
        }
        if self.data == self.code || self.data == self.message || self.code == self.message {
            return Err(Error::ConfigurationError(format!(
                "field names must be distinct: data={:?}, code={:?}, message={:?}",
                self.data, self.code, self.message
            )));
        }
        Ok(())
    }
}

/// 書き込み用に組み立てたレスポンス
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// 送信するステータスコード
    pub status: u16,
    /// 送信するボディ
    pub body: Bytes,
}

/// ハンドラーの返り値からステータスとボディを組み立てる
///
/// エラーがある、またはステータスが200以外の場合は失敗エンベロープになる。
/// エラー付きの200は400に置き換え、エラーがなければステータスの理由句をメッセージにする。
pub fn build_envelope(
    payload: &Payload,
    status: u16,
    err: Option<&HandlerError>,
    fields: &FieldNames,
) -> Result<Envelope, Error> {
    let value = match payload {
        Payload::Raw(bytes) => {
            return Ok(Envelope {
                status,
                body: bytes.clone(),
            })
        }
        Payload::Json(value) => value,
    };

    let mut map = Map::new();
    let status = if err.is_some() || status != 200 {
        let status = if status == 200 { 400 } else { status };
        let message = match err {
            Some(e) => e.to_string(),
            None => status_text(status).to_string(),
        };
        map.insert(fields.code.clone(), Value::from(status));
        map.insert(fields.message.clone(), Value::String(message));
        status
    } else {
        let data = value
            .to_json()
            .map_err(|e| Error::ResponseSerializationError(e.to_string()))?;
        map.insert(fields.data.clone(), data);
        map.insert(fields.code.clone(), Value::from(0));
        status
    };

    let body = serde_json::to_vec(&Value::Object(map))
        .map_err(|e| Error::ResponseSerializationError(e.to_string()))?;
    Ok(Envelope {
        status,
        body: Bytes::from(body),
    })
}

/// エンベロープを組み立ててレスポンスに書き込み、送信したステータスを返す
///
/// 圧縮中のライターには`Content-Length`を付けない。
pub fn write_envelope(
    w: &mut dyn ResponseWriter,
    payload: &Payload,
    status: u16,
    err: Option<&HandlerError>,
    fields: &FieldNames,
) -> u16 {
    let envelope = match build_envelope(payload, status, err, fields) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!("Failed to build response envelope: {}", e);
            let text = match e {
                Error::ResponseSerializationError(msg) => msg,
                other => other.to_string(),
            };
            w.write_header(500);
            if let Err(e) = w.write_all(text.as_bytes()) {
                warn!("Failed to write error body: {}", e);
            }
            return 500;
        }
    };

    w.headers_mut().set("Content-Type", "application/json");
    if !w.is_compressing() {
        w.headers_mut()
            .set("Content-Length", envelope.body.len().to_string());
    }
    w.write_header(envelope.status);
    if let Err(e) = w.write_all(&envelope.body) {
        warn!("Failed to write response body: {}", e);
    }
    envelope.status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Response;
    use serde_json::json;
    use std::collections::HashMap;

    fn envelope_json(payload: &Payload, status: u16, err: Option<&HandlerError>) -> (u16, Value) {
        let envelope = build_envelope(payload, status, err, &FieldNames::default()).unwrap();
        (envelope.status, serde_json::from_slice(&envelope.body).unwrap())
    }

    #[test]
    fn test_success_envelope_exact_bytes() {
        let payload = Payload::json(json!({"x": 1}));
        let envelope = build_envelope(&payload, 200, None, &FieldNames::default()).unwrap();
        assert_eq!(envelope.status, 200);
        assert_eq!(envelope.body.as_ref(), br#"{"data":{"x":1},"errno":0}"#);
    }

    #[test]
    fn test_error_with_ok_status_becomes_bad_request() {
        let err: HandlerError = "bad".into();
        let (status, body) = envelope_json(&Payload::null(), 200, Some(&err));
        assert_eq!(status, 400);
        assert_eq!(body, json!({"errno": 400, "errmsg": "bad"}));
    }

    #[test]
    fn test_status_text_synthesized() {
        let (status, body) = envelope_json(&Payload::null(), 404, None);
        assert_eq!(status, 404);
        assert_eq!(body, json!({"errno": 404, "errmsg": "Not Found"}));
    }

    #[test]
    fn test_raw_payload_bypasses_envelope() {
        let payload = Payload::raw(Bytes::from_static(b"plain bytes"));
        let err: HandlerError = "ignored".into();
        let envelope = build_envelope(&payload, 202, Some(&err), &FieldNames::default()).unwrap();
        assert_eq!(envelope.status, 202);
        assert_eq!(envelope.body.as_ref(), b"plain bytes");
    }

    #[test]
    fn test_custom_field_names() {
        let fields = FieldNames::new("result", "code", "message").unwrap();
        let envelope = build_envelope(&Payload::json(vec![1, 2]), 200, None, &fields).unwrap();
        let body: Value = serde_json::from_slice(&envelope.body).unwrap();
        assert_eq!(body, json!({"result": [1, 2], "code": 0}));
    }

    #[test]
    fn test_unserializable_payload_is_error() {
        // 文字列以外のキーを持つマップはJSONにできない
        let mut map = HashMap::new();
        map.insert((1, 2), "v");
        let result = build_envelope(&Payload::json(map), 200, None, &FieldNames::default());
        assert!(matches!(result, Err(Error::ResponseSerializationError(_))));
    }

    #[test]
    fn test_write_envelope_headers() {
        let mut res = Response::new();
        let payload = Payload::json("hi");
        let status = write_envelope(&mut res, &payload, 200, None, &FieldNames::default());
        assert_eq!(status, 200);
        assert_eq!(res.status, 200);
        assert_eq!(res.headers.get("content-type"), Some("application/json"));
        assert_eq!(res.headers.get("content-length"), Some(res.body.len().to_string().as_str()));
        assert_eq!(res.body_text(), r#"{"data":"hi","errno":0}"#);
    }

    #[test]
    fn test_write_envelope_serialization_failure() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1);
        let mut res = Response::new();
        let payload = Payload::json(map);
        let status = write_envelope(&mut res, &payload, 200, None, &FieldNames::default());
        assert_eq!(status, 500);
        assert_eq!(res.status, 500);
        assert!(res.headers.get("content-type").is_none());
        assert!(!res.body.is_empty());
    }

    #[test]
    fn test_field_names_validation() {
        let mut fields = FieldNames::default();
        assert!(fields.set_data("errno").is_err());
        assert!(fields.set_code("").is_err());
        assert!(fields.set_message("data").is_err());
        assert_eq!(fields, FieldNames::default());

        fields.set_data("payload").unwrap();
        assert_eq!(fields.data(), "payload");
        assert_eq!(fields.code(), "errno");
        assert_eq!(fields.message(), "errmsg");

        assert!(FieldNames::new("a", "a", "b").is_err());
    }

    #[test]
    fn test_payload_debug() {
        assert_eq!(format!("{:?}", Payload::raw(vec![1u8, 2, 3])), "Raw(3 bytes)");
        assert_eq!(format!("{:?}", Payload::json(json!({"a": 1}))), r#"Json({"a":1})"#);
    }
}
