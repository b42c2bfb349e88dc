//! ビジネスハンドラーの返り値を組み立てる補助関数

use bytes::Bytes;
use serde::Serialize;

use super::envelope::{HandlerError, Payload, Reply};

/// 成功レスポンス（ステータス200）
pub fn ok<T: Serialize + Send + Sync + 'static>(data: T) -> Reply {
    (Payload::json(data), 200, None)
}

/// エラーレスポンス。ステータス200を指定した場合は400として送信される
pub fn fail(status: u16, err: impl Into<HandlerError>) -> Reply {
    (Payload::null(), status, Some(err.into()))
}

/// ステータスのみのレスポンス（メッセージは標準の理由句）
pub fn status(status: u16) -> Reply {
    (Payload::null(), status, None)
}

/// エンベロープを使わずにバイト列をそのまま返す
pub fn raw(status: u16, body: impl Into<Bytes>) -> Reply {
    (Payload::raw(body), status, None)
}

/// `Result`から変換する。`Err`は400として送信される
pub fn from_result<T, E>(result: Result<T, E>) -> Reply
where
    T: Serialize + Send + Sync + 'static,
    E: Into<HandlerError>,
{
    match result {
        Ok(data) => ok(data),
        Err(e) => fail(200, e),
    }
}
