//! エラー型の定義

use thiserror::Error;

/// アプリケーションのエラー型
#[derive(Error, Debug)]
pub enum Error {
    /// 無効なリクエストボディ（JSONデコード失敗）
    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    /// リクエストボディの読み込み失敗
    #[error("Failed to read request body: {0}")]
    BodyRead(#[from] std::io::Error),

    /// ルーティングパターンの不備
    #[error("Invalid route pattern: {0}")]
    InvalidRoutePattern(String),

    /// レスポンスのシリアライズエラー
    #[error("Failed to serialize response: {0}")]
    ResponseSerializationError(String),

    /// 設定エラー
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl Error {
    /// エラーからHTTPステータスコードを取得
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidRequestBody(_) => 400,
            Error::BodyRead(_) => 400,
            Error::InvalidRoutePattern(_) => 500,
            Error::ResponseSerializationError(_) => 500,
            Error::ConfigurationError(_) => 500,
        }
    }
}
