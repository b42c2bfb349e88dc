//! 環境変数による設定

use std::env;

use crate::common::{env_flag, get_max_body_size};
use crate::error::Error;
use crate::handler::FieldNames;

/// 実行時設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// CORSヘッダーを付与するか
    pub cors: bool,
    /// エンベロープのフィールド名
    pub fields: FieldNames,
    /// リクエストボディの最大サイズ（バイト）
    pub max_body_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cors: false,
            fields: FieldNames::default(),
            max_body_size: crate::common::utils::DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl Config {
    /// 環境変数から設定を読み込む
    ///
    /// - `WRAPKIT_CORS`: `1`/`true`/`yes`/`on`で有効
    /// - `WRAPKIT_DATA_FIELD` / `WRAPKIT_CODE_FIELD` / `WRAPKIT_MESSAGE_FIELD`: フィールド名
    /// - `WRAPKIT_MAX_BODY_SIZE`: ボディサイズ上限
    pub fn from_env() -> Result<Self, Error> {
        let cors = match env::var("WRAPKIT_CORS") {
            Ok(raw) => env_flag("WRAPKIT_CORS").ok_or_else(|| {
                Error::ConfigurationError(format!("WRAPKIT_CORS has invalid value: {:?}", raw))
            })?,
            Err(_) => false,
        };

        let defaults = FieldNames::default();
        let fields = FieldNames::new(
            env::var("WRAPKIT_DATA_FIELD").unwrap_or_else(|_| defaults.data().to_string()),
            env::var("WRAPKIT_CODE_FIELD").unwrap_or_else(|_| defaults.code().to_string()),
            env::var("WRAPKIT_MESSAGE_FIELD").unwrap_or_else(|_| defaults.message().to_string()),
        )?;

        Ok(Self {
            cors,
            fields,
            max_body_size: get_max_body_size(),
        })
    }
}
