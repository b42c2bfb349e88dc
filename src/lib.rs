//! wrapkit: HTTPハンドラー向けのJSONエンベロープ、gzipネゴシエーション、前後処理フック
//!
//! ビジネスロジックは`(ペイロード, ステータス, エラー)`を返すだけでよく、
//! 統一されたJSONレスポンスの組み立て、CORS、フックの呼び出しは[`Extender`]が行う。

pub mod common;
pub mod config;
pub mod error;
pub mod handler;

#[cfg(feature = "server")]
pub mod server;

pub use common::{
    detect_content_type, status_text, Body, Headers, Method, Request, Response, ResponseWriter,
};
pub use config::Config;
pub use error::*;
pub use handler::*;
