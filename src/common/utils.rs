//! 共通ユーティリティ関数群（環境設定の読み込み、ヘッダー検証）

use std::env;

/// リクエストボディの最大サイズのデフォルト（5MB）
pub const DEFAULT_MAX_BODY_SIZE: usize = 5 * 1024 * 1024;

/// リクエストボディの最大サイズ（バイト）を取得する
/// 優先順位: 環境変数 `WRAPKIT_MAX_BODY_SIZE` -> デフォルト 5MB
pub fn get_max_body_size() -> usize {
    env::var("WRAPKIT_MAX_BODY_SIZE")
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_BODY_SIZE)
}

/// 真偽値の環境変数を読む。未設定・解釈不能なら`None`
pub fn env_flag(key: &str) -> Option<bool> {
    let value = env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// ヘッダー値に使用可能な文字かを判定（水平タブ以外の制御文字とCRLFを拒否）
pub fn is_header_value_valid(value: &str) -> bool {
    value.chars().all(|c| {
        let code = c as u32;
        (code >= 0x20 || c == '\t') && code != 0x7F
    })
}
