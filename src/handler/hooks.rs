//! リクエスト前後のフック

use std::time::Duration;

use log::info;

use crate::common::{Request, ResponseWriter};

use super::envelope::{HandlerError, Payload};

/// ビジネスハンドラーの処理結果（後処理フックに渡される）
#[derive(Debug)]
pub struct HandleResult {
    /// ハンドラーが返したペイロード
    pub data: Payload,
    /// ハンドラーが返したステータスコード
    pub status_code: u16,
    /// ハンドラーが返したエラー
    pub err: Option<HandlerError>,
    /// 実際に送信したステータスコード
    pub response_status: u16,
    /// 前処理フック開始からレスポンス書き込み完了までの時間
    pub cost: Duration,
}

/// 前処理フック
pub type BeginHook = Box<dyn Fn(&mut dyn ResponseWriter, &mut Request) + Send + Sync>;

/// 後処理フック
pub type EndHook = Box<dyn Fn(&mut dyn ResponseWriter, &mut Request, &HandleResult) + Send + Sync>;

/// 登録順に呼び出されるフックの一覧
///
/// 追加のみで、削除や重複排除は行わない。
#[derive(Default)]
pub struct HookRegistry {
    begin: Vec<BeginHook>,
    end: Vec<EndHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 前処理フックを追加
    pub fn add_begin_hook<F>(&mut self, hook: F)
    where
        F: Fn(&mut dyn ResponseWriter, &mut Request) + Send + Sync + 'static,
    {
        self.begin.push(Box::new(hook));
    }

    /// 後処理フックを追加
    pub fn add_end_hook<F>(&mut self, hook: F)
    where
        F: Fn(&mut dyn ResponseWriter, &mut Request, &HandleResult) + Send + Sync + 'static,
    {
        self.end.push(Box::new(hook));
    }

    /// 従来形式（結果を個別の引数で受け取る）の後処理フックを追加
    pub fn add_legacy_end_hook<F>(&mut self, hook: F)
    where
        F: Fn(&mut dyn ResponseWriter, &mut Request, &Payload, u16, Option<&HandlerError>, Duration)
            + Send
            + Sync
            + 'static,
    {
        self.add_end_hook(
            move |w: &mut dyn ResponseWriter, req: &mut Request, result: &HandleResult| {
                hook(
                    w,
                    req,
                    &result.data,
                    result.status_code,
                    result.err.as_ref(),
                    result.cost,
                )
            },
        );
    }

    /// 前処理フックを登録順に実行
    pub fn run_begin_hooks(&self, w: &mut dyn ResponseWriter, req: &mut Request) {
        for hook in &self.begin {
            hook(w, req);
        }
    }

    /// 後処理フックを登録順に実行
    pub fn run_end_hooks(
        &self,
        w: &mut dyn ResponseWriter,
        req: &mut Request,
        result: &HandleResult,
    ) {
        for hook in &self.end {
            hook(w, req, result);
        }
    }

    pub fn begin_hook_count(&self) -> usize {
        self.begin.len()
    }

    pub fn end_hook_count(&self) -> usize {
        self.end.len()
    }
}

/// アクセスログを出力する後処理フック
///
/// 形式: `METHOD path status seconds user-agent`
pub fn access_log(
) -> impl Fn(&mut dyn ResponseWriter, &mut Request, &HandleResult) + Send + Sync + 'static {
    |_w: &mut dyn ResponseWriter, req: &mut Request, result: &HandleResult| {
        info!(
            "{} {} {} {:.6} {}",
            req.method,
            req.path,
            result.response_status,
            result.cost.as_secs_f64(),
            req.user_agent().unwrap_or("-")
        );
    }
}
