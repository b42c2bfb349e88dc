//! ビジネスハンドラーをJSONエンベロープとフックで包む拡張ハンドラー

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use log::debug;

use crate::common::{Method, Request, ResponseWriter};
use crate::config::Config;
use crate::error::Error;

use super::envelope::{write_envelope, FieldNames, HandlerError, Payload, Reply};
use super::hooks::{HandleResult, HookRegistry};
use super::Handler;

/// 共有状態（フック、フィールド名、CORS設定）
struct State {
    hooks: HookRegistry,
    fields: FieldNames,
    cors: bool,
}

/// フック登録とエンベロープ設定を保持するコンテキスト
///
/// 状態は単一の読み書きロックで保護される。フックの実行中は読み取りロックを保持するため、
/// フックの中から同じ`Extender`へフックを登録してはならない。
pub struct Extender {
    state: RwLock<State>,
}

impl Extender {
    /// デフォルト設定の`Extender`を作成
    pub fn new() -> Arc<Self> {
        ExtenderBuilder::new().build()
    }

    /// 新しいExtenderBuilderインスタンスを作成
    pub fn builder() -> ExtenderBuilder {
        ExtenderBuilder::new()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 前処理フックを追加
    pub fn add_begin_hook<F>(&self, hook: F)
    where
        F: Fn(&mut dyn ResponseWriter, &mut Request) + Send + Sync + 'static,
    {
        self.write().hooks.add_begin_hook(hook);
    }

    /// 後処理フックを追加
    pub fn add_end_hook<F>(&self, hook: F)
    where
        F: Fn(&mut dyn ResponseWriter, &mut Request, &HandleResult) + Send + Sync + 'static,
    {
        self.write().hooks.add_end_hook(hook);
    }

    /// 従来形式の後処理フックを追加
    pub fn add_legacy_end_hook<F>(&self, hook: F)
    where
        F: Fn(&mut dyn ResponseWriter, &mut Request, &Payload, u16, Option<&HandlerError>, Duration)
            + Send
            + Sync
            + 'static,
    {
        self.write().hooks.add_legacy_end_hook(hook);
    }

    /// CORSヘッダー付与の有効/無効を切り替え
    pub fn set_cors(&self, enabled: bool) {
        self.write().cors = enabled;
    }

    pub fn cors_enabled(&self) -> bool {
        self.read().cors
    }

    /// データフィールド名を変更。不正な名前なら設定は変わらない
    pub fn set_data_field_name(&self, name: impl Into<String>) -> Result<(), Error> {
        self.write().fields.set_data(name)
    }

    /// コードフィールド名を変更。不正な名前なら設定は変わらない
    pub fn set_code_field_name(&self, name: impl Into<String>) -> Result<(), Error> {
        self.write().fields.set_code(name)
    }

    /// メッセージフィールド名を変更。不正な名前なら設定は変わらない
    pub fn set_message_field_name(&self, name: impl Into<String>) -> Result<(), Error> {
        self.write().fields.set_message(name)
    }

    /// 現在のフィールド名
    pub fn field_names(&self) -> FieldNames {
        self.read().fields.clone()
    }

    /// ビジネスハンドラーを包んだハンドラーを作成
    pub fn extend<F>(self: &Arc<Self>, business: F) -> ExtendedHandler<F>
    where
        F: Fn(&mut Request) -> Reply + Send + Sync,
    {
        ExtendedHandler {
            extender: Arc::clone(self),
            business,
        }
    }
}

/// `Extender`を構築するためのビルダー
#[derive(Default)]
pub struct ExtenderBuilder {
    hooks: HookRegistry,
    fields: FieldNames,
    cors: bool,
}

impl ExtenderBuilder {
    /// 新しいExtenderBuilderインスタンスを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 環境設定を適用
    pub fn config(mut self, config: &Config) -> Self {
        self.fields = config.fields.clone();
        self.cors = config.cors;
        self
    }

    /// CORSヘッダー付与を設定
    pub fn cors(mut self, enabled: bool) -> Self {
        self.cors = enabled;
        self
    }

    /// フィールド名を設定
    pub fn fields(mut self, fields: FieldNames) -> Self {
        self.fields = fields;
        self
    }

    /// 前処理フックを追加
    pub fn begin_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut dyn ResponseWriter, &mut Request) + Send + Sync + 'static,
    {
        self.hooks.add_begin_hook(hook);
        self
    }

    /// 後処理フックを追加
    pub fn end_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut dyn ResponseWriter, &mut Request, &HandleResult) + Send + Sync + 'static,
    {
        self.hooks.add_end_hook(hook);
        self
    }

    /// `Extender`をビルドして返却
    pub fn build(self) -> Arc<Extender> {
        Arc::new(Extender {
            state: RwLock::new(State {
                hooks: self.hooks,
                fields: self.fields,
                cors: self.cors,
            }),
        })
    }
}

/// エンベロープとフックで包まれたビジネスハンドラー
pub struct ExtendedHandler<F> {
    extender: Arc<Extender>,
    business: F,
}

impl<F> ExtendedHandler<F> {
    pub fn extender(&self) -> &Arc<Extender> {
        &self.extender
    }
}

impl<F> Handler for ExtendedHandler<F>
where
    F: Fn(&mut Request) -> Reply + Send + Sync,
{
    fn serve(&self, w: &mut dyn ResponseWriter, req: &mut Request) {
        let start = Instant::now();

        let (cors, fields) = {
            let state = self.extender.read();
            state.hooks.run_begin_hooks(w, req);
            (state.cors, state.fields.clone())
        };

        if cors {
            apply_cors_headers(w, req);
        }

        // プリフライトは本処理も後処理フックも行わない
        if req.method == Method::OPTIONS {
            debug!("Answering preflight request for {}", req.path);
            w.write_header(200);
            return;
        }

        let (payload, status, err) = (self.business)(req);
        let response_status = write_envelope(w, &payload, status, err.as_ref(), &fields);

        let result = HandleResult {
            data: payload,
            status_code: status,
            err,
            response_status,
            cost: start.elapsed(),
        };
        self.extender.read().hooks.run_end_hooks(w, req, &result);
    }
}

fn apply_cors_headers(w: &mut dyn ResponseWriter, req: &Request) {
    let origin = req
        .header("origin")
        .filter(|o| !o.is_empty())
        .unwrap_or("*");
    let headers = w.headers_mut();
    headers.set("Access-Control-Allow-Origin", origin);
    headers.set("Access-Control-Allow-Credentials", "true");

    if req.method == Method::OPTIONS {
        if let Some(method) = req.header("access-control-request-method") {
            headers.set("Access-Control-Allow-Methods", method);
        }
        if let Some(allow) = req.header("access-control-request-headers") {
            headers.set("Access-Control-Allow-Headers", allow);
        }
    }
}
