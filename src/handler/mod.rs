//! ハンドラーの実装（分割モジュール）

pub mod body;
pub mod envelope;
pub mod extend;
pub mod gzip;
pub mod hooks;
pub mod mux;
pub mod reply;

use crate::common::{Request, ResponseWriter};

pub use body::parse_body_param;
pub use envelope::{
    build_envelope, write_envelope, Envelope, FieldNames, HandlerError, JsonPayload, Payload, Reply,
};
pub use extend::{ExtendedHandler, Extender, ExtenderBuilder};
pub use gzip::{gzip, GzipDecodeFailed, GzipHandler, GzipResponseWriter};
pub use hooks::{access_log, BeginHook, EndHook, HandleResult, HookRegistry};
pub use mux::Mux;

/// ハンドラーの特性
///
/// `Fn(&mut dyn ResponseWriter, &mut Request)`のクロージャはそのままハンドラーとして使える。
pub trait Handler: Send + Sync {
    /// リクエストを処理し、レスポンスを書き込む
    fn serve(&self, w: &mut dyn ResponseWriter, req: &mut Request);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseWriter, &mut Request) + Send + Sync,
{
    fn serve(&self, w: &mut dyn ResponseWriter, req: &mut Request) {
        self(w, req)
    }
}
