//! actix-webによるHTTPサーバー実装

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::web::{self, Bytes};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use log::{error, info, warn};

use crate::common::{get_max_body_size, is_header_value_valid, Method, Request, Response};
use crate::handler::Handler;

/// actix-webのリクエストから共通形式のRequestに変換
pub fn convert_request(req: &HttpRequest, body: Bytes) -> Request {
    let method = Method::from_bytes(req.method().as_str().as_bytes()).unwrap_or(Method::GET);

    let mut request = Request::new(method, req.uri().path());
    if let Some(query) = req.uri().query() {
        request = request.with_query(query);
    }
    for (key, value) in req.headers().iter() {
        if let Ok(value_str) = value.to_str() {
            request.headers.append(key.as_str(), value_str);
        }
    }
    request.with_body(body.to_vec())
}

/// 共通形式のResponseからactix-webのHttpResponseに変換
pub fn convert_response(response: Response) -> HttpResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);

    for (key, value) in response.headers.iter() {
        // Content-Lengthはボディから算出される
        if key == "content-length" {
            continue;
        }
        if !is_header_value_valid(value) {
            warn!("Dropping response header with invalid value: {}", key);
            continue;
        }
        builder.insert_header((key.to_string(), value.to_string()));
    }

    builder.body(response.body)
}

async fn dispatch(
    req: HttpRequest,
    body: Bytes,
    handler: web::Data<Arc<dyn Handler>>,
) -> HttpResponse {
    let request = convert_request(&req, body);
    let handler = Arc::clone(handler.get_ref());

    // ハンドラーは同期処理のためブロッキングプールで実行する
    let result = web::block(move || {
        let mut request = request;
        let mut response = Response::new();
        handler.serve(&mut response, &mut request);
        response
    })
    .await;

    match result {
        Ok(response) => convert_response(response),
        Err(e) => {
            error!("Handler failed for {} {}: {}", req.method(), req.path(), e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// 全てのパスとメソッドを`handler`に流すサービス設定
pub fn configure(handler: Arc<dyn Handler>) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(Arc::clone(&handler)))
            .app_data(web::PayloadConfig::new(get_max_body_size()))
            .route("/{path:.*}", web::route().to(dispatch));
    }
}

/// ハンドラーをHTTPサーバーとして実行
pub async fn run_server<H>(handler: H, host: &str, port: u16) -> std::io::Result<()>
where
    H: Handler + 'static,
{
    info!("Starting HTTP server on {}:{}", host, port);

    let handler: Arc<dyn Handler> = Arc::new(handler);
    HttpServer::new(move || App::new().configure(configure(Arc::clone(&handler))))
        .bind((host, port))?
        .run()
        .await
}
