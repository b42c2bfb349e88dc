//! gzipによるリクエスト伸長・レスポンス圧縮ミドルウェア

use std::io::{self, Read, Write};

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, error, warn};

use crate::common::{detect_content_type, get_max_body_size, Headers, Request, ResponseWriter};

use super::Handler;

/// gzipボディの伸長に失敗したリクエストに付与される拡張データ
///
/// この場合、ボディは受信した圧縮済みのバイト列のままハンドラーに渡される。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GzipDecodeFailed;

/// ハンドラーをgzipミドルウェアで包む
pub fn gzip<H: Handler>(inner: H) -> GzipHandler<H> {
    GzipHandler::new(inner)
}

/// gzipミドルウェア
///
/// - `Content-Encoding`にgzipを含むリクエストはボディを伸長してから渡す
/// - `Accept-Encoding`にgzipを含むリクエストにはレスポンスを圧縮して返す
pub struct GzipHandler<H> {
    inner: H,
}

impl<H> GzipHandler<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: Handler> Handler for GzipHandler<H> {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &mut Request) {
        if req.headers.contains_token("content-encoding", "gzip") {
            decompress_request_body(req);
        }

        if !req.headers.contains_token("accept-encoding", "gzip") {
            self.inner.serve(w, req);
            return;
        }

        w.headers_mut().set("Content-Encoding", "gzip");

        // パニック時はエンコーダーのDropでストリームが閉じられる
        let mut gz = GzipResponseWriter::new(w);
        self.inner.serve(&mut gz, req);
        if let Err(e) = gz.finish() {
            error!("Failed to finish gzip response stream: {}", e);
        }
    }
}

/// gzipボディを伸長してリクエストのボディを差し替える
///
/// 連結された複数のgzipメンバーは全て伸長する。伸長に失敗した場合、または伸長後の
/// サイズが`WRAPKIT_MAX_BODY_SIZE`を超える場合は元のバイト列を残し、
/// [`GzipDecodeFailed`]を付与する。
pub fn decompress_request_body(req: &mut Request) {
    let raw = match req.read_body() {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to read gzip-encoded request body: {}", e);
            req.set_body(Bytes::new());
            req.extensions_mut().insert(GzipDecodeFailed);
            return;
        }
    };

    match decompress(&raw, get_max_body_size()) {
        Ok(plain) => {
            debug!("Decompressed request body: {} -> {} bytes", raw.len(), plain.len());
            if req.headers.contains("content-length") {
                req.headers.set("Content-Length", plain.len().to_string());
            }
            req.headers.remove("content-encoding");
            req.set_body(plain);
        }
        Err(e) => {
            warn!(
                "Failed to decompress gzip request body, passing raw bytes through: {}",
                e
            );
            req.set_body(raw);
            req.extensions_mut().insert(GzipDecodeFailed);
        }
    }
}

fn decompress(data: &[u8], limit: usize) -> io::Result<Vec<u8>> {
    let mut decoder = MultiGzDecoder::new(data).take(limit as u64 + 1);
    let mut plain = Vec::new();
    decoder.read_to_end(&mut plain)?;
    if plain.len() > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("decompressed body exceeds {} bytes", limit),
        ));
    }
    Ok(plain)
}

/// 書き込みを下位のレスポンスライターへそのまま流すアダプタ
struct Passthrough<'a> {
    inner: &'a mut dyn ResponseWriter,
}

impl Write for Passthrough<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 書き込みをgzip圧縮するレスポンスライター
///
/// `finish`を呼ぶまで圧縮ストリームは閉じられない。
pub struct GzipResponseWriter<'a> {
    encoder: GzEncoder<Passthrough<'a>>,
}

impl<'a> GzipResponseWriter<'a> {
    pub fn new(inner: &'a mut dyn ResponseWriter) -> Self {
        Self {
            encoder: GzEncoder::new(Passthrough { inner }, Compression::default()),
        }
    }

    /// 圧縮ストリームを閉じ、残りのデータとトレーラーを書き出す
    pub fn finish(self) -> io::Result<()> {
        self.encoder.finish().map(|_| ())
    }
}

impl ResponseWriter for GzipResponseWriter<'_> {
    fn headers(&self) -> &Headers {
        self.encoder.get_ref().inner.headers()
    }

    fn headers_mut(&mut self) -> &mut Headers {
        self.encoder.get_mut().inner.headers_mut()
    }

    fn write_header(&mut self, status: u16) {
        self.encoder.get_mut().inner.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.headers().contains("content-type") {
            let content_type = detect_content_type(buf);
            self.headers_mut().set("Content-Type", content_type);
        }
        self.encoder.write(buf)
    }

    fn is_compressing(&self) -> bool {
        true
    }
}
