//! HTTP関連の基本型（リクエスト、ヘッダー、ボディ、レスポンスライター）

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Cursor, Read};

use bytes::Bytes;
use http::Extensions;
use log::warn;
use serde::de::DeserializeOwned;

use crate::error::Error;

pub use http::Method;

/// 標準のステータス理由句を取得（未知のコードは空文字）
pub fn status_text(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

/// 大文字小文字を区別しないHTTPヘッダーマップ
///
/// キーは格納時に小文字へ正規化される。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    /// 空のヘッダーマップを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// ヘッダー値を取得
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// ヘッダー値を設定（既存値は置き換え）
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.inner
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// ヘッダー値を追加。既に値がある場合は`, `で連結する
    pub fn append(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        let key = name.as_ref().to_ascii_lowercase();
        match self.inner.get_mut(&key) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value.as_ref());
            }
            None => {
                self.inner.insert(key, value.as_ref().to_string());
            }
        }
    }

    /// ヘッダーを削除
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.inner.remove(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_ascii_lowercase())
    }

    /// ヘッダー値にトークンが含まれるか（大文字小文字を区別しない部分一致）
    pub fn contains_token(&self, name: &str, token: &str) -> bool {
        self.get(name)
            .map(|v| v.to_ascii_lowercase().contains(&token.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.set(k, v);
        }
        headers
    }
}

/// リクエストボディ
///
/// 先頭から一度だけ読み出せるバイト列。メモリ上のバッファと任意のストリームの両方を包む。
pub struct Body {
    reader: Box<dyn Read + Send>,
}

impl Body {
    /// 空のボディ
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// バッファ済みバイト列からボディを作成
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            reader: Box::new(Cursor::new(bytes.into())),
        }
    }

    /// 任意のストリームからボディを作成
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

/// HTTPリクエスト
#[derive(Debug)]
pub struct Request {
    /// HTTPメソッド
    pub method: Method,
    /// リクエストパス
    pub path: String,
    /// 生のクエリ文字列（`?`は含まない）
    pub query: Option<String>,
    /// HTTPヘッダー
    pub headers: Headers,
    body: Body,
    extensions: Extensions,
}

impl Request {
    /// 新しいリクエストを作成
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: Headers::new(),
            body: Body::empty(),
            extensions: Extensions::new(),
        }
    }

    /// クエリ文字列を設定
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// ヘッダーを追加
    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.set(key, value);
        self
    }

    /// ボディを設定
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::from_bytes(body);
        self
    }

    /// ストリームをボディとして設定
    pub fn with_body_reader<R: Read + Send + 'static>(mut self, reader: R) -> Self {
        self.body = Body::from_reader(reader);
        self
    }

    /// ヘッダー値を取得
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("user-agent")
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// 残りのボディを全て読み出す（ボディは消費される）
    pub fn read_body(&mut self) -> io::Result<Bytes> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// ボディを新しいバイト列で置き換える
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = Body::from_bytes(body);
    }

    /// ボディをJSONとして読み込み、同じ内容で再読可能な状態に戻す
    pub fn parse_body_param<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        crate::handler::body::parse_body_param(self)
    }

    /// 型付き拡張データの不変参照を取得
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// 型付き拡張データの可変参照を取得
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

/// レスポンスの書き込み先
pub trait ResponseWriter {
    /// 送信予定のレスポンスヘッダー
    fn headers(&self) -> &Headers;

    fn headers_mut(&mut self) -> &mut Headers;

    /// ステータスコードを送信する。2回目以降の呼び出しは無視される
    fn write_header(&mut self, status: u16);

    /// ボディを書き込む。ステータス未送信なら200を暗黙に送信する
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// 書き込み内容がこの層で圧縮される場合はtrue
    fn is_compressing(&self) -> bool {
        false
    }

    /// バッファ全体を書き込む
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ))
                }
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// メモリ上に記録するHTTPレスポンス
///
/// サーバーアダプタとテストの両方で`ResponseWriter`として使う。
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTPステータスコード
    pub status: u16,
    /// HTTPヘッダー
    pub headers: Headers,
    /// レスポンスボディ
    pub body: Vec<u8>,
    header_written: bool,
}

impl Response {
    /// 新しいレスポンスを作成
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Headers::new(),
            body: Vec::new(),
            header_written: false,
        }
    }

    /// ステータスが送信済みかどうか
    pub fn header_written(&self) -> bool {
        self.header_written
    }

    /// ボディをUTF-8文字列として取得（不正なバイトは置換）
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// ボディをJSONとしてパース
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::InvalidRequestBody(e.to_string()))
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter for Response {
    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn write_header(&mut self, status: u16) {
        if self.header_written {
            warn!("Superfluous write_header call with status {}", status);
            return;
        }
        self.status = status;
        self.header_written = true;
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.header_written {
            self.write_header(200);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }
}
