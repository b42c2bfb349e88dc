//! 正規表現パスによる簡易ルーター

use log::{debug, warn};
use regex::Regex;

use crate::common::{Request, ResponseWriter};
use crate::error::Error;

use super::Handler;

/// パターンの安全性を確保（アンカーの確認と追加）
pub fn ensure_safe_pattern(pattern: &str) -> Result<String, Error> {
    if pattern.is_empty() {
        return Err(Error::InvalidRoutePattern("Empty regex pattern is not allowed".to_string()));
    }

    if pattern.starts_with('^') && pattern.ends_with('$') {
        return Ok(pattern.to_string());
    }

    let safe_pattern = format!(
        "^{}$",
        pattern.trim_start_matches('^').trim_end_matches('$')
    );
    warn!(
        "Pattern '{}' lacks proper anchors, converted to '{}'",
        pattern, safe_pattern
    );
    Ok(safe_pattern)
}

struct Route {
    pattern: String,
    regex: Regex,
    handler: Box<dyn Handler>,
}

/// パスに一致した最初のハンドラーへ振り分けるルーター
///
/// `/`の数が多い（より具体的な）パターンが先に評価される。同数の場合は登録順。
#[derive(Default)]
pub struct Mux {
    routes: Vec<Route>,
}

impl Mux {
    pub fn new() -> Self {
        Self::default()
    }

    /// ルートを追加
    pub fn route<H>(mut self, pattern: impl Into<String>, handler: H) -> Result<Self, Error>
    where
        H: Handler + 'static,
    {
        let pattern = ensure_safe_pattern(&pattern.into())?;
        let regex = Regex::new(&pattern)
            .map_err(|e| Error::InvalidRoutePattern(format!("{}: {}", pattern, e)))?;

        debug!("Registering handler with pattern: {}", pattern);
        self.routes.push(Route {
            pattern,
            regex,
            handler: Box::new(handler),
        });
        self.routes.sort_by(|a, b| {
            let count_a = a.pattern.matches('/').count();
            let count_b = b.pattern.matches('/').count();
            count_b.cmp(&count_a)
        });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Handler for Mux {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &mut Request) {
        match self.routes.iter().find(|route| route.regex.is_match(&req.path)) {
            Some(route) => route.handler.serve(w, req),
            None => {
                debug!("Route not found: {} {}", req.method, req.path);
                let headers = w.headers_mut();
                headers.set("Content-Type", "text/plain; charset=utf-8");
                headers.set("X-Content-Type-Options", "nosniff");
                w.write_header(404);
                if let Err(e) = w.write_all(b"404 page not found\n") {
                    warn!("Failed to write not-found body: {}", e);
                }
            }
        }
    }
}
