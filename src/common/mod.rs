//! 共通の抽象化レイヤー（HTTP基本型、Content-Type推定、ユーティリティ）

pub mod http;
pub mod sniff;
pub mod utils;

pub use self::http::{status_text, Body, Headers, Method, Request, Response, ResponseWriter};
pub use self::sniff::detect_content_type;
pub use self::utils::{env_flag, get_max_body_size, is_header_value_valid};
