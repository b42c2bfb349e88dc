//! リクエストボディのJSON解析

use serde::de::DeserializeOwned;

use crate::common::Request;
use crate::error::Error;

/// ボディ全体を読み込んでJSONとしてデコードする
///
/// 読み込んだボディは同じ内容の新しいストリームに差し替えるため、後続の処理
/// （ログ出力用のフック等）からも再度読み出せる。
pub fn parse_body_param<T: DeserializeOwned>(req: &mut Request) -> Result<T, Error> {
    let body = req.read_body()?;
    req.set_body(body.clone());

    serde_json::from_slice(&body).map_err(|e| Error::InvalidRequestBody(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Method;
    use serde::Deserialize;
    use std::io::{self, Read};

    #[derive(Deserialize, Debug, PartialEq)]
    struct Param {
        name: String,
        value: i32,
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"))
        }
    }

    #[test]
    fn test_parse_and_reread() {
        let raw = br#"{"name":"alice","value":3}"#;
        let mut req = Request::new(Method::POST, "/").with_body(raw.to_vec());

        let param: Param = parse_body_param(&mut req).unwrap();
        assert_eq!(param, Param { name: "alice".to_string(), value: 3 });

        // 2回目の読み出しでも同じ内容が得られる
        assert_eq!(req.read_body().unwrap().as_ref(), raw);
    }

    #[test]
    fn test_decode_error_keeps_body() {
        let mut req = Request::new(Method::POST, "/").with_body("not json");
        let result: Result<Param, Error> = parse_body_param(&mut req);
        assert!(matches!(result, Err(Error::InvalidRequestBody(_))));
        assert_eq!(req.read_body().unwrap().as_ref(), b"not json");
    }

    #[test]
    fn test_wrong_shape_is_decode_error() {
        let mut req = Request::new(Method::POST, "/").with_body(r#"{"name":1}"#);
        let result: Result<Param, Error> = req.parse_body_param();
        assert!(matches!(result, Err(Error::InvalidRequestBody(_))));
    }

    #[test]
    fn test_read_error() {
        let mut req = Request::new(Method::POST, "/").with_body_reader(FailingReader);
        let result: Result<Param, Error> = parse_body_param(&mut req);
        match result {
            Err(Error::BodyRead(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("Expected BodyRead error, got {:?}", other),
        }
    }
}
