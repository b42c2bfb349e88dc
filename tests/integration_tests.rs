//! インテグレーションテスト

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use wrapkit::{
    reply, Extender, FieldNames, HandleResult, Handler, Method, Mux, Request, Response,
    ResponseWriter,
};

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
struct ItemRequest {
    name: String,
    description: Option<String>,
}

fn serve(handler: &dyn Handler, mut req: Request) -> Response {
    let mut res = Response::new();
    handler.serve(&mut res, &mut req);
    res
}

#[test]
fn test_success_envelope() {
    let extender = Extender::new();
    let handler = extender.extend(|_req: &mut Request| reply::ok(json!({"x": 1})));

    let res = serve(&handler, Request::new(Method::GET, "/"));
    assert_eq!(res.status, 200);
    assert_eq!(res.body_text(), r#"{"data":{"x":1},"errno":0}"#);
    assert_eq!(res.headers.get("content-type"), Some("application/json"));
    assert_eq!(
        res.headers.get("content-length"),
        Some(res.body.len().to_string().as_str())
    );
}

#[test]
fn test_error_envelope_with_ok_status() {
    let extender = Extender::new();
    let handler = extender.extend(|_req: &mut Request| reply::fail(200, "bad"));

    let res = serve(&handler, Request::new(Method::GET, "/"));
    assert_eq!(res.status, 400);
    let body: Value = res.json().unwrap();
    assert_eq!(body, json!({"errno": 400, "errmsg": "bad"}));
}

#[test]
fn test_status_only_envelope() {
    let extender = Extender::new();
    let handler = extender.extend(|_req: &mut Request| reply::status(404));

    let res = serve(&handler, Request::new(Method::GET, "/"));
    assert_eq!(res.status, 404);
    let body: Value = res.json().unwrap();
    assert_eq!(body, json!({"errno": 404, "errmsg": "Not Found"}));
}

#[test]
fn test_raw_payload_written_as_is() {
    let extender = Extender::new();
    let handler = extender.extend(|_req: &mut Request| reply::raw(202, "accepted"));

    let res = serve(&handler, Request::new(Method::GET, "/"));
    assert_eq!(res.status, 202);
    assert_eq!(res.body_text(), "accepted");
}

#[test]
fn test_rejected_field_name_keeps_previous_names() {
    let extender = Extender::new();
    assert!(extender.set_data_field_name("errno").is_err());
    assert!(extender.set_message_field_name("").is_err());
    assert_eq!(extender.field_names(), FieldNames::default());

    let handler = extender.extend(|_req: &mut Request| reply::ok("still default"));
    let res = serve(&handler, Request::new(Method::GET, "/"));
    let body: Value = res.json().unwrap();
    assert_eq!(body, json!({"data": "still default", "errno": 0}));
}

#[test]
fn test_hooks_fire_once_in_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let costs = Arc::new(Mutex::new(Vec::new()));
    let extender = Extender::new();

    for name in ["begin-1", "begin-2"] {
        let calls = calls.clone();
        extender.add_begin_hook(move |_w: &mut dyn ResponseWriter, _req: &mut Request| {
            calls.lock().unwrap().push(name);
        });
    }
    for name in ["end-1", "end-2"] {
        let calls = calls.clone();
        let costs = costs.clone();
        extender.add_end_hook(
            move |_w: &mut dyn ResponseWriter, _req: &mut Request, result: &HandleResult| {
                calls.lock().unwrap().push(name);
                costs.lock().unwrap().push(result.cost);
            },
        );
    }

    let handler = {
        let calls = calls.clone();
        extender.extend(move |_req: &mut Request| {
            calls.lock().unwrap().push("handler");
            thread::sleep(Duration::from_millis(20));
            reply::ok(1)
        })
    };

    serve(&handler, Request::new(Method::GET, "/"));

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["begin-1", "begin-2", "handler", "end-1", "end-2"]
    );
    let costs = costs.lock().unwrap();
    assert_eq!(costs.len(), 2);
    assert!(costs.iter().all(|cost| *cost >= Duration::from_millis(20)));
}

#[test]
fn test_body_readable_after_parse() {
    let logged = Arc::new(Mutex::new(Vec::new()));
    let extender = Extender::new();
    {
        let logged = logged.clone();
        extender.add_end_hook(
            move |_w: &mut dyn ResponseWriter, req: &mut Request, _result: &HandleResult| {
                logged.lock().unwrap().push(req.read_body().unwrap());
            },
        );
    }

    let handler = extender.extend(|req: &mut Request| {
        match req.parse_body_param::<ItemRequest>() {
            Ok(item) => reply::ok(item),
            Err(e) => reply::fail(e.status_code(), e),
        }
    });

    let raw = r#"{"name":"widget","description":null}"#;
    let res = serve(&handler, Request::new(Method::POST, "/items").with_body(raw));

    assert_eq!(res.status, 200);
    let body: Value = res.json().unwrap();
    assert_eq!(body["data"]["name"], "widget");
    assert_eq!(logged.lock().unwrap()[0].as_ref(), raw.as_bytes());
}

#[test]
fn test_invalid_json_body_reported() {
    let extender = Extender::new();
    let handler = extender.extend(|req: &mut Request| {
        match req.parse_body_param::<ItemRequest>() {
            Ok(item) => reply::ok(item),
            Err(e) => reply::fail(e.status_code(), e),
        }
    });

    let res = serve(&handler, Request::new(Method::POST, "/items").with_body("{broken"));
    assert_eq!(res.status, 400);
    let body: Value = res.json().unwrap();
    assert_eq!(body["errno"], 400);
    assert!(body["errmsg"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));
}

#[test]
fn test_router_with_extended_handlers() {
    let extender = Extender::builder().cors(true).build();
    let mux = Mux::new()
        .route(r"^/items/[^/]+$", extender.extend(|req: &mut Request| {
            let id = req.path.rsplit('/').next().unwrap_or_default().to_string();
            reply::ok(json!({ "id": id }))
        }))
        .unwrap()
        .route("^/items$", extender.extend(|_req: &mut Request| reply::ok(Vec::<u32>::new())))
        .unwrap();

    let res = serve(&mux, Request::new(Method::GET, "/items/123"));
    let body: Value = res.json().unwrap();
    assert_eq!(body, json!({"data": {"id": "123"}, "errno": 0}));
    assert_eq!(res.headers.get("access-control-allow-origin"), Some("*"));

    let res = serve(&mux, Request::new(Method::GET, "/items"));
    let body: Value = res.json().unwrap();
    assert_eq!(body, json!({"data": [], "errno": 0}));

    let res = serve(&mux, Request::new(Method::GET, "/unknown"));
    assert_eq!(res.status, 404);
}

#[test]
fn test_hook_registration_across_threads() {
    let extender = Extender::new();
    let count = Arc::new(Mutex::new(0usize));
    let handler = Arc::new(extender.extend(|_req: &mut Request| reply::ok("ok")));

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let extender = extender.clone();
            let handler = handler.clone();
            let count = count.clone();
            thread::spawn(move || {
                if i % 2 == 0 {
                    extender.add_end_hook(
                        move |_w: &mut dyn ResponseWriter, _r: &mut Request, _res: &HandleResult| {
                            *count.lock().unwrap() += 1;
                        },
                    );
                }
                serve(handler.as_ref(), Request::new(Method::GET, "/")).status
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap(), 200);
    }

    *count.lock().unwrap() = 0;
    serve(handler.as_ref(), Request::new(Method::GET, "/"));
    assert_eq!(*count.lock().unwrap(), 2);
}
