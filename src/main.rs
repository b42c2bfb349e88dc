use log::{error, info};
use serde::{Deserialize, Serialize};

use wrapkit::{access_log, gzip, reply, Config, Extender, Mux, Reply, Request};

#[derive(Serialize, Deserialize)]
struct Item {
    id: String,
    name: String,
    description: Option<String>,
}

// ヘルスチェック
fn health_handler(_req: &mut Request) -> Reply {
    reply::ok(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// アイテム一覧
fn get_items(_req: &mut Request) -> Reply {
    let items = vec![
        Item {
            id: "1".to_string(),
            name: "Item 1".to_string(),
            description: Some("Description for item 1".to_string()),
        },
        Item {
            id: "2".to_string(),
            name: "Item 2".to_string(),
            description: None,
        },
    ];
    reply::ok(items)
}

// 受け取ったアイテムをそのまま返す
fn echo_item(req: &mut Request) -> Reply {
    match req.parse_body_param::<Item>() {
        Ok(item) => {
            info!("Echoing item: {}", item.name);
            reply::ok(item)
        }
        Err(e) => {
            let status = e.status_code();
            reply::fail(status, e)
        }
    }
}

fn build_app(config: &Config) -> Result<Mux, wrapkit::Error> {
    let extender = Extender::builder()
        .config(config)
        .end_hook(access_log())
        .build();

    Mux::new()
        .route("^/$", extender.extend(health_handler))?
        .route("^/items$", extender.extend(get_items))?
        .route("^/echo$", extender.extend(echo_item))
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let app = match build_app(&config) {
        Ok(app) => gzip(app),
        Err(e) => {
            error!("Failed to build routes: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting wrapkit demo application");

    #[cfg(feature = "server")]
    {
        let port = match std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
        {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Error parsing port: {}", e);
                std::process::exit(1);
            }
        };
        if let Err(e) = wrapkit::server::run_server(app, "0.0.0.0", port).await {
            eprintln!("Server error: {}", e);
            std::process::exit(1);
        }
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = app;
        println!("Please enable the 'server' feature to run the application.");
        println!("Example: cargo run --features server");
        std::process::exit(1);
    }
}
