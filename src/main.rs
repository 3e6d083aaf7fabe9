use std::sync::Arc;

use anyhow::Context;
use strand::config::Config;
use strand::http::content_type::ContentType;
use strand::http::handler::ConnectionInfo;
use strand::http::request::Request;
use strand::http::response::Response;
use strand::router::{Router, StaticFiles};
use strand::server::Server;
use tracing::Level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    let level: Level = cfg
        .log_level
        .parse()
        .with_context(|| format!("invalid log level {:?}", cfg.log_level))?;
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .init();

    let mut router = Router::new().with_not_found_page(cfg.static_files.not_found_page.clone());
    router.route("test", test_page);
    router.route_prefix(&cfg.static_files.mount, StaticFiles::new(&cfg.static_files.root));

    let server = Arc::new(Server::bind(&cfg, Arc::new(router))?);
    server.start()?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("Shutdown signal received");

    let server_ref = Arc::clone(&server);
    tokio::task::spawn_blocking(move || server_ref.shutdown()).await?;

    Ok(())
}

fn test_page(
    _conn: &ConnectionInfo,
    _req: &Request,
    resp: &mut Response,
    _rest: Option<&str>,
) -> anyhow::Result<()> {
    resp.write_text(ContentType::TextPlain, "test!");
    Ok(())
}
