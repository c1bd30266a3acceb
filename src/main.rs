use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod chart;
mod client;
mod config;
mod error;
mod models;
mod page;
mod stats;
mod store;
mod terminal;


use api::AppState;
use chart::TextChartSurface;
use client::HttpDelayApi;
use config::{Cli, Cmd, PageArgs, ServeArgs};
use page::PageController;
use store::DelayStore;
use terminal::TerminalView;

/// Delay tracker
/// `serve` owns the delay records, `page` is the tracking page that talks to it
fn main() -> Result<()> {
    // stderr keeps the page's dialogs on stdout readable
    fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Serve(args) => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("build runtime")?
            .block_on(serve(args)),
        Cmd::Page(args) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("build runtime")?
            .block_on(open_page(args)),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let addr = args.listen_addr()?;
    let store = DelayStore::open(&args.db)
        .with_context(|| format!("open database {}", args.db.display()))?;

    let app = api::router(AppState::new(store, &args.reset_password));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("delay tracker listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn open_page(args: PageArgs) -> Result<()> {
    args.validate()?;
    let refresh_every = args.refresh_interval()?;
    info!(server = %args.server, "opening delay tracking page");

    let view = TerminalView::new(terminal::spawn_stdin_reader(), args.download_dir.clone());
    let mut page = PageController::new(HttpDelayApi::new(&args.server), view, TextChartSurface);

    terminal::run(&mut page, refresh_every).await;
    Ok(())
}
