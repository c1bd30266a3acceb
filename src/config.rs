use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "delay-tracker", version, about = "Track delays and chart them per day")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Run the HTTP backend
    Serve(ServeArgs),
    /// Open the tracking page in this terminal
    Page(PageArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Where the HTTP API will listen, e.g. 127.0.0.1:5000
    #[arg(long, env = "DELAY_LISTEN", default_value = "127.0.0.1:5000")]
    pub listen: String,

    /// SQLite database file
    #[arg(long, env = "DELAY_DB", default_value = "delay.db")]
    pub db: PathBuf,

    /// Password required by POST /reset
    #[arg(long, env = "DELAY_RESET_PASSWORD", default_value = "your_password_here", hide_env_values = true)]
    pub reset_password: String,
}

impl ServeArgs {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .with_context(|| format!("invalid listen address {:?}", self.listen))
    }
}

#[derive(Debug, Clone, Args)]
pub struct PageArgs {
    /// Base URL of the backend
    #[arg(long, env = "DELAY_SERVER", default_value = "http://127.0.0.1:5000")]
    pub server: String,

    /// Seconds between automatic stats refreshes
    #[arg(long, default_value_t = 10)]
    pub refresh_seconds: u64,

    /// Directory downloaded reports are written to
    #[arg(long, default_value = ".")]
    pub download_dir: PathBuf,
}

impl PageArgs {
    pub fn refresh_interval(&self) -> Result<Duration> {
        if self.refresh_seconds == 0 {
            bail!("--refresh-seconds must be at least 1");
        }
        Ok(Duration::from_secs(self.refresh_seconds))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.server.starts_with("http://") || self.server.starts_with("https://")) {
            bail!("--server must be an http(s) URL, got {:?}", self.server);
        }
        if !self.download_dir.is_dir() {
            bail!("download directory {} does not exist", self.download_dir.display());
        }
        Ok(())
    }
}
