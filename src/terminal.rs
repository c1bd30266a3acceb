use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::chart::ChartSurface;
use crate::client::{DelayApi, Download};
use crate::models::Reason;
use crate::page::{PageController, PageView};

const HELP: &str = "\
commands:
  start            start a delay with the selected reason
  end              end the running delay
  download         save the CSV report
  reset            delete all data (asks for the password)
  refresh          redraw the chart now
  reason <name|n>  select the delay reason
  reasons          list the reasons
  help             show this text
  quit             leave";

/// One line typed at the page
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    End,
    Download,
    Reset,
    Refresh,
    Select(String),
    Reasons,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "" => Command::Empty,
            "start" => Command::Start,
            "end" | "stop" => Command::End,
            "download" => Command::Download,
            "reset" => Command::Reset,
            "refresh" => Command::Refresh,
            "reason" | "select" => Command::Select(rest.to_string()),
            "reasons" => Command::Reasons,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

/// Picks a reason by its 1-based position or by (approximate) name
pub fn resolve_reason(input: &str) -> Option<Reason> {
    if let Ok(n) = input.trim().parse::<usize>() {
        return n.checked_sub(1).and_then(|i| Reason::ALL.get(i).copied());
    }
    Reason::closest(input)
}

/// The page rendered on a terminal: dialogs go to stdout, input arrives
/// line by line from a stdin reader thread.
pub struct TerminalView {
    reason: Reason,
    input: mpsc::UnboundedReceiver<String>,
    download_dir: PathBuf,
    total_minutes: String,
}

impl TerminalView {
    pub fn new(input: mpsc::UnboundedReceiver<String>, download_dir: PathBuf) -> Self {
        Self {
            reason: Reason::ALL[0],
            input,
            download_dir,
            total_minutes: "0.00".to_string(),
        }
    }

    pub async fn next_line(&mut self) -> Option<String> {
        self.input.recv().await
    }

    pub fn select_reason(&mut self, reason: Reason) {
        self.reason = reason;
    }

    fn say(&self, text: &str) {
        if let Err(e) = write_line(&mut std::io::stdout().lock(), text) {
            warn!("failed to write to terminal: {}", e);
        }
    }
}

fn write_line<W: Write>(out: &mut W, text: &str) -> std::io::Result<()> {
    writeln!(out, "{text}")?;
    out.flush()
}

impl PageView for TerminalView {
    fn selected_reason(&self) -> Reason {
        self.reason
    }

    fn alert(&mut self, message: &str) {
        self.say(&format!("[!] {message}"));
    }

    async fn prompt(&mut self, message: &str) -> Option<String> {
        self.say(&format!("[?] {message}"));
        self.next_line().await.map(|line| line.trim().to_string())
    }

    fn set_total_minutes(&mut self, text: &str) {
        if self.total_minutes != text {
            self.say(&format!("Total delay: {text} minutes"));
        }
        self.total_minutes = text.to_string();
    }

    fn save_download(&mut self, download: Download) {
        let path = self.download_dir.join(&download.filename);
        match std::fs::write(&path, &download.bytes) {
            Ok(()) => {
                info!(path = %path.display(), bytes = download.bytes.len(), "report saved");
                self.say(&format!("Report saved to {}", path.display()));
            }
            Err(e) => {
                warn!("failed to save report to {}: {}", path.display(), e);
                self.alert(&format!("Could not save {}: {e}", path.display()));
            }
        }
    }
}

/// Forwards stdin lines into a channel; the channel closes on EOF.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Drives the page until `quit` or end of input. Stats refresh on load and
/// then every `refresh_every`; commands and ticks are handled one at a time.
pub async fn run<A, S>(
    page: &mut PageController<A, TerminalView, S>,
    refresh_every: Duration,
) where
    A: DelayApi,
    S: ChartSurface,
{
    let mut ticker = tokio::time::interval(refresh_every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    page.view().say(HELP);
    page.view()
        .say(&format!("Selected reason: {}", page.view().selected_reason()));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                debug!("periodic stats refresh");
                page.refresh_stats().await;
            }
            line = page.view_mut().next_line() => {
                let Some(line) = line else {
                    debug!("input closed");
                    break;
                };
                match Command::parse(&line) {
                    Command::Start => page.start_delay().await,
                    Command::End => page.end_delay().await,
                    Command::Download => page.download_report().await,
                    Command::Reset => page.reset_data().await,
                    Command::Refresh => page.refresh_stats().await,
                    Command::Select(name) => match resolve_reason(&name) {
                        Some(reason) => {
                            page.view_mut().select_reason(reason);
                            page.view().say(&format!("Selected reason: {reason}"));
                        }
                        None => page.view().say(&format!("Unknown reason: {name:?} (try `reasons`)")),
                    },
                    Command::Reasons => {
                        for (i, reason) in Reason::ALL.iter().enumerate() {
                            page.view().say(&format!("  {}. {}", i + 1, reason));
                        }
                    }
                    Command::Help => page.view().say(HELP),
                    Command::Quit => break,
                    Command::Empty => {}
                    Command::Unknown(text) => {
                        page.view().say(&format!("Unknown command: {text} (try `help`)"));
                    }
                }
            }
        }
    }
}
