use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::errors::{TruthError, TruthResult};
use crate::exporter::{format_date, Snapshot};
use crate::models::HistoryItem;
use crate::session::{Phase, SessionEvent, Severity};

const METER_WIDTH: usize = 30;

/// Terminal front end for sessions and history listings.
pub struct TerminalUi {
    term: Term,
    spinner: ProgressBar,
    quiet: bool,
}

impl TerminalUi {
    pub fn new(quiet: bool) -> TruthResult<Self> {
        let spinner = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };

        let spinner_style = ProgressStyle::with_template("{prefix} {spinner:.cyan} {msg} [{elapsed}]")
            .map_err(|e| TruthError::external("progress style", e.to_string()))?
            .tick_strings(&["▰▱▱▱▱", "▰▰▱▱▱", "▰▰▰▱▱", "▰▰▰▰▱", "▰▰▰▰▰", "▱▰▰▰▰", "▱▱▰▰▰", "▱▱▱▰▰", "▱▱▱▱▰", "▱▱▱▱▱"]);
        spinner.set_style(spinner_style);
        spinner.set_prefix(style("🔍").to_string());

        Ok(Self {
            term: Term::stdout(),
            spinner,
            quiet,
        })
    }

    /// Render session events until the session goes away.
    pub async fn run(&self, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged(Phase::Analyzing) => {
                    self.spinner.set_message("Analyzing image...");
                    self.spinner.enable_steady_tick(Duration::from_millis(100));
                }
                SessionEvent::StateChanged(phase) => {
                    log::debug!("UI: session {}", phase);
                    self.spinner.finish_and_clear();
                }
                SessionEvent::Notification(notice) => {
                    let title = match notice.severity {
                        Severity::Info => style(format!("✅ {}", notice.title)).green().bold(),
                        Severity::Error => style(format!("❌ {}", notice.title)).red().bold(),
                    };
                    self.println(&format!("{}\n   {}", title, notice.description));
                }
            }
        }
        self.spinner.finish_and_clear();
    }

    /// Full result view
    pub fn print_item<R: Snapshot>(&self, item: &HistoryItem<R>) {
        let result = &item.result;

        self.println("");
        self.println(&style(result.heading()).cyan().bold().to_string());
        self.println(&format!(
            "   {} {}  {}",
            style(&item.filename).white().bold(),
            style(format!("({})", format_date(&item.date))).dim(),
            verdict_badge(result)
        ));
        self.println(&format!("   {} {}", style("id").dim(), item.id));
        self.println("");

        for (label, percent) in result.bars() {
            self.println(&format!("   {:<20} {} {:>3.0}%", label, meter(percent, METER_WIDTH), percent));
        }

        self.println("");
        self.println(&format!("   {}", result.explanation()));
        for (title, text) in result.details() {
            self.println("");
            self.println(&format!("   {}", style(title).bold()));
            self.println(&format!("   {}", text));
        }
        self.println("");
    }

    /// One line per stored item, most recent first
    pub fn print_history<R: Snapshot>(&self, items: &[HistoryItem<R>], capacity: usize) {
        if items.is_empty() {
            self.println(&style("No analyses in history yet.").dim().to_string());
            return;
        }

        self.println(&format!(
            "{} {}",
            style(format!("{} of {} stored", items.len(), capacity)).dim(),
            style("(most recent first)").dim()
        ));
        for item in items {
            let score = item
                .result
                .bars()
                .first()
                .map(|(_, percent)| format!("{:>3.0}%", percent))
                .unwrap_or_default();
            self.println(&format!(
                "  {}  {:<24}  {:<32}  {}  {}",
                style(&item.id).dim(),
                format_date(&item.date),
                truncate(&item.filename, 32),
                score,
                verdict_badge(&item.result)
            ));
        }
    }

    pub fn print_notice(&self, message: &str) {
        self.println(&format!("📄 {}", message));
    }

    fn println(&self, line: &str) {
        if self.quiet {
            println!("{}", console::strip_ansi_codes(line));
        } else {
            self.spinner.suspend(|| {
                let _ = self.term.write_line(line);
            });
        }
    }
}

fn verdict_badge<R: Snapshot>(result: &R) -> String {
    let (badge, class) = result.badge();
    if class == "badge-alert" {
        style(format!("[{}]", badge)).red().bold().to_string()
    } else {
        style(format!("[{}]", badge)).green().bold().to_string()
    }
}

/// Text bar for a 0-100 percentage
fn meter(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
    format!("{}…", kept)
}

/// Human readable byte count
pub fn format_file_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
