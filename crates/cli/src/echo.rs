use gleaner_core::{ArticleView, GleanerError, LoadState, ViewSink};
use owo_colors::OwoColorize;

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "Gleaner".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Readable articles from feed item pages\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

/// Print timing information with color coding
pub fn print_timing(label: &str, duration: std::time::Duration) {
    let ms = duration.as_secs_f64() * 1000.0;
    let label = format!("{}:", label);
    if ms < 50.0 {
        eprintln!("  {} {:>8.2}ms ({})", label.dimmed(), ms, "fast".dimmed());
    } else if ms < 100.0 {
        eprintln!("  {} {:>8.2}ms ({})", label.dimmed(), ms, "moderate".bright_yellow());
    } else {
        eprintln!("  {} {:>8.2}ms ({})", label.dimmed(), ms, "slow".bright_red());
    }
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Terminal view of a load: states as steps in verbose mode, problems always.
pub struct ConsoleSink {
    pub verbose: bool,
}

impl ViewSink for ConsoleSink {
    fn on_state(&self, state: LoadState) {
        if self.verbose && !matches!(state, LoadState::Done) {
            eprintln!("{} {}", "→".dimmed(), state.to_string().bright_cyan());
        }
    }

    fn show_content(&self, view: &ArticleView) {
        if self.verbose {
            if let Some(title) = &view.title {
                eprintln!("  {} {}", "Title:".dimmed(), title.bright_white());
            }
            eprintln!("  {} {}", "Length:".dimmed(), view.length.to_string().bright_white());
        }
    }

    fn show_error(&self, error: &GleanerError) {
        print_error(&error.to_string());
    }

    fn request_credentials(&self, domain: &str) {
        print_warning(&format!("{} asks for a username and password", domain.bright_white()));
    }
}
