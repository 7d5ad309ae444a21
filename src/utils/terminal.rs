//! Terminal output utilities
//!
//! Every status line goes to stderr. Stdout carries command output only, so
//! `gopkgview graph > deps.json` stays valid JSON.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Print an error message to stderr
pub fn print_error(message: &str) {
    eprintln!("{}: {}", style("error").red().bold(), message);
}

/// Print a warning message to stderr
pub fn print_warning(message: &str) {
    eprintln!("{}: {}", style("warning").yellow().bold(), message);
}

/// Print a success message to stderr
pub fn print_success(message: &str) {
    eprintln!("{}: {}", style("success").green().bold(), message);
}

/// Print an info message to stderr
pub fn print_info(message: &str) {
    eprintln!("{}: {}", style("info").blue().bold(), message);
}

/// Create a spinner progress bar
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(spinner);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
