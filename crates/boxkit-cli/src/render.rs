use std::time::Duration;

use anstyle::{AnsiColor, Style};
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) const SUCCESS: Style = AnsiColor::Green.on_default();
pub(crate) const ERROR: Style = AnsiColor::Red.on_default();
pub(crate) const WARN: Style = AnsiColor::Yellow.on_default();
pub(crate) const DIM: Style = AnsiColor::BrightBlack.on_default();
pub(crate) const TITLE: Style = Style::new().bold();

pub(crate) fn paint(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) fn check_mark() -> String {
    paint(SUCCESS, "✓")
}

pub(crate) fn cross_mark() -> String {
    paint(ERROR, "✗")
}

pub(crate) fn warn_mark() -> String {
    paint(WARN, "!")
}

pub(crate) fn title(text: &str) -> String {
    paint(TITLE, text)
}

pub(crate) fn dim(text: &str) -> String {
    paint(DIM, text)
}

/// Spinner shown while one tool installs; the message slot carries the most
/// recent line of installer output.
pub(crate) fn tool_spinner(name: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan.bold} {prefix} {wide_msg:.8}")
    {
        spinner.set_style(style);
    }
    spinner.set_prefix(name.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
