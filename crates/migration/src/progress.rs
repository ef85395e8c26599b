//! Per-table progress bar.
//!
//! Ticks once per station. Log output goes to the per-table log file while a
//! bar is visible, so the two never interleave on the terminal.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

const TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";

/// Bar over `stations` steps, or a hidden one when `visible` is false.
pub fn station_bar(stations: usize, message: &str, visible: bool) -> ProgressBar {
    let bar = if visible {
        ProgressBar::new(stations as u64)
    } else {
        ProgressBar::hidden()
    };

    match ProgressStyle::default_bar().template(TEMPLATE) {
        Ok(style) => bar.set_style(style.progress_chars("##-")),
        Err(e) => debug!(error = %e, "Falling back to the default progress style"),
    }
    bar.set_message(message.to_string());
    bar
}
