pub mod image_fix;
pub mod image_gen;
mod import;
pub mod listing_import;
pub mod pdf_diagnose;
pub mod pdf_import;
pub mod pdp_audit;
pub mod store_cleanup;
pub mod variant_detect;
pub mod yhs_import;

use std::ops::Range;
use std::time::Duration;

const RULE_WIDTH: usize = 60;

pub(crate) fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Section header used by every tool's console report.
pub(crate) fn banner(title: &str) {
    println!("\n{}\n{}\n{}", rule(), title, rule());
}

/// `start..start+count`, clamped to `len`.
pub(crate) fn select_range(len: usize, start: usize, count: Option<usize>) -> Range<usize> {
    let start = start.min(len);
    let end = match count {
        Some(c) => start.saturating_add(c).min(len),
        None => len,
    };
    start..end
}

pub(crate) async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// First `max` characters, for fixed-width console columns.
pub(crate) fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
