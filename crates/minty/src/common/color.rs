//! Terminal color helpers for client output.

use std::io::IsTerminal;
use std::sync::OnceLock;

static NO_COLOR: OnceLock<bool> = OnceLock::new();

pub fn init(no_color_flag: bool) {
    let _ = NO_COLOR.set(
        no_color_flag || std::env::var("NO_COLOR").is_ok() || !std::io::stdout().is_terminal(),
    );
}

pub fn is_disabled() -> bool {
    *NO_COLOR.get().unwrap_or(&false)
}

const RESET: &str = "\x1b[0m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[90m";
const BOLD: &str = "\x1b[1m";

fn paint(text: &str, styles: &[&str]) -> String {
    if is_disabled() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 16);
    styles.iter().for_each(|style| out.push_str(style));
    out.push_str(text);
    out.push_str(RESET);
    out
}

pub struct Colors;

impl Colors {
    pub fn success(text: &str) -> String {
        paint(text, &[GREEN])
    }

    pub fn error(text: &str) -> String {
        paint(text, &[RED])
    }

    pub fn info(text: &str) -> String {
        paint(text, &[CYAN])
    }

    pub fn warning(text: &str) -> String {
        paint(text, &[YELLOW])
    }

    pub fn dim(text: &str) -> String {
        paint(text, &[DIM])
    }

    pub fn bold(text: &str) -> String {
        paint(text, &[BOLD])
    }

    /// Session and window ids are shown bold cyan so they stand out in listings.
    pub fn id(text: &str) -> String {
        paint(text, &[BOLD, CYAN])
    }
}
