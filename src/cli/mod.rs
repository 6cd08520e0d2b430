//! Command-line front end: argument parsing, command dispatch and ASCII table output.

pub mod args;
pub mod commands;

pub use args::CliArgs;
pub use commands::run;

use std::sync::atomic::{AtomicBool, Ordering};

static JSON_SWITCH: AtomicBool = AtomicBool::new(false);

// Render rows as an ASCII table. `--json` or UPLINK_OUTPUT=json skips tables.
pub fn print_table(cols: &[&str], rows: &[Vec<String>]) {
    if json_output() { return; }
    print!("{}", render_table(cols, rows));
}

/// Set from the `--json` switch; the environment can still turn JSON on when this is false.
pub fn force_json_output(on: bool) {
    JSON_SWITCH.store(on, Ordering::Relaxed);
}

pub fn json_output() -> bool {
    JSON_SWITCH.load(Ordering::Relaxed)
        || std::env::var("UPLINK_OUTPUT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false)
}

pub fn render_table(cols: &[&str], rows: &[Vec<String>]) -> String {
    let max_col_width: usize = 64; // cap to keep output readable
    let mut widths: Vec<usize> = cols.iter().map(|s| display_len(s).min(max_col_width)).collect();
    for r in rows {
        for (i, cell) in r.iter().enumerate().take(cols.len()) {
            let w = display_len(cell);
            if w > widths[i] { widths[i] = w.min(max_col_width); }
        }
    }
    let header: Vec<String> = cols.iter().map(|c| c.to_string()).collect();
    let sep = build_separator(&widths);
    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&build_row(&header, &widths));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for r in rows {
        out.push_str(&build_row(r, &widths));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&format!("rows: {}\n", rows.len()));
    out
}

fn display_len(s: &str) -> usize { s.chars().count() }

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let (text, align_right) = (truncate(&cell, *w), is_numeric_like(&cell));
        let pad = w.saturating_sub(display_len(&text));
        s.push(' ');
        if align_right {
            s.push_str(&" ".repeat(pad));
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&" ".repeat(pad));
        }
        s.push(' ');
        s.push('|');
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    // crude detection for aligning numbers to right; hex ids stay left
    let st = s.trim();
    if st.is_empty() { return false; }
    let mut has_digit = false;
    for ch in st.chars() {
        if ch.is_ascii_digit() { has_digit = true; continue; }
        if ".-+,_".contains(ch) { continue; }
        return false;
    }
    has_digit
}
