use colored::Colorize;

use crate::report::ReportRow;
use crate::view::{self, ViewState};

const PAGE_STRIP_WIDTH: usize = 9;
const COLUMN_GAP: &str = "  ";

fn pad(value: &str, width: usize) -> String {
    let len = value.chars().count();
    let mut out = value.to_string();
    out.extend(std::iter::repeat(' ').take(width.saturating_sub(len)));
    out
}

/// Aligned table of display labels. Styling only touches the header line.
pub fn render_table(header: &[String], rows: &[ReportRow], styled: bool) -> String {
    let labels: Vec<String> = header.iter().map(|h| view::header_label(h)).collect();
    let cells: Vec<Vec<String>> = rows.iter().map(view::format_row).collect();

    let mut widths: Vec<usize> = labels.iter().map(|l| l.chars().count()).collect();
    for row in cells.iter() {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(idx) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    let header_line = labels
        .iter()
        .zip(widths.iter())
        .map(|(l, w)| pad(l, *w))
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    let header_line = header_line.trim_end().to_string();
    if styled {
        out.push_str(&header_line.bold().to_string());
    } else {
        out.push_str(&header_line);
    }
    out.push('\n');

    let gaps = COLUMN_GAP.len() * widths.len().saturating_sub(1);
    let rule_len = widths.iter().sum::<usize>() + gaps;
    out.push_str(&"-".repeat(rule_len));

    for row in cells.iter() {
        out.push('\n');
        let line = row
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| pad(c, *w))
            .collect::<Vec<_>>()
            .join(COLUMN_GAP);
        out.push_str(line.trim_end());
    }
    out
}

/// "Showing 51 to 100 of 120 entries"
pub fn entries_line(view: &ViewState) -> String {
    let d = view.page().descriptor;
    format!(
        "Showing {} to {} of {} entries",
        d.first_row_ordinal, d.last_row_ordinal, d.total_rows
    )
}

pub fn page_strip(view: &ViewState) -> String {
    let current = view.current_page();
    let count = view.page_count();
    let window = view::page_window(current, count, PAGE_STRIP_WIDTH);

    let mut parts: Vec<String> = Vec::new();
    parts.push(if view.has_prev() {
        "«".to_string()
    } else {
        "«".dimmed().to_string()
    });
    if window.first().is_some_and(|first| *first > 1) {
        parts.push("…".to_string());
    }
    for page in window.iter() {
        if *page == current {
            parts.push(format!("[{page}]").bold().blue().to_string());
        } else {
            parts.push(page.to_string());
        }
    }
    if window.last().is_some_and(|last| *last < count) {
        parts.push("…".to_string());
    }
    parts.push(if view.has_next() {
        "»".to_string()
    } else {
        "»".dimmed().to_string()
    });
    parts.join(" ")
}

/// The current page of `view`: table, entry range and page strip.
pub fn render_page(view: &ViewState) -> String {
    let page = view.page();
    let mut out = render_table(view.rows().header(), page.rows, true);
    out.push_str("\n\n");
    out.push_str(&entries_line(view));
    out.push('\n');
    out.push_str(&page_strip(view));
    out.push('\n');
    out
}
