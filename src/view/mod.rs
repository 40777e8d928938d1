use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::report::{ReportRow, ResultSet};

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Derived pagination facts for one requested page.
///
/// Ordinals are 1-based and inclusive; a page with no rows reports `0..0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageDescriptor {
    pub page_index: i64,
    pub page_count: usize,
    pub rows_on_page: usize,
    pub first_row_ordinal: usize,
    pub last_row_ordinal: usize,
    pub total_rows: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page<'a> {
    pub rows: &'a [ReportRow],
    pub descriptor: PageDescriptor,
}

/// Never zero: an empty result set still has one (empty) page.
pub fn page_count(total_rows: usize, page_size: NonZeroUsize) -> usize {
    total_rows.div_ceil(page_size.get()).max(1)
}

/// Projects `rows` onto page `page_index` (1-based).
///
/// Any integer is accepted. Indexes outside `1..=page_count` give an empty
/// slice instead of panicking; callers are expected to clamp.
pub fn compute_page(rows: &ResultSet, page_size: NonZeroUsize, page_index: i64) -> Page<'_> {
    let total_rows = rows.len();
    let size = page_size.get();
    let count = page_count(total_rows, page_size);

    let in_range = page_index >= 1 && (page_index as u64) <= count as u64;
    if !in_range {
        return Page {
            rows: &[],
            descriptor: PageDescriptor {
                page_index,
                page_count: count,
                rows_on_page: 0,
                first_row_ordinal: 0,
                last_row_ordinal: 0,
                total_rows,
            },
        };
    }

    let start = (page_index as usize - 1).saturating_mul(size).min(total_rows);
    let end = start.saturating_add(size).min(total_rows);
    let visible = &rows.rows()[start..end];
    let first_row_ordinal = if visible.is_empty() { 0 } else { start + 1 };

    Page {
        rows: visible,
        descriptor: PageDescriptor {
            page_index,
            page_count: count,
            rows_on_page: visible.len(),
            first_row_ordinal,
            last_row_ordinal: end,
            total_rows,
        },
    }
}

// Math.round semantics: halves go towards positive infinity.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Display text for one cell, keyed off the column name.
///
/// `*last_hour*` columns hold minutes; `*last_day*` and `*last_week*`
/// columns hold fractional hours. Anything else, and any value that is not a
/// finite number, is returned unchanged.
pub fn label_for(column: &str, raw: &str) -> String {
    let minutes_column = column.contains("last_hour");
    let hours_column = column.contains("last_day") || column.contains("last_week");
    if !minutes_column && !hours_column {
        return raw.to_string();
    }

    let value = match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => return raw.to_string(),
    };

    if minutes_column {
        return format!("{} min", round_half_up(value) as i64);
    }

    let hours = value.floor();
    let minutes = round_half_up((value - hours) * 60.0) as i64;
    if hours > 0.0 {
        let hours = hours as i64;
        if minutes > 0 {
            format!("{hours}h {minutes}m")
        } else {
            format!("{hours}h ")
        }
    } else {
        format!("{minutes} min")
    }
}

/// Formats every cell of `row`; the first column is an identifying key and
/// is never reformatted.
pub fn format_row(row: &ReportRow) -> Vec<String> {
    row.iter()
        .enumerate()
        .map(|(idx, (column, value))| {
            if idx == 0 {
                value.to_string()
            } else {
                label_for(column, value)
            }
        })
        .collect()
}

pub fn header_label(column: &str) -> String {
    column.replace('_', " ")
}

/// At most `width` page numbers centred on `current`.
pub fn page_window(current: usize, page_count: usize, width: usize) -> Vec<usize> {
    let width = width.max(1).min(page_count);
    let current = current.clamp(1, page_count.max(1));
    let half = width / 2;
    let mut start = current.saturating_sub(half).max(1);
    if start + width > page_count + 1 {
        start = page_count + 1 - width;
    }
    (start..start + width).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Navigation {
    First,
    Prev,
    Next,
    Last,
    Goto(i64),
}

/// What the user is looking at. Transitions return a new value; nothing is
/// mutated in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewState {
    rows: Arc<ResultSet>,
    page_size: NonZeroUsize,
    current_page: usize,
}

impl ViewState {
    pub fn new(rows: Arc<ResultSet>, page_size: NonZeroUsize) -> Self {
        Self {
            rows,
            page_size,
            current_page: 1,
        }
    }

    pub fn rows(&self) -> &Arc<ResultSet> {
        &self.rows
    }

    pub fn page_size(&self) -> NonZeroUsize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        page_count(self.rows.len(), self.page_size)
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.page_count()
    }

    /// Moves to `page`, clamped to `1..=page_count`.
    pub fn goto(&self, page: i64) -> Self {
        let last = self.page_count() as i64;
        Self {
            rows: self.rows.clone(),
            page_size: self.page_size,
            current_page: page.clamp(1, last) as usize,
        }
    }

    pub fn apply(&self, nav: Navigation) -> Self {
        match nav {
            Navigation::First => self.goto(1),
            Navigation::Prev => self.goto(self.current_page as i64 - 1),
            Navigation::Next => self.goto(self.current_page as i64 + 1),
            Navigation::Last => self.goto(self.page_count() as i64),
            Navigation::Goto(page) => self.goto(page),
        }
    }

    pub fn page(&self) -> Page<'_> {
        compute_page(&self.rows, self.page_size, self.current_page as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RowPolicy;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn numbered(total: usize) -> ResultSet {
        ResultSet::from_records(
            vec!["id".to_string()],
            (1..=total).map(|i| vec![i.to_string()]),
            RowPolicy::Strict,
        )
        .unwrap()
    }

    #[test]
    fn page_count_is_never_zero() {
        for (total, page, expected) in [(0, 50, 1), (1, 50, 1), (50, 50, 1), (51, 50, 2), (7, 3, 3)] {
            assert_eq!(page_count(total, size(page)), expected, "total={total} page={page}");
        }
    }

    #[test]
    fn pages_concatenate_to_the_full_set() {
        for total in [0usize, 1, 9, 10, 11, 37] {
            let rows = numbered(total);
            let page_size = size(10);
            let count = page_count(total, page_size);
            let mut seen = Vec::new();
            for idx in 1..=count {
                let page = compute_page(&rows, page_size, idx as i64);
                if idx < count {
                    assert_eq!(page.rows.len(), 10);
                } else {
                    assert_eq!(page.rows.len(), total - (count - 1) * 10);
                }
                assert_eq!(page.descriptor.rows_on_page, page.rows.len());
                seen.extend_from_slice(page.rows);
            }
            assert_eq!(seen.as_slice(), rows.rows());
        }
    }

    #[test]
    fn descriptor_ordinals_follow_the_slice() {
        let rows = numbered(120);
        let page = compute_page(&rows, size(50), 3);
        assert_eq!(
            page.descriptor,
            PageDescriptor {
                page_index: 3,
                page_count: 3,
                rows_on_page: 20,
                first_row_ordinal: 101,
                last_row_ordinal: 120,
                total_rows: 120,
            }
        );
    }

    #[test]
    fn out_of_range_indexes_give_empty_slices() {
        let rows = numbered(5);
        for idx in [i64::MIN, -1, 0, 2, 3, i64::MAX] {
            let page = compute_page(&rows, size(5), idx);
            assert!(page.rows.is_empty(), "idx={idx}");
            assert_eq!(page.descriptor.rows_on_page, 0);
            assert_eq!(page.descriptor.page_count, 1);
        }
    }

    #[test]
    fn empty_set_renders_one_empty_page() {
        let rows = numbered(0);
        let page = compute_page(&rows, size(50), 1);
        assert!(page.rows.is_empty());
        assert_eq!(page.descriptor.page_count, 1);
        assert_eq!(page.descriptor.first_row_ordinal, 0);
        assert_eq!(page.descriptor.last_row_ordinal, 0);
    }

    #[test]
    fn compute_page_is_idempotent() {
        let rows = numbered(33);
        let a = compute_page(&rows, size(10), 2);
        let b = compute_page(&rows, size(10), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn labels_for_time_columns() {
        assert_eq!(label_for("x_last_hour", "3.0"), "3 min");
        assert_eq!(label_for("x_last_hour", "2.5"), "3 min");
        assert_eq!(label_for("x_last_day", "1.5"), "1h 30m");
        assert_eq!(label_for("x_last_day", "0.5"), "30 min");
        assert_eq!(label_for("x_last_week", "2.0"), "2h ");
        assert_eq!(label_for("x_last_week", "0"), "0 min");
        assert_eq!(label_for("name", "anything"), "anything");
        // minutes do not carry into the hour
        assert_eq!(label_for("x_last_day", "1.9999"), "1h 60m");
    }

    #[test]
    fn labels_pass_through_non_numeric_values() {
        assert_eq!(label_for("uptime_last_hour", ""), "");
        assert_eq!(label_for("uptime_last_day", "n/a"), "n/a");
        assert_eq!(label_for("uptime_last_day", "NaN"), "NaN");
    }

    #[test]
    fn first_column_is_never_formatted() {
        let rows = ResultSet::parse(
            "uptime_last_hour,downtime_last_hour,uptime_last_day\n5.5,5.5,1.25\n",
            b',',
            RowPolicy::Strict,
        )
        .unwrap();
        assert_eq!(format_row(&rows.rows()[0]), vec!["5.5", "6 min", "1h 15m"]);
    }

    #[test]
    fn header_labels_replace_underscores() {
        assert_eq!(header_label("uptime_last_hour"), "uptime last hour");
    }

    #[test]
    fn page_window_stays_inside_bounds() {
        assert_eq!(page_window(1, 3, 7), vec![1, 2, 3]);
        assert_eq!(page_window(1, 20, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_window(10, 20, 5), vec![8, 9, 10, 11, 12]);
        assert_eq!(page_window(20, 20, 5), vec![16, 17, 18, 19, 20]);
        assert_eq!(page_window(1, 1, 5), vec![1]);
    }

    #[test]
    fn view_state_transitions_are_clamped_and_pure() {
        let view = ViewState::new(Arc::new(numbered(120)), size(50));
        assert_eq!(view.current_page(), 1);
        assert!(!view.has_prev());
        assert!(view.has_next());

        let prev = view.apply(Navigation::Prev);
        assert_eq!(prev.current_page(), 1);

        let last = view.apply(Navigation::Last);
        assert_eq!(last.current_page(), 3);
        assert!(!last.has_next());
        assert_eq!(last.apply(Navigation::Next).current_page(), 3);
        assert_eq!(last.page().rows.len(), 20);

        assert_eq!(view.apply(Navigation::Goto(99)).current_page(), 3);
        assert_eq!(view.apply(Navigation::Goto(-4)).current_page(), 1);
        // the original value is untouched
        assert_eq!(view.current_page(), 1);
    }

    #[test]
    fn single_row_report_fits_one_page() {
        let rows = ResultSet::parse("id,a_last_hour\n7,90\n", b',', RowPolicy::Fill).unwrap();
        let view = ViewState::new(Arc::new(rows), size(DEFAULT_PAGE_SIZE));
        let page = view.page();
        assert_eq!(page.descriptor.page_count, 1);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].get("id"), Some("7"));
        assert_eq!(page.rows[0].get("a_last_hour"), Some("90"));
    }
}
