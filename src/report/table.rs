//! Left-aligned text tables truncated to the terminal width.

/// Columns between cells.
const GAP: usize = 2;

/// Width of the terminal in columns.
///
/// Queries the controlling terminal first, then the `COLUMNS` environment
/// variable, falling back to 80.
#[must_use]
pub fn terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) = terminal_size::terminal_size()
        && w > 0
    {
        return usize::from(w);
    }
    std::env::var("COLUMNS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(80)
}

/// Shorten `s` to at most `max` characters, ending with `...` when cut.
#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Character offset at which column `col` starts once `rows` is rendered.
#[must_use]
pub fn column_offset(rows: &[Vec<String>], col: usize) -> usize {
    (0..col)
        .map(|c| {
            rows.iter()
                .filter_map(|row| row.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                + GAP
        })
        .sum()
}

/// Render `rows` (the first row being the header) as aligned columns.
///
/// Widths are measured in characters so multi-byte glyphs count once. Rows
/// longer than `width` are truncated. Every row ends with a newline.
#[must_use]
pub fn render(rows: &[Vec<String>], width: usize) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (col, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(col) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    for row in rows {
        let mut line = String::new();
        for (col, cell) in row.iter().enumerate() {
            line.push_str(cell);
            if col + 1 < row.len() {
                let pad = widths
                    .get(col)
                    .copied()
                    .unwrap_or(0)
                    .saturating_sub(cell.chars().count())
                    + GAP;
                line.push_str(&" ".repeat(pad));
            }
        }
        out.push_str(&truncate(&line, width));
        out.push('\n');
    }
    out
}
