//! Turns the markdown-ish report text returned by the model into typed
//! display blocks.
//!
//! The scan is a single pass over lines. Table rows are buffered until the
//! first non-table line so that consecutive rows (including separator rows
//! in between) end up in one [`Table`].

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBlock {
    /// Level 1 is `# `, 2 is `## `, 3 is `### `.
    Heading { level: u8, text: String },
    ListItem(String),
    Table(Table),
    Paragraph(String),
    Blank,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRow<'a> {
    pub cells: &'a [String],
    pub is_header: bool,
}

impl Table {
    /// Header first, then body rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = TableRow<'_>> {
        std::iter::once(TableRow {
            cells: &self.header,
            is_header: true,
        })
        .chain(self.rows.iter().map(|row| TableRow {
            cells: row,
            is_header: false,
        }))
    }

    pub fn column_count(&self) -> usize {
        self.iter_rows()
            .map(|row| row.cells.len())
            .max()
            .unwrap_or(0)
    }

    fn from_buffer(buffer: Vec<Vec<String>>) -> Option<Self> {
        let mut rows = buffer.into_iter();
        let header = rows.next()?;
        Some(Self {
            header,
            rows: rows.collect(),
        })
    }
}

/// Never fails: anything unrecognized becomes a paragraph.
pub fn format_text(text: &str) -> Vec<DisplayBlock> {
    let mut blocks = Vec::new();
    let mut pending: Vec<Vec<String>> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('|') {
            let cells = split_row(trimmed);
            if is_separator_row(&cells) {
                continue;
            }
            pending.push(cells);
            continue;
        }
        flush_table(&mut pending, &mut blocks);
        blocks.push(classify_line(trimmed));
    }
    flush_table(&mut pending, &mut blocks);
    blocks
}

fn flush_table(pending: &mut Vec<Vec<String>>, blocks: &mut Vec<DisplayBlock>) {
    if let Some(table) = Table::from_buffer(std::mem::take(pending)) {
        blocks.push(DisplayBlock::Table(table));
    }
}

fn classify_line(trimmed: &str) -> DisplayBlock {
    // Longest prefix first so `### x` never reads as `## `.
    const HEADINGS: [(&str, u8); 3] = [("### ", 3), ("## ", 2), ("# ", 1)];
    for (prefix, level) in HEADINGS {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return DisplayBlock::Heading {
                level,
                text: rest.trim().to_string(),
            };
        }
    }
    if let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
    {
        return DisplayBlock::ListItem(rest.to_string());
    }
    if trimmed.is_empty() {
        return DisplayBlock::Blank;
    }
    DisplayBlock::Paragraph(trimmed.to_string())
}

fn split_row(trimmed: &str) -> Vec<String> {
    let mut cells: Vec<&str> = trimmed.split('|').map(str::trim).collect();
    if cells.first().is_some_and(|cell| cell.is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|cell| cell.is_empty()) {
        cells.pop();
    }
    cells.into_iter().map(str::to_string).collect()
}

fn is_separator_row(cells: &[String]) -> bool {
    cells
        .iter()
        .all(|cell| cell.is_empty() || is_separator_cell(cell))
}

fn is_separator_cell(cell: &str) -> bool {
    cell.contains('-')
        && cell
            .chars()
            .all(|ch| ch == '-' || ch == ':' || ch.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(level: u8, text: &str) -> DisplayBlock {
        DisplayBlock::Heading {
            level,
            text: text.to_string(),
        }
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn formats_reference_document() {
        let blocks = format_text("## A\n- b\n\n| x | y |\n|---|---|\n| 1 | 2 |");
        assert_eq!(
            blocks,
            vec![
                heading(2, "A"),
                DisplayBlock::ListItem("b".into()),
                DisplayBlock::Blank,
                DisplayBlock::Table(Table {
                    header: row(&["x", "y"]),
                    rows: vec![row(&["1", "2"])],
                }),
            ]
        );
    }

    #[test]
    fn heading_prefixes_match_longest_first() {
        let blocks = format_text("### x\n## y\n# z\n#nospace");
        assert_eq!(
            blocks,
            vec![
                heading(3, "x"),
                heading(2, "y"),
                heading(1, "z"),
                DisplayBlock::Paragraph("#nospace".into()),
            ]
        );
    }

    #[test]
    fn list_markers_and_paragraphs() {
        let blocks = format_text("  * star item \n-dash without space\nplain   ");
        assert_eq!(
            blocks,
            vec![
                DisplayBlock::ListItem("star item".into()),
                DisplayBlock::Paragraph("-dash without space".into()),
                DisplayBlock::Paragraph("plain".into()),
            ]
        );
    }

    #[test]
    fn separators_never_become_rows() {
        let blocks = format_text("|---|:---:|\n| a | b |\n| --- | --- |\n| c | d |");
        let DisplayBlock::Table(table) = &blocks[0] else {
            panic!("expected table, got {blocks:?}");
        };
        assert_eq!(blocks.len(), 1);
        assert_eq!(table.header, row(&["a", "b"]));
        assert_eq!(table.rows, vec![row(&["c", "d"])]);
    }

    #[test]
    fn header_only_table_is_emitted_and_flushed_by_text() {
        let blocks = format_text("| Version | EOL |\n|---|---|\nAfter the table");
        assert_eq!(
            blocks,
            vec![
                DisplayBlock::Table(Table {
                    header: row(&["Version", "EOL"]),
                    rows: vec![],
                }),
                DisplayBlock::Paragraph("After the table".into()),
            ]
        );
    }

    #[test]
    fn blank_line_splits_tables() {
        let blocks = format_text("| a |\n\n| b |");
        assert_eq!(blocks.len(), 3);
        assert!(matches!(blocks[1], DisplayBlock::Blank));
    }

    #[test]
    fn keeps_inner_empty_cells() {
        let blocks = format_text("| a || c |");
        let DisplayBlock::Table(table) = &blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(table.header, row(&["a", "", "c"]));
    }

    #[test]
    fn iter_rows_flags_header_first() {
        let table = Table {
            header: row(&["h1", "h2"]),
            rows: vec![row(&["1", "2", "3"])],
        };
        let flags: Vec<bool> = table.iter_rows().map(|r| r.is_header).collect();
        assert_eq!(flags, vec![true, false]);
        assert_eq!(table.column_count(), 3);
    }

    #[test]
    fn handles_crlf_and_empty_input() {
        assert!(format_text("").is_empty());
        assert_eq!(
            format_text("# T\r\n- i\r\n"),
            vec![heading(1, "T"), DisplayBlock::ListItem("i".into())]
        );
    }
}
