use std::fmt::Write as _;
use std::io::Write;

use chrono::{DateTime, Local};
use textwrap::Options;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::error::Result;
use crate::formatter::{format_text, DisplayBlock, Table};
use crate::history::HistoryList;
use crate::model::LifecycleResult;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Paragraph wrap width in characters. 0 disables wrapping.
    pub width: usize,
    pub max_cell_chars: usize,
    pub include_sources: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 100,
            max_cell_chars: 40,
            include_sources: true,
        }
    }
}

/// Lays out reports and history as plain terminal text.
#[derive(Debug, Clone, Default)]
pub struct TextRenderer {
    config: RenderConfig,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn report(&self, result: &LifecycleResult) -> String {
        let mut out = String::new();
        let title = result.product_name.trim();
        out.push_str(title);
        out.push('\n');
        out.push_str(&"=".repeat(title.width().max(3)));
        out.push_str("\n\n");
        out.push_str(&self.blocks(&format_text(&result.summary)));
        if self.config.include_sources && !result.sources.is_empty() {
            out.push_str("\nSources\n-------\n");
            for (idx, source) in result.sources.iter().enumerate() {
                if source.is_navigable() {
                    let _ = writeln!(out, "[{}] {} <{}>", idx + 1, source.title, source.uri);
                } else {
                    let _ = writeln!(out, "[{}] {}", idx + 1, source.title);
                }
            }
        }
        out
    }

    pub fn write_report<W: Write>(&self, result: &LifecycleResult, mut writer: W) -> Result<()> {
        writer.write_all(self.report(result).as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn blocks(&self, blocks: &[DisplayBlock]) -> String {
        let mut out = String::new();
        let mut previous_blank = true;
        for block in blocks {
            match block {
                DisplayBlock::Blank => {
                    if !previous_blank {
                        out.push('\n');
                    }
                    previous_blank = true;
                    continue;
                }
                DisplayBlock::Heading { level, text } => {
                    if !previous_blank {
                        out.push('\n');
                    }
                    match level {
                        1 => underline(&mut out, text, '='),
                        2 => underline(&mut out, text, '-'),
                        _ => {
                            let _ = writeln!(out, "{}", text.to_uppercase());
                        }
                    }
                }
                DisplayBlock::ListItem(text) => {
                    self.wrap_into(&mut out, text, "  • ", "    ");
                }
                DisplayBlock::Paragraph(text) => {
                    self.wrap_into(&mut out, text, "", "");
                }
                DisplayBlock::Table(table) => {
                    if !previous_blank {
                        out.push('\n');
                    }
                    out.push_str(&self.table(table));
                }
            }
            previous_blank = false;
        }
        out
    }

    pub fn table(&self, table: &Table) -> String {
        let columns = table.column_count();
        let mut widths = vec![0usize; columns];
        let rows: Vec<Vec<String>> = table
            .iter_rows()
            .map(|row| {
                (0..columns)
                    .map(|col| {
                        let cell = row.cells.get(col).map(String::as_str).unwrap_or("");
                        truncate(cell, self.config.max_cell_chars)
                    })
                    .collect()
            })
            .collect();
        for row in &rows {
            for (col, cell) in row.iter().enumerate() {
                widths[col] = widths[col].max(cell.width());
            }
        }
        let mut out = String::new();
        for (idx, row) in rows.iter().enumerate() {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| pad(cell, *width))
                .collect();
            out.push_str(line.join(" | ").trim_end());
            out.push('\n');
            if idx == 0 {
                let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
                out.push_str(&rule.join("-+-"));
                out.push('\n');
            }
        }
        out
    }

    pub fn history(&self, history: &HistoryList) -> String {
        if history.is_empty() {
            return "No recent searches yet.\n".to_string();
        }
        let mut out = String::new();
        for (idx, entry) in history.entries().iter().enumerate() {
            let when = DateTime::from_timestamp_millis(entry.timestamp)
                .map(|utc| {
                    utc.with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M")
                        .to_string()
                })
                .unwrap_or_else(|| "unknown time".to_string());
            let _ = writeln!(out, "{:>2}. {}  ({})", idx + 1, entry.query, when);
        }
        out
    }

    fn wrap_into(&self, out: &mut String, text: &str, first_prefix: &str, rest_prefix: &str) {
        let width = self.config.width;
        if width == 0 {
            let _ = writeln!(out, "{first_prefix}{text}");
            return;
        }
        let options = Options::new(width)
            .initial_indent(first_prefix)
            .subsequent_indent(rest_prefix);
        let lines = textwrap::wrap(text, options);
        if lines.is_empty() {
            let _ = writeln!(out, "{}", first_prefix.trim_end());
        }
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
    }
}

fn underline(out: &mut String, text: &str, ch: char) {
    let _ = writeln!(out, "{text}");
    let len = text.width().max(3);
    let _ = writeln!(out, "{}", ch.to_string().repeat(len));
}

/// Cuts `cell` to at most `limit` display columns, marking the cut with `…`.
fn truncate(cell: &str, limit: usize) -> String {
    if limit == 0 || cell.width() <= limit {
        return cell.to_string();
    }
    let target = limit - 1;
    let mut out = String::new();
    let mut used = 0;
    for ch in cell.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > target {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn pad(cell: &str, width: usize) -> String {
    let mut out = cell.to_string();
    out.extend(std::iter::repeat(' ').take(width.saturating_sub(cell.width())));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryList;
    use crate::model::Source;

    #[test]
    fn renders_aligned_table() {
        let table = Table {
            header: vec!["Version".into(), "EOL".into()],
            rows: vec![vec!["8".into(), "2030-12-31".into()]],
        };
        let rendered = TextRenderer::new().table(&table);
        assert_eq!(
            rendered,
            "Version | EOL\n--------+-----------\n8       | 2030-12-31\n"
        );
    }

    /// Display column of the first `|` or `+` on each line.
    fn separator_columns(rendered: &str) -> Vec<usize> {
        rendered
            .lines()
            .map(|line| {
                let idx = line.find(['|', '+']).expect("separator");
                line[..idx].width()
            })
            .collect()
    }

    #[test]
    fn wide_characters_keep_columns_aligned() {
        let table = Table {
            header: vec!["Version".into(), "EOL".into()],
            rows: vec![
                vec!["视窗十".into(), "2025-10-14".into()],
                vec!["🚀 v2".into(), "n/a".into()],
            ],
        };
        let rendered = TextRenderer::new().table(&table);
        assert_eq!(separator_columns(&rendered), vec![8, 8, 8, 8]);
        assert!(rendered.contains("视窗十  | 2025-10-14"));
    }

    #[test]
    fn truncation_counts_display_columns() {
        assert_eq!(truncate("视窗十年", 5), "视窗…");
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(pad("视", 4), "视  ");
    }

    #[test]
    fn pads_short_rows_and_truncates_long_cells() {
        let renderer = TextRenderer::with_config(RenderConfig {
            max_cell_chars: 4,
            ..Default::default()
        });
        let table = Table {
            header: vec!["a".into(), "b".into()],
            rows: vec![vec!["abcdefgh".into()]],
        };
        let rendered = renderer.table(&table);
        assert!(rendered.contains("abc…"));
        assert_eq!(rendered.lines().count(), 3);
    }

    #[test]
    fn report_includes_headings_lists_and_sources() {
        let result = LifecycleResult {
            product_name: "Java 8".into(),
            summary: "# Java 8 Lifecycle Overview\n### migration\n- move to 21".into(),
            sources: vec![
                Source::new(Some("Oracle".into()), Some("https://oracle.example".into())),
                Source::new(None, None),
            ],
        };
        let text = TextRenderer::new().report(&result);
        assert!(text.starts_with("Java 8\n======\n\n"));
        assert!(text.contains("Java 8 Lifecycle Overview\n========================="));
        assert!(text.contains("MIGRATION\n"));
        assert!(text.contains("  • move to 21\n"));
        assert!(text.contains("[1] Oracle <https://oracle.example>"));
        assert!(text.contains("[2] Source\n"));
    }

    #[test]
    fn wraps_paragraphs() {
        let renderer = TextRenderer::with_config(RenderConfig {
            width: 10,
            ..Default::default()
        });
        let text = renderer.blocks(&[DisplayBlock::Paragraph("one two three four".into())]);
        assert_eq!(text, "one two\nthree four\n");

        let text = renderer.blocks(&[DisplayBlock::ListItem("alpha beta gamma".into())]);
        assert_eq!(text, "  • alpha\n    beta\n    gamma\n");
    }

    #[test]
    fn empty_history_has_placeholder() {
        assert_eq!(
            TextRenderer::new().history(&HistoryList::new()),
            "No recent searches yet.\n"
        );
        let mut history = HistoryList::new();
        history.upsert("Windows 10", 0);
        assert!(TextRenderer::new().history(&history).starts_with(" 1. Windows 10  ("));
    }
}
