//! Self-consistency lint for the Markdown schema reference.
//!
//! The reference opens with a summary table (one row per warehouse table,
//! with a `Table` column) followed by one heading per table describing its
//! columns. Every summarised table needs a section and every table section
//! needs a summary row.
//!
//! A heading is a table section when, after stripping list numbering and a
//! `Table:` prefix, it is a single identifier that is backticked, was
//! prefixed, contains `_` or `.`, or names a summarised table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocIssue {
    /// No Markdown table with a `Table` column was found.
    NoSummaryTable,
    /// Listed in the summary but has no detail section.
    Undocumented { table: String },
    /// Has a detail section (at `line`, 1-based) but is not in the summary.
    Unlisted { table: String, line: usize },
    /// More than one detail section for the same table.
    DuplicateSection { table: String, line: usize },
}

impl std::fmt::Display for DocIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocIssue::NoSummaryTable => write!(f, "no summary table with a 'Table' column"),
            DocIssue::Undocumented { table } => {
                write!(f, "{table} is listed in the summary but has no section")
            }
            DocIssue::Unlisted { table, line } => {
                write!(f, "line {line}: section {table} is not listed in the summary")
            }
            DocIssue::DuplicateSection { table, line } => {
                write!(f, "line {line}: {table} has more than one section")
            }
        }
    }
}

/// Comparison key: no `dbo.` prefix, lower case.
fn table_key(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    lowered
        .strip_prefix("dbo.")
        .map(str::to_string)
        .unwrap_or(lowered)
}

fn strip_markup(cell: &str) -> (String, bool) {
    let had_ticks = cell.contains('`');
    let cleaned: String = cell
        .chars()
        .filter(|c| !matches!(c, '`' | '*' | '[' | ']'))
        .collect();
    (cleaned.trim().to_string(), had_ticks)
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim().trim_start_matches('|').trim_end_matches('|');
    trimmed.split('|').map(|c| c.trim().to_string()).collect()
}

fn is_separator(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|') && t.contains('-') && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Names in the first summary table, in order.
fn summary_tables(lines: &[&str]) -> Option<Vec<String>> {
    for i in 0..lines.len().saturating_sub(1) {
        let line = lines[i].trim();
        if !line.starts_with('|') || !is_separator(lines[i + 1]) {
            continue;
        }
        let header = split_row(line);
        let Some(col) = header
            .iter()
            .position(|h| strip_markup(h).0.eq_ignore_ascii_case("table"))
        else {
            continue;
        };

        let names = lines[i + 2..]
            .iter()
            .take_while(|l| l.trim().starts_with('|'))
            .filter_map(|l| split_row(l).get(col).map(|c| strip_markup(c).0))
            .filter(|name| !name.is_empty())
            .collect();
        return Some(names);
    }
    None
}

/// Heading text if the line is an ATX heading.
fn heading_text(line: &str) -> Option<&str> {
    let t = line.trim_start();
    let rest = t.trim_start_matches('#');
    if rest.len() == t.len() || !(rest.is_empty() || rest.starts_with(' ')) {
        return None;
    }
    Some(rest.trim().trim_end_matches('#').trim())
}

/// Table name named by a heading, if the heading is a table section.
fn section_table(heading: &str, listed: &BTreeMap<String, String>) -> Option<String> {
    let unnumbered = heading
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
        .trim();
    let (body, prefixed) = match unnumbered.get(..6) {
        Some(p) if p.eq_ignore_ascii_case("table:") => (unnumbered[6..].trim(), true),
        _ => (unnumbered, false),
    };
    let (name, ticked) = strip_markup(body);
    if !is_identifier(&name) {
        return None;
    }
    let shaped = ticked || prefixed || name.contains('_') || name.contains('.');
    (shaped || listed.contains_key(&table_key(&name))).then_some(name)
}

/// Lint a schema reference document.
pub fn lint_schema_doc(markdown: &str) -> Vec<DocIssue> {
    let lines: Vec<&str> = markdown.lines().collect();
    let Some(summary) = summary_tables(&lines) else {
        return vec![DocIssue::NoSummaryTable];
    };
    let listed: BTreeMap<String, String> = summary
        .iter()
        .map(|name| (table_key(name), name.clone()))
        .collect();

    let mut issues = Vec::new();
    let mut sections: BTreeMap<String, usize> = BTreeMap::new();
    let mut in_fence = false;

    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let Some(heading) = heading_text(line) else {
            continue;
        };
        let Some(table) = section_table(heading, &listed) else {
            continue;
        };
        let key = table_key(&table);
        if sections.contains_key(&key) {
            issues.push(DocIssue::DuplicateSection {
                table,
                line: i + 1,
            });
            continue;
        }
        sections.insert(key.clone(), i + 1);
        if !listed.contains_key(&key) {
            issues.push(DocIssue::Unlisted {
                table,
                line: i + 1,
            });
        }
    }

    for (key, name) in &listed {
        if !sections.contains_key(key) {
            issues.push(DocIssue::Undocumented {
                table: name.clone(),
            });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# Warehouse schema

## Summary

| # | Table | Primary key |
|---|-------|-------------|
| 1 | `dbo.Market_Data` | TICKER, TRADE_DATE |
| 2 | MarketIndex | COMGROUPCODE, TRADINGDATE |
| 3 | Sector_Map | Ticker |

## 1. Market_Data

| Column | Type |
|--------|------|
| TICKER | varchar |

## 2. MarketIndex

## Table: Sector_Map

```sql
# not a heading
```
";

    #[test]
    fn consistent_document() {
        assert!(lint_schema_doc(DOC).is_empty());
    }

    #[test]
    fn undocumented_and_unlisted() {
        let doc = DOC.replace("## 2. MarketIndex", "## 2. `Forecast`");
        let issues = lint_schema_doc(&doc);
        assert_eq!(
            issues,
            vec![
                DocIssue::Unlisted {
                    table: "Forecast".into(),
                    line: 17
                },
                DocIssue::Undocumented {
                    table: "MarketIndex".into()
                },
            ]
        );
    }

    #[test]
    fn duplicate_section() {
        let doc = format!("{DOC}\n### dbo.Sector_Map\n");
        let issues = lint_schema_doc(&doc);
        assert!(matches!(
            issues.as_slice(),
            [DocIssue::DuplicateSection { table, .. }] if table == "dbo.Sector_Map"
        ));
    }

    #[test]
    fn missing_summary() {
        assert_eq!(
            lint_schema_doc("# Schema\n\n## Market_Data\n"),
            vec![DocIssue::NoSummaryTable]
        );
    }

    #[test]
    fn prose_headings_are_ignored() {
        let doc = format!("{DOC}\n## Notes\n\n## Query tips\n");
        assert!(lint_schema_doc(&doc).is_empty());
    }
}
