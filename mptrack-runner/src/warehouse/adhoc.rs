//! Ad-hoc analytical queries: a read-only guard and result rendering.

use thiserror::Error;

use super::Table;

#[derive(Debug, Error, PartialEq)]
pub enum AdhocError {
    #[error("query is empty")]
    Empty,

    #[error("only SELECT or WITH statements are allowed, found '{0}'")]
    NotReadOnly(String),

    #[error("multiple statements are not allowed")]
    MultipleStatements,

    #[error("'{0}' is not allowed in a read-only query")]
    WriteKeyword(String),
}

/// Rejected as whole words anywhere outside quotes. T-SQL batches need no
/// `;` between statements, so `SELECT 1 DELETE ...` is two statements.
const WRITE_KEYWORDS: [&str; 14] = [
    "INSERT", "UPDATE", "DELETE", "MERGE", "DROP", "ALTER", "CREATE", "TRUNCATE", "EXEC",
    "EXECUTE", "GRANT", "REVOKE", "DENY", "INTO",
];

/// Drop `--` line comments and `/* */` block comments, leaving string
/// literals untouched.
fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if c == '\'' {
                in_string = false;
            }
            continue;
        }
        match (c, chars.peek()) {
            ('\'', _) => {
                in_string = true;
                out.push(c);
            }
            ('-', Some(&'-')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some(&'*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Blank out the inside of string literals (`'..'`) and quoted identifiers
/// (`".."`, `[..]`), keeping the delimiters. Doubled quotes close and reopen,
/// which masks the same characters.
fn mask_quoted(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut close: Option<char> = None;
    for c in sql.chars() {
        match close {
            Some(end) if c == end => {
                close = None;
                out.push(c);
            }
            Some(_) => out.push(' '),
            None => {
                close = match c {
                    '\'' => Some('\''),
                    '"' => Some('"'),
                    '[' => Some(']'),
                    _ => None,
                };
                out.push(c);
            }
        }
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '$')
}

/// Accept a single `SELECT` or `WITH` statement that cannot write. A trailing
/// `;` is allowed; anything after it is not.
pub fn ensure_read_only(sql: &str) -> Result<String, AdhocError> {
    let cleaned = strip_comments(sql);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return Err(AdhocError::Empty);
    }
    let masked = mask_quoted(trimmed);

    if let Some(i) = masked.find(';') {
        if !masked[i + 1..].trim().is_empty() {
            return Err(AdhocError::MultipleStatements);
        }
    }

    let mut words = masked
        .split(|c: char| !is_word_char(c))
        .filter(|w| !w.is_empty())
        .map(str::to_uppercase);
    let first = words.next().unwrap_or_default();
    if first != "SELECT" && first != "WITH" {
        return Err(AdhocError::NotReadOnly(first));
    }
    if let Some(word) = words.find(|w| WRITE_KEYWORDS.contains(&w.as_str())) {
        return Err(AdhocError::WriteKeyword(word));
    }
    Ok(trimmed.trim_end_matches(';').trim_end().to_string())
}

/// Aligned plain-text table, at most `limit` rows.
pub fn render_text(table: &Table, limit: usize) -> String {
    let shown = &table.rows[..table.rows.len().min(limit)];
    let cells: Vec<Vec<String>> = shown
        .iter()
        .map(|row| row.iter().map(|c| c.render()).collect())
        .collect();

    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{v:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&table.columns));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row));
        out.push('\n');
    }
    if table.rows.len() > shown.len() {
        out.push_str(&format!(
            "... {} more rows ({} total)\n",
            table.rows.len() - shown.len(),
            table.rows.len()
        ));
    }
    out
}

/// Full result set as CSV.
pub fn render_csv(table: &Table) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|c| c.render()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::Cell;

    #[test]
    fn select_and_with_are_allowed() {
        assert_eq!(
            ensure_read_only("  select 1;  ").unwrap(),
            "select 1".to_string()
        );
        assert!(ensure_read_only("WITH x AS (SELECT 1 AS a) SELECT a FROM x").is_ok());
        assert!(ensure_read_only("-- header\n/* note */ SELECT TICKER FROM dbo.Market_Data").is_ok());
    }

    #[test]
    fn writes_are_rejected() {
        assert_eq!(
            ensure_read_only("DELETE FROM dbo.Market_Data"),
            Err(AdhocError::NotReadOnly("DELETE".into()))
        );
        assert_eq!(
            ensure_read_only("/* SELECT */ UPDATE t SET a = 1"),
            Err(AdhocError::NotReadOnly("UPDATE".into()))
        );
        assert_eq!(ensure_read_only("  -- nothing\n"), Err(AdhocError::Empty));
    }

    #[test]
    fn chained_statements_are_rejected() {
        assert_eq!(
            ensure_read_only("SELECT 1; DROP TABLE dbo.Market_Data"),
            Err(AdhocError::MultipleStatements)
        );
        assert!(ensure_read_only("SELECT ';' AS semi").is_ok());
        assert!(ensure_read_only("SELECT [a;b], \"c;d\" FROM t").is_ok());
    }

    #[test]
    fn batches_without_semicolons_are_rejected() {
        assert_eq!(
            ensure_read_only("SELECT 1 DELETE FROM dbo.Market_Data"),
            Err(AdhocError::WriteKeyword("DELETE".into()))
        );
        assert_eq!(
            ensure_read_only("SELECT 1\nDROP TABLE dbo.Market_Data"),
            Err(AdhocError::WriteKeyword("DROP".into()))
        );
        assert_eq!(
            ensure_read_only("WITH x AS (SELECT 1 AS a) DELETE FROM dbo.Market_Data"),
            Err(AdhocError::WriteKeyword("DELETE".into()))
        );
    }

    #[test]
    fn select_into_is_rejected() {
        assert_eq!(
            ensure_read_only("SELECT * INTO dbo.Scratch FROM dbo.Market_Data"),
            Err(AdhocError::WriteKeyword("INTO".into()))
        );
        assert_eq!(
            ensure_read_only("select x into #tmp from t"),
            Err(AdhocError::WriteKeyword("INTO".into()))
        );
    }

    #[test]
    fn keywords_inside_quotes_or_names_are_fine() {
        assert!(ensure_read_only("SELECT 'DELETE' AS note").is_ok());
        assert!(ensure_read_only("SELECT [Update] FROM t").is_ok());
        assert!(ensure_read_only("SELECT \"Drop\" FROM t").is_ok());
        assert!(ensure_read_only("SELECT UPDATED_AT, created_by FROM t").is_ok());
        assert!(ensure_read_only("SELECT 'it''s' AS s").is_ok());
    }

    fn sample() -> Table {
        Table {
            columns: vec!["TICKER".into(), "PX_LAST".into()],
            rows: vec![
                vec![Cell::Text("FPT".into()), Cell::Float(120.5)],
                vec![Cell::Text("VCB".into()), Cell::Null],
                vec![Cell::Text("HPG, JSC".into()), Cell::Int(25)],
            ],
        }
    }

    #[test]
    fn text_rendering_aligns_and_truncates() {
        let text = render_text(&sample(), 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "TICKER  PX_LAST");
        assert_eq!(lines[1], "------  -------");
        assert_eq!(lines[2], "FPT     120.5");
        assert_eq!(lines[3], "VCB");
        assert_eq!(lines[4], "... 1 more rows (3 total)");
    }

    #[test]
    fn csv_rendering_quotes() {
        let csv = render_csv(&sample()).unwrap();
        assert_eq!(
            csv,
            "TICKER,PX_LAST\nFPT,120.5\nVCB,\n\"HPG, JSC\",25\n"
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn guard_never_panics(sql in "\\PC*") {
                let _ = ensure_read_only(&sql);
            }

            #[test]
            fn anything_after_a_semicolon_is_rejected(tail in "[A-Za-z]{1,12}") {
                prop_assert_eq!(
                    ensure_read_only(&format!("SELECT 1; {tail}")),
                    Err(AdhocError::MultipleStatements)
                );
            }

            #[test]
            fn write_keyword_anywhere_is_rejected(
                idx in 0..WRITE_KEYWORDS.len(),
                lower in any::<bool>(),
            ) {
                let word = if lower {
                    WRITE_KEYWORDS[idx].to_lowercase()
                } else {
                    WRITE_KEYWORDS[idx].to_string()
                };
                prop_assert_eq!(
                    ensure_read_only(&format!("SELECT a FROM t {word} b")),
                    Err(AdhocError::WriteKeyword(WRITE_KEYWORDS[idx].to_string()))
                );
            }

            #[test]
            fn leading_keyword_decides(word in "[A-Z]{1,8}") {
                prop_assume!(word != "SELECT" && word != "WITH");
                prop_assert_eq!(
                    ensure_read_only(&format!("{word} x FROM t")),
                    Err(AdhocError::NotReadOnly(word.clone()))
                );
            }
        }
    }
}
