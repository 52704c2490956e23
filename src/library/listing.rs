//! Catalog `list` queries and their tabular output.
//!
//! With `-f uuid` the tool prints a header line (`id uuid`), one row per book
//! starting with its numeric id, and trailing blank lines.

use super::BookId;

/// Search expression matching `author` and `title` exactly.
pub fn exact_query(author: &str, title: &str) -> String {
    format!(
        "author:\"={}\" title:\"={}\"",
        escape_quoted(author),
        escape_quoted(title)
    )
}

/// Escape a value for use inside a double-quoted search term.
fn escape_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Ids of all data rows. Errors name the first row that does not start with an id.
pub fn parse_ids(output: &str) -> Result<Vec<BookId>, String> {
    rows(output)
        .map(|row| {
            row.split_whitespace()
                .next()
                .and_then(|token| token.parse().ok())
                .map(BookId)
                .ok_or_else(|| format!("row without a book id: '{row}'"))
        })
        .collect()
}

/// Whether the listing holds no data rows (header followed by blank lines only).
pub fn is_header_only(output: &str) -> bool {
    rows(output).next().is_none()
}

fn rows(output: &str) -> impl Iterator<Item = &str> {
    output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
}
