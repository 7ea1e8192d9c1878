//! Snippet parser: highlighted HTML table → line number → line content.
//!
//! The provider renders every hit as a small table, one row per source line.
//! A row holds an optional line-number cell and a content cell; the content
//! cell wraps matched text in `<mark>`. Only rows with a `<mark>` are hits,
//! the rest are surrounding context and are dropped.

use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};

use crate::hits::LineMap;

struct Selectors {
    row: Selector,
    cell: Selector,
    mark: Selector,
    lineno: Selector,
}

fn selectors() -> Option<&'static Selectors> {
    static SELECTORS: OnceLock<Option<Selectors>> = OnceLock::new();
    SELECTORS
        .get_or_init(|| {
            Some(Selectors {
                row: Selector::parse("tr").ok()?,
                cell: Selector::parse("td").ok()?,
                mark: Selector::parse("mark").ok()?,
                lineno: Selector::parse(".lineno").ok()?,
            })
        })
        .as_ref()
}

/// Extract the highlighted lines of one snippet.
///
/// Never fails: malformed markup degrades to whatever rows the HTML parser
/// could recover, and a snippet without highlights yields an empty map.
#[must_use]
pub fn parse_snippet(html: &str) -> LineMap {
    let mut lines = LineMap::new();
    let Some(sel) = selectors() else {
        return lines;
    };

    let fragment = Html::parse_fragment(html);
    for row in fragment.select(&sel.row) {
        let cells: Vec<ElementRef> = row.select(&sel.cell).collect();
        let Some(content) = cells.last() else {
            continue;
        };
        if content.select(&sel.mark).next().is_none() {
            continue;
        }
        let Some(number) = line_number(row, &cells, sel) else {
            continue;
        };
        lines.insert(number, collapse_line(&content.text().collect::<String>()));
    }
    lines
}

/// Line number of a row: the `.lineno` element, else the `data-line`
/// attribute, else the first of two or more cells.
fn line_number(row: ElementRef, cells: &[ElementRef], sel: &Selectors) -> Option<String> {
    let text = row
        .select(&sel.lineno)
        .next()
        .map(|el| el.text().collect::<String>())
        .or_else(|| row.value().attr("data-line").map(str::to_string))
        .or_else(|| {
            (cells.len() >= 2).then(|| cells[0].text().collect::<String>())
        })?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Fold line breaks into single spaces and trim trailing whitespace.
/// Leading indentation is kept.
fn collapse_line(raw: &str) -> String {
    let raw = raw.trim_matches(|c| c == '\n' || c == '\r');
    let mut out = String::with_capacity(raw.len());
    let mut in_break = false;
    for ch in raw.chars() {
        if ch == '\n' || ch == '\r' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(ch);
            in_break = false;
        }
    }
    out.truncate(out.trim_end().len());
    out
}
