//! HTML pruning for LLM input.
//!
//! Rendered pages are mostly layout, tracking and script noise. The pruner
//! keeps the main content region, drops noise elements and every attribute,
//! drops whitespace-only text, collapses `<div>` wrapper chains and pulls
//! tables out as plain text rows.
//! Pruning its own output returns the same output.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Node, Selector};

/// Elements removed with their whole subtree.
const SKIPPED: &[&str] = &[
    "script", "style", "svg", "nav", "footer", "header", "noscript",
    // raw-text and head-only elements that would not survive a reparse
    "iframe", "template", "noembed", "noframes", "xmp", "plaintext", "title", "meta", "link",
    "base", "basefont", "bgsound",
];

const VOID: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "param", "source", "track", "wbr",
];

/// Separator between cells of an extracted table row.
pub const CELL_SEPARATOR: &str = " | ";

lazy_static! {
    static ref MAIN: Selector = Selector::parse("main").unwrap();
    static ref ROLE_MAIN: Selector = Selector::parse(r#"[role="main"]"#).unwrap();
    static ref CANDIDATES: Selector = Selector::parse("div, section").unwrap();
    static ref BODY: Selector = Selector::parse("body").unwrap();
}

/// Pruned document: cleaned markup plus extracted tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrunedHtml {
    /// Attribute-free markup of the content region, whitespace collapsed
    pub html: String,

    /// One entry per table, one `" | "`-joined string per non-empty row
    pub tables: Vec<Vec<String>>,
}

impl PrunedHtml {
    /// Nothing worth sending to a model.
    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty() && self.tables.is_empty()
    }

    /// Tables as a plain-text block, tables separated by a blank line.
    pub fn tables_text(&self) -> String {
        self.tables
            .iter()
            .map(|rows| rows.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Prune rendered HTML down to its content region.
///
/// Scope priority: the first `<main>`, then the first `role="main"` element,
/// then (with keywords) the `<div>`/`<section>` whose text mentions the
/// keywords most often, then `<body>`. Only the scope's content is emitted,
/// never the scope tag itself.
pub fn prune(html: &str, keywords: &[&str]) -> PrunedHtml {
    let document = Html::parse_document(html);
    let Some(scope) = select_scope(&document, keywords) else {
        return PrunedHtml::default();
    };

    let mut writer = Writer::default();
    writer.children(scope);

    PrunedHtml {
        html: collapse_whitespace(&writer.out),
        tables: writer.tables,
    }
}

fn select_scope<'a>(document: &'a Html, keywords: &[&str]) -> Option<ElementRef<'a>> {
    if let Some(main) = document.select(&MAIN).next() {
        return Some(main);
    }
    if let Some(main) = document.select(&ROLE_MAIN).next() {
        return Some(main);
    }
    if let Some(best) = best_keyword_match(document, keywords) {
        return Some(best);
    }
    document
        .select(&BODY)
        .next()
        .or_else(|| Some(document.root_element()))
}

fn best_keyword_match<'a>(document: &'a Html, keywords: &[&str]) -> Option<ElementRef<'a>> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return None;
    }

    let mut best: Option<(ElementRef<'a>, usize)> = None;
    for candidate in document.select(&CANDIDATES) {
        let text = candidate.text().collect::<Vec<_>>().join(" ").to_lowercase();
        let score: usize = keywords.iter().map(|k| text.matches(k.as_str()).count()).sum();
        if score > best.map(|(_, s)| s).unwrap_or(0) {
            best = Some((candidate, score));
        }
    }
    best.map(|(el, _)| el)
}

#[derive(Default)]
struct Writer {
    out: String,
    tables: Vec<Vec<String>>,
}

impl Writer {
    fn children(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            if let Some(child) = ElementRef::wrap(child) {
                self.element(child);
            } else if let Node::Text(text) = child.value() {
                if !text.trim().is_empty() {
                    escape_into(&mut self.out, text);
                }
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        if SKIPPED.contains(&name) {
            return;
        }
        if name == "table" {
            self.table(el);
            return;
        }
        // `<main>` tags are unwrapped so pruned output never re-selects a scope
        if name == "main" {
            self.children(el);
            return;
        }

        let mut target = el;
        if name == "div" {
            while let Some(inner) = single_div_child(target) {
                for sibling in target.children().filter_map(ElementRef::wrap) {
                    if sibling.value().name() == "table" {
                        self.table(sibling);
                    }
                }
                target = inner;
            }
        }

        self.out.push('<');
        self.out.push_str(name);
        self.out.push('>');
        if VOID.contains(&name) {
            return;
        }
        self.children(target);
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    fn table(&mut self, table: ElementRef<'_>) {
        let mut rows = Vec::new();
        for node in table.descendants() {
            let Some(row) = ElementRef::wrap(node) else {
                continue;
            };
            if row.value().name() != "tr" || !owned_by(row, table) {
                continue;
            }
            let cells: Vec<String> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .map(|c| collapse_whitespace(&c.text().collect::<Vec<_>>().join(" ")))
                .collect();
            if cells.iter().any(|c| !c.is_empty()) {
                rows.push(cells.join(CELL_SEPARATOR));
            }
        }
        if !rows.is_empty() {
            self.tables.push(rows);
        }
    }
}

/// The only rendered child of a `<div>`, when that child is itself a `<div>`.
fn single_div_child<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let mut significant = el.children().filter(|c| is_rendered(c.value()));
    let only = significant.next()?;
    if significant.next().is_some() {
        return None;
    }
    ElementRef::wrap(only).filter(|c| c.value().name() == "div")
}

/// Whether a child contributes to the pruned markup.
fn is_rendered(node: &Node) -> bool {
    match node {
        Node::Text(text) => !text.trim().is_empty(),
        Node::Element(el) => {
            let name = el.name();
            name != "table" && !SKIPPED.contains(&name)
        }
        _ => false,
    }
}

/// Whether `row` belongs to `table` rather than to a table nested inside it.
fn owned_by(row: ElementRef<'_>, table: ElementRef<'_>) -> bool {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
        .map(|a| a.id() == table.id())
        .unwrap_or(false)
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
