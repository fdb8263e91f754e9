//! Lightweight markdown for chat bubbles.
//!
//! Text is parsed into a tree and every leaf is escaped when HTML is emitted,
//! so message content can never smuggle markup into the page.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(Vec<Inline>),
    Emphasis(Vec<Inline>),
    Code(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// One source line; consecutive lines are separated by line breaks.
    Line(Vec<Inline>),
    ListItem(Vec<Inline>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

pub fn parse(text: &str) -> Document {
    let blocks = text
        .split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            match list_item_body(line) {
                Some(body) => Block::ListItem(parse_inline(body)),
                None => Block::Line(parse_inline(line)),
            }
        })
        .collect();

    Document { blocks }
}

/// `^\s*[-*]\s(.*)`
fn list_item_body(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let after_marker = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('*'))?;
    let separator = after_marker.chars().next().filter(|ch| ch.is_whitespace())?;
    Some(&after_marker[separator.len_utf8()..])
}

fn parse_inline(input: &str) -> Vec<Inline> {
    let mut nodes = Vec::new();
    let mut text = String::new();
    let mut rest = input;

    while let Some(ch) = rest.chars().next() {
        if let Some((inner, tail)) = delimited(rest, "**") {
            flush_text(&mut text, &mut nodes);
            nodes.push(Inline::Strong(parse_inline(inner)));
            rest = tail;
            continue;
        }
        if let Some((inner, tail)) = delimited(rest, "*") {
            flush_text(&mut text, &mut nodes);
            nodes.push(Inline::Emphasis(parse_inline(inner)));
            rest = tail;
            continue;
        }
        if let Some((inner, tail)) = delimited(rest, "`") {
            flush_text(&mut text, &mut nodes);
            nodes.push(Inline::Code(inner.to_string()));
            rest = tail;
            continue;
        }

        text.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    flush_text(&mut text, &mut nodes);
    nodes
}

/// Splits `input` as `<marker>inner<marker>tail` with a non-empty, shortest `inner`.
fn delimited<'a>(input: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    let after = input.strip_prefix(marker)?;
    let end = after.find(marker)?;
    if end == 0 {
        return None;
    }
    Some((&after[..end], &after[end + marker.len()..]))
}

fn flush_text(text: &mut String, nodes: &mut Vec<Inline>) {
    if !text.is_empty() {
        nodes.push(Inline::Text(std::mem::take(text)));
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

impl Document {
    pub fn to_html(&self) -> String {
        let mut html = String::from("<div>");
        let mut in_list = false;
        let mut previous_was_line = false;

        for block in &self.blocks {
            match block {
                Block::ListItem(inlines) => {
                    if !in_list {
                        html.push_str("<ul>");
                        in_list = true;
                    }
                    html.push_str("<li>");
                    write_inlines_html(inlines, &mut html);
                    html.push_str("</li>");
                    previous_was_line = false;
                }
                Block::Line(inlines) => {
                    if in_list {
                        html.push_str("</ul>");
                        in_list = false;
                    } else if previous_was_line {
                        html.push_str("<br />");
                    }
                    write_inlines_html(inlines, &mut html);
                    previous_was_line = true;
                }
            }
        }

        if in_list {
            html.push_str("</ul>");
        }
        html.push_str("</div>");
        html
    }

    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|block| match block {
                Block::Line(inlines) => plain_inlines(inlines),
                Block::ListItem(inlines) => format!("• {}", plain_inlines(inlines)),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn write_inlines_html(inlines: &[Inline], html: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => html.push_str(&escape_html(text)),
            Inline::Strong(children) => {
                html.push_str("<strong>");
                write_inlines_html(children, html);
                html.push_str("</strong>");
            }
            Inline::Emphasis(children) => {
                html.push_str("<em>");
                write_inlines_html(children, html);
                html.push_str("</em>");
            }
            Inline::Code(code) => {
                html.push_str("<code>");
                html.push_str(&escape_html(code));
                html.push_str("</code>");
            }
        }
    }
}

fn plain_inlines(inlines: &[Inline]) -> String {
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::Text(text) | Inline::Code(text) => text.clone(),
            Inline::Strong(children) | Inline::Emphasis(children) => plain_inlines(children),
        })
        .collect()
}
