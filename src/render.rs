use once_cell::sync::Lazy;
use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Options, Parser, Tag};
use regex::Regex;

use crate::sections::Section;

// Line breaks are the only raw HTML the prompt asks for (inside table cells).
static LINE_BREAK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^<br\s*/?>$").expect("valid line break pattern"));

const UNSAFE_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSection {
    pub title: String,
    pub html: String,
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options
}

fn is_unsafe_destination(dest: &str) -> bool {
    let dest = dest.trim_start().to_ascii_lowercase();
    UNSAFE_SCHEMES.iter().any(|scheme| dest.starts_with(scheme))
}

fn sanitize(event: Event<'_>) -> Event<'_> {
    match event {
        Event::SoftBreak => Event::HardBreak,
        Event::Html(raw) => {
            if LINE_BREAK_TAG.is_match(raw.trim()) {
                Event::Html(raw)
            } else {
                Event::Text(raw)
            }
        }
        Event::Start(Tag::Link(kind, dest, title)) if is_unsafe_destination(&dest) => {
            Event::Start(Tag::Link(kind, CowStr::Borrowed("#"), title))
        }
        Event::Start(Tag::Image(kind, dest, title)) if is_unsafe_destination(&dest) => {
            Event::Start(Tag::Image(kind, CowStr::Borrowed("#"), title))
        }
        other => other,
    }
}

/// Convert a section body to an HTML fragment.
///
/// Tables and strikethrough are enabled and a single newline becomes a line
/// break. Raw HTML other than `<br>` is escaped, and script-like link targets
/// are neutralised.
pub fn render_markdown(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, options()).map(sanitize);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

pub fn render_section(section: &Section) -> RenderedSection {
    RenderedSection {
        title: section.title.clone(),
        html: render_markdown(&section.body),
    }
}

pub fn render_sections(sections: &[Section]) -> Vec<RenderedSection> {
    sections.iter().map(render_section).collect()
}

/// Join rendered sections into one fragment, one card per section.
pub fn render_document(sections: &[RenderedSection]) -> String {
    let mut out = String::from("<div class=\"results-section\">\n");

    for section in sections {
        out.push_str("<div class=\"result-card\">\n");
        let heading = Tag::Heading(HeadingLevel::H2, None, Vec::new());
        html::push_html(
            &mut out,
            [
                Event::Start(heading.clone()),
                Event::Text(CowStr::Borrowed(section.title.as_str())),
                Event::End(heading),
            ]
            .into_iter(),
        );
        out.push_str(&section.html);
        out.push_str("</div>\n");
    }

    out.push_str("</div>\n");
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineStyle {
    pub strong: bool,
    pub emphasis: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub link: bool,
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inline {
    pub text: String,
    pub style: InlineStyle,
}

/// Block-level layout of a section body, ready to be turned into widgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(Vec<Inline>),
    Paragraph(Vec<Inline>),
    ListItem {
        depth: usize,
        marker: String,
        content: Vec<Inline>,
    },
    Table {
        header: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    Code(String),
    Rule,
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    inlines: Vec<Inline>,
    style: InlineStyle,
    // Next number for ordered lists, `None` for bullets.
    lists: Vec<Option<u64>>,
    marker: Option<String>,
    header: Vec<Vec<Inline>>,
    rows: Vec<Vec<Vec<Inline>>>,
    row: Vec<Vec<Inline>>,
    code: Option<String>,
}

impl BlockBuilder {
    fn push_text(&mut self, text: &str) {
        if let Some(code) = self.code.as_mut() {
            code.push_str(text);
            return;
        }
        if text.is_empty() {
            return;
        }

        match self.inlines.last_mut() {
            Some(last) if last.style == self.style => last.text.push_str(text),
            _ => self.inlines.push(Inline {
                text: text.to_string(),
                style: self.style,
            }),
        }
    }

    fn take_inlines(&mut self) -> Vec<Inline> {
        std::mem::take(&mut self.inlines)
    }

    fn flush_item(&mut self) {
        if self.inlines.is_empty() {
            return;
        }
        let content = self.take_inlines();
        self.blocks.push(Block::ListItem {
            depth: self.lists.len().saturating_sub(1),
            marker: self.marker.take().unwrap_or_default(),
            content,
        });
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::List(start) => {
                self.flush_item();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush_item();
                self.marker = Some(match self.lists.last_mut() {
                    Some(Some(next)) => {
                        let marker = format!("{}.", next);
                        *next += 1;
                        marker
                    }
                    _ => "•".to_string(),
                });
            }
            Tag::CodeBlock(_) => self.code = Some(String::new()),
            Tag::Table(_) => {
                self.header.clear();
                self.rows.clear();
            }
            Tag::TableHead | Tag::TableRow => self.row.clear(),
            Tag::Emphasis => self.style.emphasis = true,
            Tag::Strong => self.style.strong = true,
            Tag::Strikethrough => self.style.strikethrough = true,
            Tag::Link(..) => self.style.link = true,
            _ => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if !self.lists.is_empty() {
                    self.flush_item();
                } else if !self.inlines.is_empty() {
                    let inlines = self.take_inlines();
                    self.blocks.push(Block::Paragraph(inlines));
                }
            }
            Tag::Heading(..) => {
                let inlines = self.take_inlines();
                self.blocks.push(Block::Heading(inlines));
            }
            Tag::Item => self.flush_item(),
            Tag::List(_) => {
                self.flush_item();
                self.lists.pop();
            }
            Tag::CodeBlock(_) => {
                if let Some(code) = self.code.take() {
                    self.blocks.push(Block::Code(code.trim_end().to_string()));
                }
            }
            Tag::TableCell => {
                let cell = self.take_inlines();
                self.row.push(cell);
            }
            Tag::TableHead => self.header = std::mem::take(&mut self.row),
            Tag::TableRow => {
                let row = std::mem::take(&mut self.row);
                self.rows.push(row);
            }
            Tag::Table(_) => self.blocks.push(Block::Table {
                header: std::mem::take(&mut self.header),
                rows: std::mem::take(&mut self.rows),
            }),
            Tag::Emphasis => self.style.emphasis = false,
            Tag::Strong => self.style.strong = false,
            Tag::Strikethrough => self.style.strikethrough = false,
            Tag::Link(..) => self.style.link = false,
            _ => {}
        }
    }

    fn push(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.push_text(&text),
            Event::Code(text) => {
                let outer = self.style;
                self.style.code = true;
                self.push_text(&text);
                self.style = outer;
            }
            Event::SoftBreak | Event::HardBreak => self.push_text("\n"),
            Event::Html(raw) => {
                if LINE_BREAK_TAG.is_match(raw.trim()) {
                    self.push_text("\n");
                } else {
                    self.push_text(&raw);
                }
            }
            Event::Rule => self.blocks.push(Block::Rule),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        if !self.inlines.is_empty() {
            let inlines = self.take_inlines();
            self.blocks.push(Block::Paragraph(inlines));
        }
        self.blocks
    }
}

/// Lay out a section body as blocks, using the same parser options as
/// `render_markdown`. Raw HTML is kept as literal text.
pub fn markdown_blocks(markdown: &str) -> Vec<Block> {
    let mut builder = BlockBuilder::default();
    for event in Parser::new_ext(markdown, options()) {
        builder.push(event);
    }
    builder.finish()
}
