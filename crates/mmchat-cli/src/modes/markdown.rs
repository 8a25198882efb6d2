//! Markdown to terminal text.
//!
//! Model replies use lightweight markup. This module turns it into lines a
//! terminal can print directly: emphasis becomes SGR styling, lists get
//! bullets or numbers, links keep their target in parentheses. Raw HTML is
//! dropped.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

const BOLD: &str = "\x1b[1m";
const BOLD_OFF: &str = "\x1b[22m";
const ITALIC: &str = "\x1b[3m";
const ITALIC_OFF: &str = "\x1b[23m";

const RULE_WIDTH: usize = 20;

/// Renders markdown text into terminal lines joined by `\n`.
///
/// Plain text without markup comes back unchanged, minus surrounding
/// whitespace.
pub fn render(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = TerminalRenderer::default();
    for event in Parser::new_ext(text, options) {
        renderer.process_event(event);
    }
    renderer.finish()
}

#[derive(Debug)]
struct ListState {
    ordered: Option<u64>,
    current_item: u64,
}

#[derive(Default)]
struct TerminalRenderer {
    lines: Vec<String>,
    current: String,
    /// Marker for the list item whose first line is not written yet.
    item_prefix: Option<String>,
    list_stack: Vec<ListState>,
    quote_depth: usize,
    /// Open links: target and the offset in `current` where the label starts.
    link_stack: Vec<(String, usize)>,
    code_block: Option<String>,
}

impl TerminalRenderer {
    fn process_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => {
                if let Some(code) = self.code_block.as_mut() {
                    code.push_str(&text);
                } else {
                    self.current.push_str(&text);
                }
            }
            Event::Code(code) => {
                self.current.push('`');
                self.current.push_str(&code);
                self.current.push('`');
            }
            // Single newlines in model text are line breaks too.
            Event::SoftBreak | Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.push_line("─".repeat(RULE_WIDTH));
                self.push_blank();
            }
            Event::TaskListMarker(checked) => {
                self.current.push_str(if checked { "[x] " } else { "[ ] " });
            }
            Event::Html(_) | Event::InlineHtml(_) => {
                // Skip HTML to avoid terminal injection
            }
            Event::FootnoteReference(label) => {
                self.current.push_str(&format!("[^{label}]"));
            }
            Event::InlineMath(math) | Event::DisplayMath(math) => self.current.push_str(&math),
        }
    }

    fn start_tag(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { .. } => {
                self.flush_line();
                self.current.push_str(BOLD);
            }
            Tag::CodeBlock(kind) => {
                self.flush_line();
                let fence = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => format!("```{lang}"),
                    _ => "```".to_string(),
                };
                self.push_line(fence);
                self.code_block = Some(String::new());
            }
            Tag::List(start) => {
                self.flush_line();
                self.list_stack.push(ListState {
                    ordered: start,
                    current_item: start.unwrap_or(1),
                });
            }
            Tag::Item => {
                self.flush_line();
                let depth = self.list_stack.len().saturating_sub(1);
                let marker = match self.list_stack.last() {
                    Some(ListState {
                        ordered: Some(_),
                        current_item,
                    }) => format!("{current_item}. "),
                    _ => "- ".to_string(),
                };
                self.item_prefix = Some(format!("{}{marker}", "  ".repeat(depth)));
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth += 1;
            }
            Tag::Emphasis => self.current.push_str(ITALIC),
            Tag::Strong => self.current.push_str(BOLD),
            Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => {
                self.link_stack.push((dest_url.to_string(), self.current.len()));
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush_line();
                if self.list_stack.is_empty() {
                    self.push_blank();
                }
            }
            TagEnd::Heading(_) => {
                self.current.push_str(BOLD_OFF);
                self.flush_line();
                self.push_blank();
            }
            TagEnd::CodeBlock => {
                let code = self.code_block.take().unwrap_or_default();
                for line in code.lines() {
                    self.push_line(line.to_string());
                }
                self.push_line("```".to_string());
                self.push_blank();
            }
            TagEnd::List(_) => {
                self.flush_line();
                self.list_stack.pop();
                if self.list_stack.is_empty() {
                    self.push_blank();
                }
            }
            TagEnd::Item => {
                self.flush_line();
                self.item_prefix = None;
                if let Some(list) = self.list_stack.last_mut() {
                    list.current_item += 1;
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::Emphasis => self.current.push_str(ITALIC_OFF),
            TagEnd::Strong => self.current.push_str(BOLD_OFF),
            TagEnd::Link | TagEnd::Image => {
                if let Some((url, start)) = self.link_stack.pop() {
                    let label = self.current.get(start..).unwrap_or_default();
                    // Autolinks already show their target.
                    if !url.is_empty() && label != url {
                        self.current.push_str(&format!(" ({url})"));
                    }
                }
            }
            _ => {}
        }
    }

    fn flush_line(&mut self) {
        if self.current.is_empty() && self.item_prefix.is_none() {
            return;
        }
        let text = std::mem::take(&mut self.current);
        let prefix = match self.item_prefix.take() {
            Some(marker) => marker,
            None => "  ".repeat(self.list_stack.len()),
        };
        self.push_line(format!("{prefix}{text}"));
    }

    fn push_line(&mut self, line: String) {
        let quote = "> ".repeat(self.quote_depth);
        self.lines.push(format!("{quote}{line}"));
    }

    fn push_blank(&mut self) {
        if self.lines.last().is_some_and(|line| !line.is_empty()) {
            self.lines.push(String::new());
        }
    }

    fn finish(mut self) -> String {
        self.flush_line();
        while self.lines.last().is_some_and(String::is_empty) {
            self.lines.pop();
        }
        self.lines.join("\n")
    }
}
