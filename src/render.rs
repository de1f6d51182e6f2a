//! Markdown → element tree, for on-screen preview and for export.
//!
//! [`DocumentRenderer`] parses Markdown with `comrak` (GFM tables,
//! strikethrough, autolinks, task lists) and lowers the AST into a small
//! owned tree of [`RenderNode`]s. Seven node kinds get override rules
//! ([`NodeType`]); everything else maps to its plain HTML element.
//!
//! Preview and export go through the same lowering. The only thing a
//! [`RenderTarget`] changes is the `class` attribute values, so the two
//! trees always have the same shape: same elements, same nesting, same text.
//! [`RenderedDocument::shape`] exposes exactly that class-free view.
//!
//! Raw HTML in the Markdown is never passed through; it is kept as escaped
//! text.

use comrak::nodes::{AstNode, ListType, NodeValue, TableAlignment};
use comrak::{parse_document, Arena, ComrakOptions};
use serde::Serialize;
use std::fmt::Write as _;

/// Image source used when the Markdown omits one.
pub const PLACEHOLDER_IMAGE_SRC: &str = "/placeholder.svg";

const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];
const VOID_TAGS: [&str; 4] = ["img", "br", "hr", "input"];

/// Node kinds that carry override rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Heading(u8),
    Paragraph,
    InlineCode,
    CodeBlock,
    Table,
    Image,
    Link,
}

/// Who the tree is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderTarget {
    /// The interactive view; utility classes for the host UI.
    #[default]
    Preview,
    /// Hidden surface for export; semantic classes matched by preset CSS.
    Export,
}

/// One element with its attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: &'static str,
    pub attrs: Vec<(&'static str, String)>,
    pub children: Vec<RenderNode>,
    /// Set on the outermost element produced for an overridden node.
    pub role: Option<NodeType>,
}

impl Element {
    fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            children: Vec::new(),
            role: None,
        }
    }

    fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    fn class(self, class: &str) -> Self {
        if class.is_empty() {
            self
        } else {
            self.attr("class", class)
        }
    }

    fn role(mut self, role: NodeType) -> Self {
        self.role = Some(role);
        self
    }

    fn children(mut self, children: Vec<RenderNode>) -> Self {
        self.children = children;
        self
    }

    fn child(mut self, child: RenderNode) -> Self {
        self.children.push(child);
        self
    }
}

/// A node of the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderNode {
    Element(Element),
    Text(String),
}

impl From<Element> for RenderNode {
    fn from(e: Element) -> Self {
        RenderNode::Element(e)
    }
}

/// Class values for the overridden elements of one target.
#[derive(Debug, Clone, Copy)]
struct OverrideClasses {
    heading: &'static str,
    paragraph: &'static str,
    inline_code: &'static str,
    code_block: &'static str,
    code_block_inner: &'static str,
    table_wrap: &'static str,
    table: &'static str,
    image_wrap: &'static str,
    image: &'static str,
    link: &'static str,
}

const PREVIEW_CLASSES: OverrideClasses = OverrideClasses {
    heading: "font-bold",
    paragraph: "whitespace-pre-wrap break-words",
    inline_code: "px-1 py-0.5 bg-gray-100 rounded text-sm",
    code_block: "overflow-x-auto p-4 bg-gray-100 rounded-md my-4 text-sm",
    code_block_inner: "",
    table_wrap: "my-4 overflow-x-auto",
    table: "min-w-full border-collapse border border-gray-300 table-auto",
    image_wrap: "overflow-hidden",
    image: "max-w-full h-auto",
    link: "break-words",
};

const EXPORT_CLASSES: OverrideClasses = OverrideClasses {
    heading: "",
    paragraph: "",
    inline_code: "inline-code",
    code_block: "code-block",
    code_block_inner: "",
    table_wrap: "table-wrap",
    table: "",
    image_wrap: "image-wrap",
    image: "",
    link: "",
};

impl RenderTarget {
    fn classes(self) -> &'static OverrideClasses {
        match self {
            RenderTarget::Preview => &PREVIEW_CLASSES,
            RenderTarget::Export => &EXPORT_CLASSES,
        }
    }
}

/// Counts of the overridden node kinds in a rendered tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StructureSummary {
    pub headings: usize,
    pub paragraphs: usize,
    pub tables: usize,
    /// Header and body rows of all tables.
    pub table_rows: usize,
    pub code_blocks: usize,
    pub inline_code: usize,
    pub images: usize,
    pub links: usize,
}

/// The lowered tree for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    target: RenderTarget,
    nodes: Vec<RenderNode>,
}

impl RenderedDocument {
    pub fn target(&self) -> RenderTarget {
        self.target
    }

    pub fn nodes(&self) -> &[RenderNode] {
        &self.nodes
    }

    /// Serialise as an HTML fragment.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            write_node(&mut out, node, true);
        }
        out
    }

    /// The tree serialised without `class` attributes. Equal for preview
    /// and export renders of the same Markdown.
    pub fn shape(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            write_node(&mut out, node, false);
        }
        out
    }

    /// Count overridden nodes by kind.
    pub fn summary(&self) -> StructureSummary {
        let mut s = StructureSummary::default();
        for node in &self.nodes {
            tally(node, &mut s);
        }
        s
    }
}

fn tally(node: &RenderNode, s: &mut StructureSummary) {
    let RenderNode::Element(el) = node else {
        return;
    };
    match el.role {
        Some(NodeType::Heading(_)) => s.headings += 1,
        Some(NodeType::Paragraph) => s.paragraphs += 1,
        Some(NodeType::InlineCode) => s.inline_code += 1,
        Some(NodeType::CodeBlock) => s.code_blocks += 1,
        Some(NodeType::Table) => s.tables += 1,
        Some(NodeType::Image) => s.images += 1,
        Some(NodeType::Link) => s.links += 1,
        None => {}
    }
    if el.tag == "tr" {
        s.table_rows += 1;
    }
    for child in &el.children {
        tally(child, s);
    }
}

fn write_node(out: &mut String, node: &RenderNode, with_classes: bool) {
    match node {
        RenderNode::Text(t) => out.push_str(&html_escape::encode_text(t)),
        RenderNode::Element(el) => {
            out.push('<');
            out.push_str(el.tag);
            for (name, value) in &el.attrs {
                if !with_classes && *name == "class" {
                    continue;
                }
                let _ = write!(
                    out,
                    " {}=\"{}\"",
                    name,
                    html_escape::encode_double_quoted_attribute(value)
                );
            }
            if VOID_TAGS.contains(&el.tag) {
                out.push_str(" />");
                return;
            }
            out.push('>');
            for child in &el.children {
                write_node(out, child, with_classes);
            }
            out.push_str("</");
            out.push_str(el.tag);
            out.push('>');
            if is_block(el.tag) {
                out.push('\n');
            }
        }
    }
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "h1" | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "p"
            | "pre"
            | "div"
            | "table"
            | "thead"
            | "tbody"
            | "tr"
            | "ul"
            | "ol"
            | "li"
            | "blockquote"
    )
}

/// Parses Markdown and lowers it for a target.
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    placeholder_src: String,
}

impl Default for DocumentRenderer {
    fn default() -> Self {
        Self {
            placeholder_src: PLACEHOLDER_IMAGE_SRC.to_string(),
        }
    }
}

impl DocumentRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different image placeholder.
    pub fn with_placeholder(mut self, src: impl Into<String>) -> Self {
        self.placeholder_src = src.into();
        self
    }

    /// Parse `markdown` and lower it for `target`. Never fails: any input is
    /// valid CommonMark.
    pub fn render(&self, markdown: &str, target: RenderTarget) -> RenderedDocument {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &comrak_options());
        let lower = Lowering {
            classes: target.classes(),
            placeholder_src: &self.placeholder_src,
        };
        RenderedDocument {
            target,
            nodes: lower.children(root),
        }
    }
}

/// Preview HTML for `markdown` with the default renderer.
pub fn render_preview_html(markdown: &str) -> String {
    DocumentRenderer::default()
        .render(markdown, RenderTarget::Preview)
        .to_html()
}

fn comrak_options() -> ComrakOptions<'static> {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options
}

struct Lowering<'r> {
    classes: &'static OverrideClasses,
    placeholder_src: &'r str,
}

impl Lowering<'_> {
    fn children<'a>(&self, node: &'a AstNode<'a>) -> Vec<RenderNode> {
        let mut out = Vec::new();
        for child in node.children() {
            self.lower(child, &mut out);
        }
        out
    }

    fn lower<'a>(&self, node: &'a AstNode<'a>, out: &mut Vec<RenderNode>) {
        let c = self.classes;
        let data = node.data.borrow();
        let el = match &data.value {
            NodeValue::Text(t) => {
                out.push(RenderNode::Text(t.clone()));
                return;
            }
            NodeValue::SoftBreak => {
                out.push(RenderNode::Text("\n".into()));
                return;
            }
            // Raw HTML is shown, not interpreted.
            NodeValue::HtmlBlock(html) => {
                out.push(RenderNode::Text(html.literal.clone()));
                return;
            }
            NodeValue::HtmlInline(raw) => {
                out.push(RenderNode::Text(raw.clone()));
                return;
            }
            NodeValue::FrontMatter(_) => return,
            NodeValue::LineBreak => Element::new("br"),
            NodeValue::ThematicBreak => Element::new("hr"),

            NodeValue::Heading(h) => {
                let level = h.level.clamp(1, 6);
                Element::new(HEADING_TAGS[usize::from(level) - 1])
                    .class(c.heading)
                    .role(NodeType::Heading(level))
                    .children(self.children(node))
            }
            NodeValue::Paragraph if in_tight_list(node) => {
                out.extend(self.children(node));
                return;
            }
            NodeValue::Paragraph => Element::new("p")
                .class(c.paragraph)
                .role(NodeType::Paragraph)
                .children(self.children(node)),
            NodeValue::Code(code) => Element::new("code")
                .class(c.inline_code)
                .role(NodeType::InlineCode)
                .child(RenderNode::Text(code.literal.clone())),
            NodeValue::CodeBlock(block) => {
                let lang = block.info.split_whitespace().next().unwrap_or_default();
                let mut inner = Element::new("code").class(c.code_block_inner);
                if !lang.is_empty() {
                    inner = inner.attr("data-language", lang);
                }
                Element::new("pre")
                    .class(c.code_block)
                    .role(NodeType::CodeBlock)
                    .child(inner.child(RenderNode::Text(block.literal.clone())).into())
            }
            NodeValue::Table(table) => {
                let table_el = self.table(node, &table.alignments);
                Element::new("div")
                    .class(c.table_wrap)
                    .role(NodeType::Table)
                    .child(table_el.into())
            }
            NodeValue::Image(link) => {
                let src = if link.url.trim().is_empty() {
                    self.placeholder_src.to_string()
                } else {
                    safe_url(&link.url)
                };
                let mut img = Element::new("img")
                    .attr("src", src)
                    .attr("alt", plain_text(node))
                    .class(c.image);
                if !link.title.is_empty() {
                    img = img.attr("title", link.title.clone());
                }
                Element::new("span")
                    .class(c.image_wrap)
                    .role(NodeType::Image)
                    .child(img.into())
            }
            NodeValue::Link(link) => {
                let mut a = Element::new("a")
                    .attr("href", safe_url(&link.url))
                    .attr("target", "_blank")
                    .attr("rel", "noopener noreferrer")
                    .class(c.link)
                    .role(NodeType::Link);
                if !link.title.is_empty() {
                    a = a.attr("title", link.title.clone());
                }
                a.children(self.children(node))
            }

            NodeValue::List(list) => {
                let el = match list.list_type {
                    ListType::Ordered => {
                        let el = Element::new("ol");
                        if list.start != 1 {
                            el.attr("start", list.start.to_string())
                        } else {
                            el
                        }
                    }
                    ListType::Bullet => Element::new("ul"),
                };
                el.children(self.children(node))
            }
            NodeValue::Item(_) => Element::new("li").children(self.children(node)),
            NodeValue::TaskItem(checked) => {
                let mut input = Element::new("input")
                    .attr("type", "checkbox")
                    .attr("disabled", "");
                if checked.is_some() {
                    input = input.attr("checked", "");
                }
                let mut kids = vec![input.into(), RenderNode::Text(" ".into())];
                kids.extend(self.children(node));
                Element::new("li").children(kids)
            }
            NodeValue::BlockQuote => Element::new("blockquote").children(self.children(node)),
            NodeValue::Emph => Element::new("em").children(self.children(node)),
            NodeValue::Strong => Element::new("strong").children(self.children(node)),
            NodeValue::Strikethrough => Element::new("del").children(self.children(node)),
            NodeValue::Superscript => Element::new("sup").children(self.children(node)),

            _ => {
                out.extend(self.children(node));
                return;
            }
        };
        out.push(el.into());
    }

    fn table<'a>(&self, node: &'a AstNode<'a>, alignments: &[TableAlignment]) -> Element {
        let mut head = Vec::new();
        let mut body = Vec::new();
        for row in node.children() {
            let header = matches!(row.data.borrow().value, NodeValue::TableRow(true));
            let cell_tag = if header { "th" } else { "td" };
            let cells = row
                .children()
                .enumerate()
                .map(|(i, cell)| {
                    let mut el = Element::new(cell_tag);
                    if let Some(align) = alignments.get(i).and_then(|a| align_value(*a)) {
                        el = el.attr("style", format!("text-align: {align}"));
                    }
                    el.children(self.children(cell)).into()
                })
                .collect();
            let tr: RenderNode = Element::new("tr").children(cells).into();
            if header {
                head.push(tr);
            } else {
                body.push(tr);
            }
        }

        let mut table = Element::new("table").class(self.classes.table);
        if !head.is_empty() {
            table = table.child(Element::new("thead").children(head).into());
        }
        if !body.is_empty() {
            table = table.child(Element::new("tbody").children(body).into());
        }
        table
    }
}

fn align_value(a: TableAlignment) -> Option<&'static str> {
    match a {
        TableAlignment::Left => Some("left"),
        TableAlignment::Center => Some("center"),
        TableAlignment::Right => Some("right"),
        TableAlignment::None => None,
    }
}

/// Script URLs are neutralised.
fn safe_url(url: &str) -> String {
    let lowered = url.trim_start().to_ascii_lowercase();
    if lowered.starts_with("javascript:") || lowered.starts_with("vbscript:") {
        "#".to_string()
    } else {
        url.to_string()
    }
}

/// Paragraphs directly inside items of a tight list are unwrapped.
fn in_tight_list<'a>(node: &'a AstNode<'a>) -> bool {
    let Some(item) = node.parent() else {
        return false;
    };
    if !matches!(
        item.data.borrow().value,
        NodeValue::Item(_) | NodeValue::TaskItem(_)
    ) {
        return false;
    }
    item.parent().is_some_and(|list| match &list.data.borrow().value {
        NodeValue::List(l) => l.tight,
        _ => false,
    })
}

fn plain_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text<'a>(node: &'a AstNode<'a>, out: &mut String) {
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(t) => out.push_str(t),
            NodeValue::Code(c) => out.push_str(&c.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => out.push(' '),
            _ => collect_text(child, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Title\n\nIntro with `code` and a [link](https://example.com).\n\n\
| A | B |\n|---|:-:|\n| 1 | 2 |\n| 3 | 4 |\n\n```rust\nfn main() {}\n```\n\n![chart](chart.png)\n";

    #[test]
    fn headings_keep_level() {
        let doc = DocumentRenderer::new().render("## Two\n\n###### Six", RenderTarget::Export);
        let html = doc.to_html();
        assert!(html.contains("<h2>Two</h2>"), "got: {html}");
        assert!(html.contains("<h6>Six</h6>"), "got: {html}");
        assert_eq!(doc.summary().headings, 2);
    }

    #[test]
    fn table_is_wrapped_with_header_and_body() {
        let doc = DocumentRenderer::new().render(SAMPLE, RenderTarget::Preview);
        let html = doc.to_html();
        assert!(
            html.contains("<div class=\"my-4 overflow-x-auto\"><table class="),
            "got: {html}"
        );
        assert!(html.contains("<thead>"));
        assert!(html.contains("<th>A</th>"));
        assert!(html.contains("<td style=\"text-align: center\">2</td>"), "got: {html}");
        let s = doc.summary();
        assert_eq!(s.tables, 1);
        assert_eq!(s.table_rows, 3);
    }

    #[test]
    fn code_block_and_inline_code_are_distinct() {
        let doc = DocumentRenderer::new().render(SAMPLE, RenderTarget::Preview);
        let s = doc.summary();
        assert_eq!(s.code_blocks, 1);
        assert_eq!(s.inline_code, 1);
        let html = doc.to_html();
        assert!(html.contains("<pre class=\"overflow-x-auto p-4 bg-gray-100 rounded-md my-4 text-sm\">"));
        assert!(html.contains("data-language=\"rust\""));
    }

    #[test]
    fn links_open_in_new_context() {
        let html = render_preview_html("[x](https://example.com)");
        assert!(
            html.contains("href=\"https://example.com\" target=\"_blank\" rel=\"noopener noreferrer\""),
            "got: {html}"
        );
    }

    #[test]
    fn missing_image_source_uses_placeholder() {
        let html = render_preview_html("![logo]()");
        assert!(html.contains("src=\"/placeholder.svg\""), "got: {html}");
        assert!(html.contains("alt=\"logo\""));
    }

    #[test]
    fn script_urls_are_neutralised() {
        let html = render_preview_html("[bad](javascript:alert(1))");
        assert!(html.contains("href=\"#\""), "got: {html}");
    }

    #[test]
    fn raw_html_is_escaped() {
        let html = render_preview_html("<script>alert(1)</script>\n");
        assert!(!html.contains("<script>"), "got: {html}");
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn preview_and_export_share_structure() {
        let r = DocumentRenderer::new();
        let preview = r.render(SAMPLE, RenderTarget::Preview);
        let export = r.render(SAMPLE, RenderTarget::Export);
        assert_eq!(preview.summary(), export.summary());
        assert_eq!(preview.shape(), export.shape());
        assert_ne!(preview.to_html(), export.to_html());
    }

    #[test]
    fn empty_markdown_renders_nothing() {
        let doc = DocumentRenderer::new().render("", RenderTarget::Export);
        assert!(doc.nodes().is_empty());
        assert_eq!(doc.summary(), StructureSummary::default());
    }

    #[test]
    fn task_list_renders_checkboxes() {
        let html = render_preview_html("- [x] done\n- [ ] todo\n");
        assert!(html.contains("<input type=\"checkbox\" disabled=\"\" checked=\"\" />"), "got: {html}");
    }
}
