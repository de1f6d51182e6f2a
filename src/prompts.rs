//! System prompt for the vision-LLM extraction backend.
//!
//! Overridable through [`crate::config::ExtractionConfig::system_prompt`].
//! The rules below ask for exactly the constructs the preview and export
//! renderers style: headings, paragraphs, GFM tables, fenced code, links
//! and images.

/// Default instruction sent with every page image.
pub const DEFAULT_SYSTEM_PROMPT: &str = r####"You transcribe one page of a PDF document, given as an image, into GitHub-flavoured Markdown.

Rules:

1. Keep every piece of body text, in natural reading order. Do not summarise.
2. Headings: "#" only for the document title, "##" for sections, "###" and deeper for subsections.
3. Lists: "-" for bullets, "1." for numbered items, nested with two-space indentation.
4. Tables: GFM pipe tables with a header row and a separator row. One table row per visual row.
5. Code: fenced blocks with a language tag when it is evident; single backticks for inline code.
6. Figures: "![short description]()" in place of each chart, photo or diagram.
7. Skip page numbers, running headers and footers, and decorative rules.

Reply with the Markdown only. No surrounding ``` fence, no commentary."####;
