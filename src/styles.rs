//! Style presets for exported documents.
//!
//! A preset is pure data: page geometry, typography scale, colour tokens and
//! block spacing. [`StylePreset::to_css`] is the single mapping from that
//! data to CSS, consumed by [`crate::export::ExportFormatter`]. Adding a look
//! means adding a row to [`PRESETS`], never a new code path.
//!
//! The CSS only targets element names and the semantic class hooks emitted
//! by [`crate::render`], so switching presets changes presentation and never
//! the document tree.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Identifier of a built-in preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StylePresetId {
    /// Calibri on A4 with blue headings, the look of a default word processor.
    #[default]
    Classic,
    /// Serif body, US Letter, restrained colour.
    Academic,
    /// Sans-serif with generous margins and accent colours.
    Modern,
    /// Dense spacing for long reference material.
    Compact,
}

impl StylePresetId {
    /// Every preset, in listing order.
    pub const ALL: [StylePresetId; 4] = [
        StylePresetId::Classic,
        StylePresetId::Academic,
        StylePresetId::Modern,
        StylePresetId::Compact,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StylePresetId::Classic => "classic",
            StylePresetId::Academic => "academic",
            StylePresetId::Modern => "modern",
            StylePresetId::Compact => "compact",
        }
    }

    /// The preset's data row.
    pub fn preset(self) -> &'static StylePreset {
        &PRESETS[self as usize]
    }
}

impl fmt::Display for StylePresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StylePresetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        StylePresetId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = StylePresetId::ALL.iter().map(|id| id.as_str()).collect();
                format!("unknown style preset '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// Printed page size and margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// CSS `@page size` keyword, e.g. `"A4"`.
    pub size: &'static str,
    /// Sheet width, used for the on-screen page box.
    pub width: &'static str,
    /// Sheet height.
    pub height: &'static str,
    /// `@page margin` shorthand.
    pub margin: &'static str,
}

/// Fonts and sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Typography {
    pub body_font: &'static str,
    pub heading_font: &'static str,
    pub mono_font: &'static str,
    /// Body size in points.
    pub body_pt: f32,
    pub line_height: f32,
    /// h1..h6 sizes in points.
    pub heading_pt: [f32; 6],
    pub code_pt: f32,
    pub code_block_pt: f32,
    pub table_pt: f32,
    /// Justify paragraph text.
    pub justify: bool,
}

/// Colour tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTokens {
    pub text: &'static str,
    pub background: &'static str,
    /// h1..h6 colours.
    pub heading: [&'static str; 6],
    pub link: &'static str,
    pub code_background: &'static str,
    pub code_block_background: &'static str,
    pub border: &'static str,
    pub table_header_background: &'static str,
    pub quote_background: &'static str,
    pub quote_border: &'static str,
}

/// Block-level spacing, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spacing {
    pub paragraph_after: f32,
    /// Space above h1..h6.
    pub heading_before: [f32; 6],
    /// Space below h1..h6.
    pub heading_after: [f32; 6],
    pub block_margin: f32,
    pub list_indent: f32,
    pub cell_padding_v: f32,
    pub cell_padding_h: f32,
    pub code_block_padding: f32,
}

/// An immutable presentation rule set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StylePreset {
    pub id: StylePresetId,
    pub name: &'static str,
    pub description: &'static str,
    pub page: PageGeometry,
    pub typography: Typography,
    pub colors: ColorTokens,
    pub spacing: Spacing,
}

/// The preset table, indexed by `StylePresetId as usize`.
pub static PRESETS: [StylePreset; 4] = [
    StylePreset {
        id: StylePresetId::Classic,
        name: "Classic",
        description: "Calibri on A4 with blue headings",
        page: PageGeometry {
            size: "A4",
            width: "21cm",
            height: "29.7cm",
            margin: "2.54cm",
        },
        typography: Typography {
            body_font: "'Calibri', 'Arial', sans-serif",
            heading_font: "'Calibri', 'Arial', sans-serif",
            mono_font: "'Consolas', 'Courier New', monospace",
            body_pt: 11.0,
            line_height: 1.5,
            heading_pt: [18.0, 14.0, 12.0, 11.0, 11.0, 11.0],
            code_pt: 10.0,
            code_block_pt: 9.0,
            table_pt: 10.0,
            justify: true,
        },
        colors: ColorTokens {
            text: "#000000",
            background: "#ffffff",
            heading: ["#1f4e79", "#2f5597", "#1f4e79", "#1f4e79", "#1f4e79", "#1f4e79"],
            link: "#0563c1",
            code_background: "#f2f2f2",
            code_block_background: "#f8f8f8",
            border: "#d4d4d4",
            table_header_background: "#f2f2f2",
            quote_background: "#f9f9f9",
            quote_border: "#d4d4d4",
        },
        spacing: Spacing {
            paragraph_after: 6.0,
            heading_before: [24.0, 18.0, 12.0, 12.0, 12.0, 12.0],
            heading_after: [12.0, 6.0, 6.0, 3.0, 3.0, 3.0],
            block_margin: 12.0,
            list_indent: 18.0,
            cell_padding_v: 6.0,
            cell_padding_h: 8.0,
            code_block_padding: 12.0,
        },
    },
    StylePreset {
        id: StylePresetId::Academic,
        name: "Academic",
        description: "Serif body on US Letter with restrained colour",
        page: PageGeometry {
            size: "letter",
            width: "8.5in",
            height: "11in",
            margin: "1in",
        },
        typography: Typography {
            body_font: "'Times New Roman', 'Georgia', serif",
            heading_font: "'Times New Roman', 'Georgia', serif",
            mono_font: "'Courier New', monospace",
            body_pt: 12.0,
            line_height: 2.0,
            heading_pt: [16.0, 14.0, 12.0, 12.0, 12.0, 12.0],
            code_pt: 10.0,
            code_block_pt: 10.0,
            table_pt: 11.0,
            justify: false,
        },
        colors: ColorTokens {
            text: "#000000",
            background: "#ffffff",
            heading: ["#000000", "#000000", "#000000", "#222222", "#222222", "#222222"],
            link: "#000080",
            code_background: "#f4f4f4",
            code_block_background: "#f4f4f4",
            border: "#999999",
            table_header_background: "#eeeeee",
            quote_background: "#ffffff",
            quote_border: "#999999",
        },
        spacing: Spacing {
            paragraph_after: 0.0,
            heading_before: [24.0, 18.0, 12.0, 12.0, 12.0, 12.0],
            heading_after: [12.0, 12.0, 6.0, 6.0, 6.0, 6.0],
            block_margin: 12.0,
            list_indent: 36.0,
            cell_padding_v: 4.0,
            cell_padding_h: 6.0,
            code_block_padding: 8.0,
        },
    },
    StylePreset {
        id: StylePresetId::Modern,
        name: "Modern",
        description: "Clean sans-serif with accent colours and wide margins",
        page: PageGeometry {
            size: "A4",
            width: "21cm",
            height: "29.7cm",
            margin: "2.5cm 3cm",
        },
        typography: Typography {
            body_font: "'Segoe UI', 'Helvetica Neue', 'Arial', sans-serif",
            heading_font: "'Segoe UI Semibold', 'Helvetica Neue', 'Arial', sans-serif",
            mono_font: "'Cascadia Code', 'Consolas', monospace",
            body_pt: 10.5,
            line_height: 1.6,
            heading_pt: [24.0, 18.0, 14.0, 12.0, 11.0, 10.5],
            code_pt: 9.5,
            code_block_pt: 9.0,
            table_pt: 9.5,
            justify: false,
        },
        colors: ColorTokens {
            text: "#1f2933",
            background: "#ffffff",
            heading: ["#0b7285", "#1864ab", "#364fc7", "#364fc7", "#495057", "#495057"],
            link: "#1c7ed6",
            code_background: "#f1f3f5",
            code_block_background: "#f8f9fa",
            border: "#dee2e6",
            table_header_background: "#e7f5ff",
            quote_background: "#f8f9fa",
            quote_border: "#1c7ed6",
        },
        spacing: Spacing {
            paragraph_after: 8.0,
            heading_before: [28.0, 20.0, 16.0, 12.0, 12.0, 12.0],
            heading_after: [10.0, 8.0, 6.0, 4.0, 4.0, 4.0],
            block_margin: 14.0,
            list_indent: 20.0,
            cell_padding_v: 6.0,
            cell_padding_h: 10.0,
            code_block_padding: 14.0,
        },
    },
    StylePreset {
        id: StylePresetId::Compact,
        name: "Compact",
        description: "Dense spacing for long reference material",
        page: PageGeometry {
            size: "A4",
            width: "21cm",
            height: "29.7cm",
            margin: "1.5cm",
        },
        typography: Typography {
            body_font: "'Arial', 'Helvetica', sans-serif",
            heading_font: "'Arial', 'Helvetica', sans-serif",
            mono_font: "'Consolas', 'Courier New', monospace",
            body_pt: 9.5,
            line_height: 1.25,
            heading_pt: [14.0, 12.0, 11.0, 10.0, 9.5, 9.5],
            code_pt: 8.5,
            code_block_pt: 8.0,
            table_pt: 8.5,
            justify: false,
        },
        colors: ColorTokens {
            text: "#111111",
            background: "#ffffff",
            heading: ["#111111", "#111111", "#333333", "#333333", "#333333", "#333333"],
            link: "#0645ad",
            code_background: "#f0f0f0",
            code_block_background: "#f6f6f6",
            border: "#cccccc",
            table_header_background: "#ececec",
            quote_background: "#fafafa",
            quote_border: "#bbbbbb",
        },
        spacing: Spacing {
            paragraph_after: 3.0,
            heading_before: [12.0, 10.0, 8.0, 6.0, 6.0, 6.0],
            heading_after: [4.0, 3.0, 2.0, 2.0, 2.0, 2.0],
            block_margin: 6.0,
            list_indent: 14.0,
            cell_padding_v: 2.0,
            cell_padding_h: 4.0,
            code_block_padding: 6.0,
        },
    },
];

impl StylePreset {
    /// Render this preset as a complete stylesheet.
    ///
    /// Output is a pure function of the preset: no timestamps, no hashing of
    /// pointers, stable rule order.
    pub fn to_css(&self) -> String {
        let t = &self.typography;
        let c = &self.colors;
        let s = &self.spacing;
        let p = &self.page;
        let mut css = String::with_capacity(4096);

        // `write!` into a String cannot fail.
        let _ = write!(
            css,
            "@page {{\n  size: {size};\n  margin: {margin};\n}}\n\
             * {{ box-sizing: border-box; }}\n\
             body {{\n  font-family: {body_font};\n  font-size: {body}pt;\n  line-height: {lh};\n  \
             color: {text};\n  background: {bg};\n  margin: 0 auto;\n  padding: 0;\n  width: {width};\n  \
             min-height: {height};\n}}\n\
             .page {{\n  width: {width};\n  min-height: {height};\n  padding: {margin};\n  margin: 0 auto;\n  \
             background: {bg};\n}}\n",
            size = p.size,
            margin = p.margin,
            body_font = t.body_font,
            body = t.body_pt,
            lh = t.line_height,
            text = c.text,
            bg = c.background,
            width = p.width,
            height = p.height,
        );

        for level in 0..6 {
            let _ = write!(
                css,
                "h{n} {{\n  font-family: {font};\n  font-size: {size}pt;\n  font-weight: bold;\n  \
                 color: {color};\n  margin-top: {before}pt;\n  margin-bottom: {after}pt;\n  \
                 line-height: 1.3;\n  page-break-after: avoid;\n}}\n",
                n = level + 1,
                font = t.heading_font,
                size = t.heading_pt[level],
                color = c.heading[level],
                before = s.heading_before[level],
                after = s.heading_after[level],
            );
        }

        let _ = write!(
            css,
            "p {{\n  margin-top: 0;\n  margin-bottom: {p_after}pt;\n  text-align: {align};\n  \
             white-space: pre-wrap;\n  overflow-wrap: anywhere;\n  orphans: 2;\n  widows: 2;\n}}\n\
             ul, ol {{\n  margin: {half}pt 0;\n  padding-left: {indent}pt;\n}}\n\
             li {{ margin-bottom: {li}pt; }}\n\
             code {{\n  font-family: {mono};\n  font-size: {code}pt;\n  background-color: {code_bg};\n  \
             padding: 1pt 3pt;\n  border: 1pt solid {border};\n  border-radius: 2pt;\n  \
             overflow-wrap: anywhere;\n}}\n\
             pre {{\n  font-family: {mono};\n  font-size: {code_block}pt;\n  background-color: {pre_bg};\n  \
             border: 1pt solid {border};\n  border-radius: 3pt;\n  padding: {pre_pad}pt;\n  \
             margin: {block}pt 0;\n  overflow-x: auto;\n  white-space: pre;\n  line-height: 1.4;\n  \
             page-break-inside: avoid;\n}}\n\
             pre code {{\n  background: none;\n  border: none;\n  padding: 0;\n  font-size: inherit;\n  \
             overflow-wrap: normal;\n}}\n\
             .table-wrap {{ overflow-x: auto; margin: {block}pt 0; }}\n\
             table {{\n  border-collapse: collapse;\n  width: 100%;\n  font-size: {table}pt;\n  \
             page-break-inside: avoid;\n}}\n\
             th, td {{\n  border: 1pt solid {border};\n  padding: {cell_v}pt {cell_h}pt;\n  \
             text-align: left;\n  vertical-align: top;\n}}\n\
             th {{\n  background-color: {th_bg};\n  font-weight: bold;\n}}\n\
             a {{\n  color: {link};\n  text-decoration: underline;\n  overflow-wrap: anywhere;\n}}\n\
             blockquote {{\n  margin: {block}pt 0;\n  padding: {half}pt {block}pt;\n  \
             border-left: 3pt solid {quote_border};\n  background-color: {quote_bg};\n  \
             font-style: italic;\n}}\n\
             .image-wrap {{ display: block; overflow: hidden; }}\n\
             img {{\n  max-width: 100%;\n  height: auto;\n  margin: {half}pt 0;\n}}\n\
             hr {{\n  border: none;\n  border-top: 1pt solid {border};\n  margin: {hr}pt 0;\n}}\n\
             @media print {{\n  .page {{ box-shadow: none; page-break-after: always; }}\n}}\n",
            p_after = s.paragraph_after,
            align = if t.justify { "justify" } else { "left" },
            half = s.block_margin / 2.0,
            indent = s.list_indent,
            li = s.paragraph_after / 2.0,
            mono = t.mono_font,
            code = t.code_pt,
            code_bg = c.code_background,
            border = c.border,
            code_block = t.code_block_pt,
            pre_bg = c.code_block_background,
            pre_pad = s.code_block_padding,
            block = s.block_margin,
            table = t.table_pt,
            cell_v = s.cell_padding_v,
            cell_h = s.cell_padding_h,
            th_bg = c.table_header_background,
            link = c.link,
            quote_border = c.quote_border,
            quote_bg = c.quote_background,
            hr = s.block_margin * 1.5,
        );

        css
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_id() {
        for id in StylePresetId::ALL {
            assert_eq!(id.preset().id, id);
        }
    }

    #[test]
    fn parse_round_trips() {
        for id in StylePresetId::ALL {
            assert_eq!(id.as_str().parse::<StylePresetId>().unwrap(), id);
        }
        assert_eq!(" Modern ".parse::<StylePresetId>().unwrap(), StylePresetId::Modern);
        let err = "fancy".parse::<StylePresetId>().unwrap_err();
        assert!(err.contains("classic"), "got: {err}");
    }

    #[test]
    fn classic_css_carries_page_geometry_and_palette() {
        let css = StylePresetId::Classic.preset().to_css();
        assert!(css.contains("size: A4;"));
        assert!(css.contains("margin: 2.54cm;"));
        assert!(css.contains("font-size: 18pt;"));
        assert!(css.contains("color: #1f4e79;"));
        assert!(css.contains("font-size: 11pt;"));
    }

    #[test]
    fn css_is_deterministic() {
        for id in StylePresetId::ALL {
            assert_eq!(id.preset().to_css(), id.preset().to_css());
        }
    }

    #[test]
    fn presets_produce_distinct_css() {
        let sheets: Vec<String> = StylePresetId::ALL
            .iter()
            .map(|id| id.preset().to_css())
            .collect();
        for i in 0..sheets.len() {
            for j in i + 1..sheets.len() {
                assert_ne!(sheets[i], sheets[j]);
            }
        }
    }

    #[test]
    fn fractional_sizes_format_cleanly() {
        let css = StylePresetId::Modern.preset().to_css();
        assert!(css.contains("font-size: 10.5pt;"), "body size missing");
    }

    #[test]
    fn serde_uses_kebab_case_ids() {
        let json = serde_json::to_string(&StylePresetId::Academic).unwrap();
        assert_eq!(json, "\"academic\"");
    }
}
