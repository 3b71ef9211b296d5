// src/export/pdf.rs
//! Letter-size PDF rendering with the built-in Helvetica faces.
//!
//! Layout is a pure pass over the document that places wrapped lines on
//! pages; drawing then replays the placements through `printpdf`. Line
//! breaks use an average glyph width, and wrapped body lines are left
//! aligned.

use anyhow::{anyhow, Result};
use printpdf::{BuiltinFont, Color, Mm, PdfDocument, Rgb};

use crate::export::document::{
    Block, Document, DocumentRenderer, PageSetup, TextStyle, BODY_STYLE, HEADER_GAP_PT,
    HEADING1_STYLE, HEADING2_STYLE, LETTER, SPACER_PT, TITLE_STYLE,
};

/// Average Helvetica advance, as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.55;
const LEADING: f32 = 1.2;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    /// Zero-based page index.
    pub page: usize,
    /// Baseline origin in points from the bottom-left corner.
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

struct Cursor {
    page_setup: PageSetup,
    page: usize,
    /// Top of the next line, in points from the bottom.
    y: f32,
    lines: Vec<PlacedLine>,
}

impl Cursor {
    fn new(page_setup: PageSetup) -> Self {
        Self {
            page_setup,
            page: 0,
            y: page_setup.height - page_setup.margin_top,
            lines: Vec::new(),
        }
    }

    fn space(&mut self, pt: f32) {
        self.y -= pt;
    }

    fn text(&mut self, text: &str, style: TextStyle, align: Align) {
        let setup = self.page_setup;
        let width = setup.content_width();
        let line_height = style.size * LEADING;
        for line in wrap(text, max_chars(width, style.size)) {
            if self.y - line_height < setup.margin_bottom {
                self.page += 1;
                self.y = setup.height - setup.margin_top;
            }
            let x = match align {
                Align::Left => setup.margin_left,
                Align::Center => {
                    setup.margin_left + ((width - estimated_width(&line, style.size)) / 2.0).max(0.0)
                }
            };
            self.lines.push(PlacedLine {
                page: self.page,
                x,
                y: self.y - style.size,
                text: line,
                style,
            });
            self.y -= line_height;
        }
        self.y -= style.space_after;
    }
}

fn max_chars(width: f32, size: f32) -> usize {
    ((width / (size * AVG_GLYPH_EM)).floor() as usize).max(1)
}

fn estimated_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_EM
}

/// Greedy word wrap; words longer than a line are split.
pub fn wrap(text: &str, max: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > max {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = chars.split_off(max);
            lines.push(chars.into_iter().collect());
            chars = rest;
        }
        let len = chars.len();
        if len == 0 {
            continue;
        }
        if current_len > 0 && current_len + 1 + len > max {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(chars);
        current_len += len;
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Place every line of `doc` on `page_setup` pages.
pub fn layout(doc: &Document, page_setup: PageSetup) -> Vec<PlacedLine> {
    let mut cursor = Cursor::new(page_setup);
    cursor.text(&doc.title, TITLE_STYLE, Align::Center);
    cursor.text(&doc.generated_on, BODY_STYLE, Align::Left);
    cursor.space(HEADER_GAP_PT);
    for block in &doc.blocks {
        match block {
            Block::Heading1(t) => cursor.text(t, HEADING1_STYLE, Align::Left),
            Block::Heading2(t) => cursor.text(t, HEADING2_STYLE, Align::Left),
            Block::Spacer => cursor.space(SPACER_PT),
            Block::Paragraph(t) => cursor.text(t, BODY_STYLE, Align::Left),
        }
    }
    cursor.lines
}

fn mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

/// Default document renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, doc: &Document) -> Result<Vec<u8>> {
        let page_setup = LETTER;
        let placed = layout(doc, page_setup);
        let pages = placed.last().map_or(1, |l| l.page + 1);

        let (pdf, first_page, first_layer) = PdfDocument::new(
            doc.title.as_str(),
            mm(page_setup.width),
            mm(page_setup.height),
            "Layer 1",
        );
        let regular = pdf
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("loading Helvetica: {e:?}"))?;
        let bold = pdf
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("loading Helvetica-Bold: {e:?}"))?;

        let mut layers = vec![pdf.get_page(first_page).get_layer(first_layer)];
        for _ in 1..pages {
            let (page, layer) =
                pdf.add_page(mm(page_setup.width), mm(page_setup.height), "Layer 1");
            layers.push(pdf.get_page(page).get_layer(layer));
        }

        for line in placed {
            let layer = &layers[line.page];
            let (r, g, b) = line.style.rgb();
            layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
            let font = if line.style.bold { &bold } else { &regular };
            layer.use_text(line.text, line.style.size, mm(line.x), mm(line.y), font);
        }
        drop(layers);

        pdf.save_to_bytes()
            .map_err(|e| anyhow!("writing pdf: {e:?}"))
    }
}
