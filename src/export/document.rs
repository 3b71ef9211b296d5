// src/export/document.rs
//! Line-oriented markdown subset used for document export.
//!
//! Grammar: `# ` heading1, `## ` heading2, whitespace-only line spacer,
//! anything else a paragraph. Lists, tables, code and emphasis are not
//! recognized and pass through as paragraph text.
//!
//! Page and text styles shared by the renderers live here too.

use chrono::{DateTime, Utc};

use crate::report::Report;

pub const DOCUMENT_TITLE: &str = "Cryptocurrency Market Report";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading1(String),
    Heading2(String),
    Spacer,
    Paragraph(String),
}

/// Kind of the last block emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    Heading1,
    Heading2,
    Spacer,
    Paragraph,
}

/// Line classifier. Starts in `Spacer` because the document header already
/// ends with a gap, so leading blank lines emit nothing; a run of blank
/// lines yields a single spacer.
struct LineClassifier {
    state: LineState,
}

impl LineClassifier {
    fn new() -> Self {
        Self {
            state: LineState::Spacer,
        }
    }

    fn step(&mut self, line: &str) -> Option<Block> {
        let (next, block) = if line.trim().is_empty() {
            if self.state == LineState::Spacer {
                return None;
            }
            (LineState::Spacer, Block::Spacer)
        } else if let Some(rest) = line.strip_prefix("## ") {
            (LineState::Heading2, Block::Heading2(rest.trim().to_string()))
        } else if let Some(rest) = line.strip_prefix("# ") {
            (LineState::Heading1, Block::Heading1(rest.trim().to_string()))
        } else {
            (LineState::Paragraph, Block::Paragraph(line.trim().to_string()))
        };
        self.state = next;
        Some(block)
    }
}

/// At most one block per input line.
pub fn parse_markdown(text: &str) -> Vec<Block> {
    let mut classifier = LineClassifier::new();
    text.lines().filter_map(|line| classifier.step(line)).collect()
}

/// Page geometry in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
}

impl PageSetup {
    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }
}

pub const LETTER: PageSetup = PageSetup {
    width: 612.0,
    height: 792.0,
    margin_top: 72.0,
    margin_right: 72.0,
    margin_bottom: 18.0,
    margin_left: 72.0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Font size in points.
    pub size: f32,
    /// `0xRRGGBB`.
    pub color: u32,
    pub space_after: f32,
    pub bold: bool,
}

impl TextStyle {
    pub fn css_color(&self) -> String {
        format!("#{:06x}", self.color)
    }

    /// Components in `0.0..=1.0`.
    pub fn rgb(&self) -> (f32, f32, f32) {
        let c = |shift: u32| ((self.color >> shift) & 0xff) as f32 / 255.0;
        (c(16), c(8), c(0))
    }
}

pub const TITLE_STYLE: TextStyle = TextStyle {
    size: 24.0,
    color: 0x333333,
    space_after: 12.0,
    bold: true,
};
pub const HEADING1_STYLE: TextStyle = TextStyle {
    size: 18.0,
    color: 0x444444,
    space_after: 6.0,
    bold: true,
};
pub const HEADING2_STYLE: TextStyle = TextStyle {
    size: 16.0,
    color: 0x555555,
    space_after: 6.0,
    bold: true,
};
pub const BODY_STYLE: TextStyle = TextStyle {
    size: 12.0,
    color: 0x333333,
    space_after: 6.0,
    bold: false,
};

/// Height of a blank-line spacer.
pub const SPACER_PT: f32 = 6.0;
/// Gap between the "Generated on" line and the body.
pub const HEADER_GAP_PT: f32 = 12.0;

/// Renderer-independent document: fixed title, generation line, blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub generated_on: String,
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn from_report(report: &Report) -> Self {
        Self {
            title: DOCUMENT_TITLE.to_string(),
            generated_on: generated_on(report.generated_at),
            blocks: parse_markdown(&report.to_markdown()),
        }
    }
}

fn generated_on(at: DateTime<Utc>) -> String {
    format!("Generated on {} UTC", at.format("%Y-%m-%d %H:%M:%S"))
}

/// Turns a `Document` into file bytes.
pub trait DocumentRenderer: Send + Sync {
    /// File extension without the dot.
    fn extension(&self) -> &'static str;
    fn render(&self, doc: &Document) -> anyhow::Result<Vec<u8>>;
}
