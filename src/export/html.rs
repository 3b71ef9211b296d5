// src/export/html.rs
use std::fmt::Write as _;

use html_escape::encode_text;

use crate::export::document::{
    Block, Document, DocumentRenderer, TextStyle, BODY_STYLE, HEADER_GAP_PT, HEADING1_STYLE,
    HEADING2_STYLE, LETTER, SPACER_PT, TITLE_STYLE,
};

fn stylesheet() -> String {
    let page = LETTER;
    let rule = |sel: &str, st: &TextStyle, extra: &str| {
        format!(
            "{sel} {{ font-size: {}pt; color: {};{extra} margin: 0 0 {}pt 0; }}\n",
            st.size,
            st.css_color(),
            st.space_after
        )
    };
    let mut css = format!(
        "@page {{ size: letter; margin: {}pt {}pt {}pt {}pt; }}\n\
         body {{ font-family: Helvetica, Arial, sans-serif; line-height: 1.2; }}\n",
        page.margin_top, page.margin_right, page.margin_bottom, page.margin_left
    );
    css.push_str(&rule("h1.title", &TITLE_STYLE, " text-align: center;"));
    css.push_str(&rule("h1", &HEADING1_STYLE, ""));
    css.push_str(&rule("h2", &HEADING2_STYLE, ""));
    css.push_str(&rule("p", &BODY_STYLE, " text-align: justify;"));
    css.push_str(&format!("div.spacer {{ height: {SPACER_PT}pt; }}\n"));
    css.push_str(&format!("div.generated {{ height: {HEADER_GAP_PT}pt; }}\n"));
    css
}

/// Standalone HTML with print CSS for a letter page. Alternative to the
/// PDF renderer when a browser does the printing.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

impl DocumentRenderer for HtmlRenderer {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, doc: &Document) -> anyhow::Result<Vec<u8>> {
        let title = encode_text(&doc.title);
        let mut out = String::with_capacity(4096);
        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">")?;
        writeln!(out, "<title>{title}</title>\n<style>\n{}</style>\n</head>\n<body>", stylesheet())?;
        writeln!(out, "<h1 class=\"title\">{title}</h1>")?;
        writeln!(out, "<p>{}</p>", encode_text(&doc.generated_on))?;
        writeln!(out, "<div class=\"generated\"></div>")?;
        for block in &doc.blocks {
            match block {
                Block::Heading1(t) => writeln!(out, "<h1>{}</h1>", encode_text(t))?,
                Block::Heading2(t) => writeln!(out, "<h2>{}</h2>", encode_text(t))?,
                Block::Spacer => writeln!(out, "<div class=\"spacer\"></div>")?,
                Block::Paragraph(t) => writeln!(out, "<p>{}</p>", encode_text(t))?,
            }
        }
        writeln!(out, "</body>\n</html>")?;
        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_escaped() {
        let doc = Document {
            title: "T".into(),
            generated_on: "Generated on 2024-01-01 00:00:00 UTC".into(),
            blocks: vec![
                Block::Heading2("Risks & <Rewards>".into()),
                Block::Paragraph("a < b".into()),
            ],
        };
        let html = String::from_utf8(HtmlRenderer.render(&doc).unwrap()).unwrap();
        assert!(html.contains("<h2>Risks &amp; &lt;Rewards&gt;</h2>"));
        assert!(html.contains("<p>a &lt; b</p>"));
        assert!(html.contains("size: letter; margin: 72pt 72pt 18pt 72pt;"));
        assert!(html.contains("h2 { font-size: 16pt; color: #555555; margin: 0 0 6pt 0; }"));
    }
}
