// Minimal WordprocessingML package: one indented paragraph per message.

use crate::markup::{Run, RunStyle};
use crate::stitch::{Emission, Sink};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const TWIPS_PER_MM: f64 = 1440.0 / 25.4;
const MARGIN_MM: f64 = 5.0;
pub const DEFAULT_INDENT_MM: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParagraphStyle {
    Title,
    Message,
}

#[derive(Debug, Clone)]
struct Paragraph {
    style: ParagraphStyle,
    indent: u32,
    runs: Vec<Run>,
}

fn mm_to_twips(mm: f64) -> u32 {
    (mm * TWIPS_PER_MM).round().max(0.0) as u32
}

fn xml_escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Collects messages in arrival order and writes them as a .docx.
pub struct DocumentBuilder {
    indent_twips: u32,
    paragraphs: Vec<Paragraph>,
    messages: usize,
}

impl DocumentBuilder {
    pub fn new(indent_mm: f64) -> Self {
        Self {
            indent_twips: mm_to_twips(indent_mm),
            paragraphs: Vec::new(),
            messages: 0,
        }
    }

    /// Thread title, linked to the post when `url` is known.
    pub fn title(&mut self, title: &str, url: &str) {
        let run = if url.is_empty() {
            Run::plain(title)
        } else {
            Run::Link {
                text: title.to_string(),
                href: url.to_string(),
            }
        };
        self.paragraphs.push(Paragraph {
            style: ParagraphStyle::Title,
            indent: 0,
            runs: vec![run],
        });
    }

    pub fn message_count(&self) -> usize {
        self.messages
    }

    fn hrefs(&self) -> BTreeMap<String, String> {
        let hrefs: BTreeSet<&str> = self
            .paragraphs
            .iter()
            .flat_map(|p| p.runs.iter())
            .filter_map(|r| match r {
                Run::Link { href, .. } => Some(href.as_str()),
                Run::Text { .. } => None,
            })
            .collect();
        hrefs
            .into_iter()
            .enumerate()
            .map(|(i, href)| (href.to_string(), format!("rId{}", i + 10)))
            .collect()
    }

    pub fn document_xml(&self) -> String {
        document_xml(&self.paragraphs, &self.hrefs())
    }

    pub fn write_to<W: Write + Seek>(&self, out: W) -> Result<()> {
        let link_to_rid = self.hrefs();
        let mut zip = ZipWriter::new(out);
        let opts = SimpleFileOptions::default();

        zip.start_file("[Content_Types].xml", opts)?;
        zip.write_all(content_types_xml().as_bytes())?;

        zip.start_file("_rels/.rels", opts)?;
        zip.write_all(rels_xml().as_bytes())?;

        zip.start_file("word/document.xml", opts)?;
        zip.write_all(document_xml(&self.paragraphs, &link_to_rid).as_bytes())?;

        zip.start_file("word/styles.xml", opts)?;
        zip.write_all(styles_xml().as_bytes())?;

        zip.start_file("word/_rels/document.xml.rels", opts)?;
        zip.write_all(document_rels_xml(&link_to_rid).as_bytes())?;

        zip.finish()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        self.write_to(f)
            .with_context(|| format!("write {}", path.display()))
    }
}

impl Sink for DocumentBuilder {
    fn accept(&mut self, emission: Emission) {
        // the original post sits at the same indentation as top-level replies
        let level = u32::try_from(emission.depth).unwrap_or(0);
        let mut runs = Vec::with_capacity(emission.runs.len() + 1);
        runs.push(Run::Text {
            text: emission.author,
            style: RunStyle {
                bold: true,
                ..RunStyle::default()
            },
        });
        runs.extend(emission.runs);
        self.paragraphs.push(Paragraph {
            style: ParagraphStyle::Message,
            indent: self.indent_twips.saturating_mul(level),
            runs,
        });
        self.messages += 1;
    }
}

fn text_xml(text: &str) -> String {
    let mut out = String::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<w:br/>");
        }
        if !line.is_empty() {
            out.push_str("<w:t xml:space=\"preserve\">");
            out.push_str(&xml_escape_text(line));
            out.push_str("</w:t>");
        }
    }
    out
}

fn run_xml(text: &str, style: RunStyle) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    out.push_str("<w:r>");
    if style != RunStyle::default() {
        out.push_str("<w:rPr>");
        if style.bold {
            out.push_str("<w:b/>");
        }
        if style.italic {
            out.push_str("<w:i/>");
        }
        if style.strike {
            out.push_str("<w:strike/>");
        }
        if style.superscript {
            out.push_str("<w:vertAlign w:val=\"superscript\"/>");
        }
        out.push_str("</w:rPr>");
    }
    out.push_str(&text_xml(text));
    out.push_str("</w:r>");
    out
}

fn hyperlink_xml(text: &str, href: &str, link_to_rid: &BTreeMap<String, String>) -> String {
    if text.is_empty() {
        return String::new();
    }
    let Some(rid) = link_to_rid.get(href) else {
        return run_xml(text, RunStyle::default());
    };
    format!(
        "<w:hyperlink r:id=\"{rid}\" w:history=\"1\"><w:r><w:rPr><w:rStyle w:val=\"Hyperlink\"/></w:rPr>{}</w:r></w:hyperlink>",
        text_xml(text)
    )
}

fn paragraph_xml(p: &Paragraph, link_to_rid: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    out.push_str("<w:p><w:pPr>");
    match p.style {
        ParagraphStyle::Title => out.push_str("<w:pStyle w:val=\"Title\"/>"),
        ParagraphStyle::Message => {
            if p.indent > 0 {
                out.push_str(&format!("<w:ind w:left=\"{}\"/>", p.indent));
            }
            out.push_str("<w:jc w:val=\"both\"/>");
        }
    }
    out.push_str("</w:pPr>");

    for run in &p.runs {
        match run {
            Run::Text { text, style } => out.push_str(&run_xml(text, *style)),
            Run::Link { text, href } => out.push_str(&hyperlink_xml(text, href, link_to_rid)),
        }
    }

    out.push_str("</w:p>");
    out
}

fn document_xml(paragraphs: &[Paragraph], link_to_rid: &BTreeMap<String, String>) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| paragraph_xml(p, link_to_rid))
        .collect();
    let margin = mm_to_twips(MARGIN_MM);

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"
 xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    {body}
    <w:sectPr>
      <w:pgSz w:w="15840" w:h="12240" w:orient="landscape"/>
      <w:pgMar w:top="{margin}" w:right="{margin}" w:bottom="{margin}" w:left="{margin}" w:header="708" w:footer="708" w:gutter="0"/>
      <w:cols w:space="708"/>
      <w:docGrid w:linePitch="360"/>
    </w:sectPr>
  </w:body>
</w:document>"#
    )
}

fn content_types_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#
}

fn rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#
}

fn document_rels_xml(link_to_rid: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    out.push('\n');
    out.push_str(r#"  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#);
    out.push('\n');
    for (href, rid) in link_to_rid {
        out.push_str(&format!(
            r#"  <Relationship Id="{rid}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="{href}" TargetMode="External"/>"#,
            href = xml_escape_text(href),
        ));
        out.push('\n');
    }
    out.push_str("</Relationships>");
    out
}

fn styles_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
    <w:name w:val="Normal"/>
    <w:qFormat/>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Title">
    <w:name w:val="Title"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:uiPriority w:val="10"/>
    <w:qFormat/>
    <w:pPr>
      <w:spacing w:after="240"/>
    </w:pPr>
    <w:rPr>
      <w:sz w:val="48"/>
    </w:rPr>
  </w:style>
  <w:style w:type="character" w:styleId="Hyperlink">
    <w:name w:val="Hyperlink"/>
    <w:uiPriority w:val="99"/>
    <w:rPr>
      <w:color w:val="0563C1"/>
      <w:u w:val="single"/>
    </w:rPr>
  </w:style>
</w:styles>"#
}
