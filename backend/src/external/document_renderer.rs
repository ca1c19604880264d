//! Document renderer for stage handovers and order reports
//!
//! Documents are stored under `<base>/<order>/<stage>/` with timestamped,
//! never-reused file names. Content is written to a temporary file and renamed
//! into place, so a failed render never leaves a truncated document behind.

use std::io::{BufWriter, ErrorKind};
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use shared::{slugify, RenderMeta, StoredFile};

use crate::error::{AppError, AppResult};

/// Renders synthesized HTML into stored document files
#[axum::async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Store an Excel-compatible workbook of `html`
    async fn render_spreadsheet(&self, meta: &RenderMeta, html: &str) -> AppResult<StoredFile>;

    /// Store a PDF rendition of `html`
    async fn render_pdf(&self, meta: &RenderMeta, html: &str) -> AppResult<StoredFile>;

    /// Render a PDF without storing it
    async fn pdf_bytes(&self, title: &str, html: &str) -> AppResult<Vec<u8>>;

    /// Remove a stored document; a missing file is not an error
    async fn remove_file(&self, relative_path: &str) -> AppResult<()>;
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;

const EXCEL_HTML_OPEN: &str = "<html xmlns:o=\"urn:schemas-microsoft-com:office:office\" \
xmlns:x=\"urn:schemas-microsoft-com:office:excel\" xmlns=\"http://www.w3.org/TR/REC-html40\">";

/// Renderer writing to the local filesystem
#[derive(Clone, Debug)]
pub struct LocalDocumentRenderer {
    base_path: PathBuf,
}

impl LocalDocumentRenderer {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Write `content` under a fresh name in the document's folder
    async fn store(
        &self,
        meta: &RenderMeta,
        extension: &str,
        content: Vec<u8>,
    ) -> AppResult<StoredFile> {
        let order_slug = slugify(&meta.order_number);
        let stage_slug = slugify(&meta.stage_key);
        let dir = self.base_path.join(&order_slug).join(&stage_slug);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Storage(format!("Cannot create {}: {}", dir.display(), e)))?;

        let stem = format!(
            "{}_{}_{}",
            order_slug,
            stage_slug,
            Utc::now().format("%Y%m%d_%H%M%S_%3f")
        );
        let file_name = reserve_name(&dir, &stem, extension).await?;
        let final_path = dir.join(&file_name);
        let temp_path = dir.join(format!(".{}.tmp", file_name));

        let written = match tokio::fs::write(&temp_path, &content).await {
            Ok(()) => tokio::fs::rename(&temp_path, &final_path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp_path).await;
            let _ = tokio::fs::remove_file(&final_path).await;
            return Err(AppError::Storage(format!("Cannot write {}: {}", file_name, e)));
        }

        tracing::debug!(file = %file_name, bytes = content.len(), "Stored document");

        Ok(StoredFile {
            relative_path: format!("{}/{}/{}", order_slug, stage_slug, file_name),
            file_name,
        })
    }
}

/// Claim an unused file name, appending `_1`, `_2`, ... when taken
async fn reserve_name(dir: &Path, stem: &str, extension: &str) -> AppResult<String> {
    for attempt in 0..1000u32 {
        let name = if attempt == 0 {
            format!("{}.{}", stem, extension)
        } else {
            format!("{}_{}.{}", stem, attempt, extension)
        };

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&name))
            .await
        {
            Ok(_) => return Ok(name),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(AppError::Storage(format!("Cannot reserve {}: {}", name, e))),
        }
    }

    Err(AppError::Storage(format!("No free file name for {}", stem)))
}

#[axum::async_trait]
impl DocumentRenderer for LocalDocumentRenderer {
    async fn render_spreadsheet(&self, meta: &RenderMeta, html: &str) -> AppResult<StoredFile> {
        let workbook = html.replacen("<html>", EXCEL_HTML_OPEN, 1);
        self.store(meta, "xls", workbook.into_bytes()).await
    }

    async fn render_pdf(&self, meta: &RenderMeta, html: &str) -> AppResult<StoredFile> {
        let title = format!("{} {}", meta.order_number, meta.stage_key);
        let bytes = self.pdf_bytes(&title, html).await?;
        self.store(meta, "pdf", bytes).await
    }

    async fn pdf_bytes(&self, title: &str, html: &str) -> AppResult<Vec<u8>> {
        let title = title.to_string();
        let lines = html_to_lines(html);

        tokio::task::spawn_blocking(move || layout_pdf(&title, &lines))
            .await
            .map_err(|e| AppError::Internal(format!("PDF task failed: {}", e)))?
    }

    async fn remove_file(&self, relative_path: &str) -> AppResult<()> {
        let relative = Path::new(relative_path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::Storage(format!(
                "Refusing to remove {}",
                relative_path
            )));
        }

        match tokio::fs::remove_file(self.base_path.join(relative)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "Cannot remove {}: {}",
                relative_path, e
            ))),
        }
    }
}

/// A line of text laid out in the PDF
#[derive(Debug, Clone, PartialEq)]
struct PdfLine {
    text: String,
    heading: bool,
}

/// Flatten HTML into text lines: block elements start a new line and table
/// cells are joined with ` | `
fn html_to_lines(html: &str) -> Vec<PdfLine> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut heading = false;
    let mut hidden = 0usize;
    let mut chars = html.chars();

    while let Some(c) = chars.next() {
        match c {
            '<' => {
                let mut tag = String::new();
                for t in chars.by_ref() {
                    if t == '>' {
                        break;
                    }
                    tag.push(t);
                }
                let tag = tag.trim().to_ascii_lowercase();
                let closing = tag.starts_with('/');
                let name: String = tag
                    .trim_start_matches('/')
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric())
                    .collect();

                match name.as_str() {
                    "head" | "style" | "script" => {
                        if closing {
                            hidden = hidden.saturating_sub(1);
                        } else {
                            hidden += 1;
                        }
                    }
                    "h1" | "h2" | "h3" => {
                        flush_line(&mut lines, &mut current, heading);
                        heading = !closing;
                    }
                    "p" | "div" | "tr" | "br" | "table" | "li" => {
                        flush_line(&mut lines, &mut current, heading);
                    }
                    "td" | "th" if closing => current.push_str(" | "),
                    _ => {}
                }
            }
            _ if hidden > 0 => {}
            '&' => {
                let mut entity = String::new();
                let mut terminated = false;
                for e in chars.by_ref() {
                    if e == ';' {
                        terminated = true;
                        break;
                    }
                    entity.push(e);
                    if entity.len() > 8 {
                        break;
                    }
                }
                match (terminated, entity.as_str()) {
                    (true, "amp") => current.push('&'),
                    (true, "lt") => current.push('<'),
                    (true, "gt") => current.push('>'),
                    (true, "quot") => current.push('"'),
                    (true, "#39") => current.push('\''),
                    (true, "mdash") | (true, "ndash") => current.push('-'),
                    (true, "nbsp") => current.push(' '),
                    _ => {
                        current.push('&');
                        current.push_str(&entity);
                        if terminated {
                            current.push(';');
                        }
                    }
                }
            }
            c if c.is_whitespace() => {
                if !current.is_empty() && !current.ends_with(' ') {
                    current.push(' ');
                }
            }
            c => current.push(c),
        }
    }

    flush_line(&mut lines, &mut current, heading);
    lines
}

fn flush_line(lines: &mut Vec<PdfLine>, current: &mut String, heading: bool) {
    let text = current.trim().trim_end_matches('|').trim();
    if !text.is_empty() {
        lines.push(PdfLine {
            text: text.to_string(),
            heading,
        });
    }
    current.clear();
}

/// Split `text` into chunks of at most `width` characters on word boundaries
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !line.is_empty() {
                out.push(std::mem::take(&mut line));
            }
            out.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();

        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
            out.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&word);
    }

    if !line.is_empty() {
        out.push(line);
    }
    out
}

/// Built-in PDF fonts only cover Latin-1
fn pdf_safe(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c } else { '?' })
        .collect()
}

fn layout_pdf(title: &str, lines: &[PdfLine]) -> AppResult<Vec<u8>> {
    let pdf_err = |e: printpdf::Error| AppError::Storage(format!("PDF rendering failed: {}", e));

    let (doc, page, layer) =
        PdfDocument::new(pdf_safe(title), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;

    let mut current_layer = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        let (size, height, width, font): (f32, f32, usize, &IndirectFontRef) = if line.heading {
            (13.0, 8.0, 70, &bold)
        } else {
            (9.0, 4.5, 110, &regular)
        };

        for chunk in wrap(&pdf_safe(&line.text), width) {
            if y - height < MARGIN {
                let (next_page, next_layer) =
                    doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
                current_layer = doc.get_page(next_page).get_layer(next_layer);
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= height;
            current_layer.use_text(chunk, size, Mm(MARGIN), Mm(y), font);
        }
    }

    let mut buffer = BufWriter::new(Vec::new());
    doc.save(&mut buffer).map_err(pdf_err)?;
    buffer
        .into_inner()
        .map_err(|e| AppError::Storage(format!("PDF buffer error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_renderer() -> (LocalDocumentRenderer, PathBuf) {
        let base = std::env::temp_dir().join(format!("mow-docs-{}", uuid::Uuid::new_v4()));
        (LocalDocumentRenderer::new(&base), base)
    }

    fn meta() -> RenderMeta {
        RenderMeta {
            order_number: "MO-2024/0042".to_string(),
            stage_key: "quality".to_string(),
        }
    }

    #[test]
    fn test_html_to_lines() {
        let html = "<html><head><title>x</title><style>td{}</style></head><body>\
            <h1>MO-1 &mdash; Quality</h1><p>A &amp; B</p>\
            <table><tr><th>Name</th><th>Qty</th></tr><tr><td>Sugar</td><td>2</td></tr></table>\
            </body></html>";
        let lines = html_to_lines(html);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["MO-1 - Quality", "A & B", "Name | Qty", "Sugar | 2"]);
        assert!(lines[0].heading);
        assert!(!lines[1].heading);
    }

    #[test]
    fn test_wrap_long_text() {
        let chunks = wrap("aaaa bbbb cccc", 9);
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc"]);

        let chunks = wrap("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[tokio::test]
    async fn test_repeated_renders_get_distinct_names() {
        let (renderer, base) = temp_renderer();
        let first = renderer
            .render_spreadsheet(&meta(), "<html><body>one</body></html>")
            .await
            .unwrap();
        let second = renderer
            .render_spreadsheet(&meta(), "<html><body>two</body></html>")
            .await
            .unwrap();

        assert_ne!(first.file_name, second.file_name);
        assert!(first.relative_path.starts_with("mo-2024-0042/quality/"));
        assert!(first.file_name.starts_with("mo-2024-0042_quality_"));
        assert!(first.file_name.ends_with(".xls"));

        let stored = std::fs::read_to_string(base.join(&first.relative_path)).unwrap();
        assert!(stored.contains("urn:schemas-microsoft-com:office:excel"));
        assert!(stored.contains("one"));

        let _ = std::fs::remove_dir_all(base);
    }

    #[tokio::test]
    async fn test_pdf_render_and_remove() {
        let (renderer, base) = temp_renderer();
        let stored = renderer
            .render_pdf(&meta(), "<html><body><h1>Report</h1><p>Batch released</p></body></html>")
            .await
            .unwrap();

        let path = base.join(&stored.relative_path);
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        renderer.remove_file(&stored.relative_path).await.unwrap();
        assert!(!path.exists());
        // Removing twice is fine
        renderer.remove_file(&stored.relative_path).await.unwrap();
        assert!(renderer.remove_file("../outside.pdf").await.is_err());

        let _ = std::fs::remove_dir_all(base);
    }

    #[tokio::test]
    async fn test_pdf_paginates_long_documents() {
        let (renderer, _base) = temp_renderer();
        let body: String = (0..200).map(|i| format!("<p>Line {}</p>", i)).collect();
        let bytes = renderer
            .pdf_bytes("Long", &format!("<html><body>{}</body></html>", body))
            .await
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
