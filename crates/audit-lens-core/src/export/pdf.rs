use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

use super::ExportDocument;

// A4 in points, Courier 10pt (6pt advance), 15mm left / 20mm top margins.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_LEFT: i64 = 42;
const MARGIN_TOP: i64 = 56;
const FONT_SIZE: i64 = 10;
const LEADING: i64 = 12;
const WRAP_COLUMNS: usize = 85;
const LINES_PER_PAGE: usize = 60;

/// Lay the export document out as a monospaced, auto-wrapped PDF.
pub fn render_pdf(document: &ExportDocument) -> Result<Vec<u8>> {
    let lines = wrap_text(document.as_str(), WRAP_COLUMNS);
    // wrap_text yields at least one line, so there is always a first page
    let chunks: Vec<&[String]> = lines.chunks(LINES_PER_PAGE).collect();

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Courier".to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![(
            "F1",
            Object::Reference(font_id),
        )])),
    )]));

    let mut page_ids = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let page_id = add_page(&mut doc, pages_id, resources_id, chunk)?;
        page_ids.push(page_id);
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(page_ids.len() as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .context("failed to serialize PDF export")?;
    debug!(
        pages = page_ids.len(),
        lines = lines.len(),
        bytes = buffer.len(),
        "rendered PDF export"
    );
    Ok(buffer)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    lines: &[String],
) -> Result<ObjectId> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), Object::Integer(FONT_SIZE)],
        ),
        Operation::new("TL", vec![Object::Integer(LEADING)]),
        Operation::new(
            "Td",
            vec![
                Object::Integer(MARGIN_LEFT),
                Object::Integer(PAGE_HEIGHT - MARGIN_TOP),
            ],
        ),
    ];
    for line in lines {
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_latin1(line), StringFormat::Literal)],
        ));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let encoded = content
        .encode()
        .context("failed to encode PDF page content")?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

    let page = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ]),
        ),
        ("Resources", Object::Reference(resources_id)),
        ("Contents", Object::Reference(content_id)),
    ]);
    Ok(doc.add_object(page))
}

/// Greedy word wrap; words longer than `columns` are split hard.
fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut out = Vec::new();
    for source_line in text.split('\n') {
        let source_line = source_line.strip_suffix('\r').unwrap_or(source_line);
        let mut current = String::new();
        let mut current_len = 0usize;
        for word in source_line.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > columns {
                if current_len > 0 {
                    out.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(columns);
                out.push(word.into_iter().collect());
                word = rest;
            }
            let needed = if current_len == 0 {
                word.len()
            } else {
                current_len + 1 + word.len()
            };
            if needed > columns {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current_len += word.len();
            current.extend(word);
        }
        out.push(current);
    }
    out
}

/// Map text onto the single-byte encoding of the standard Courier font.
///
/// C0 and C1 controls become `?`: under `WinAnsiEncoding` bytes 0x80..=0x9F
/// are printable glyphs, so passing them through would change the text.
fn encode_latin1(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| match c as u32 {
            0x09 => b' ',
            0x00..=0x1F | 0x7F..=0x9F => b'?',
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}
