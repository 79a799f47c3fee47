//! Post-processing of rendered PDF bytes with `lopdf`.
//!
//! The renderer stamps every file with creation dates, a random document ID
//! and an XMP packet carrying random instance IDs. [`normalize`] strips those
//! entries so that identical records always produce identical bytes. With the
//! `bookmarks` feature it also adds a flat outline with one entry per section.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::layout::SectionAnchor;

const VOLATILE_INFO_KEYS: &[&[u8]] = &[b"CreationDate", b"ModDate", b"Identifier"];

/// Errors raised while rewriting rendered PDF bytes.
#[derive(Debug, thiserror::Error)]
pub enum PostprocessError {
    #[error("failed to parse rendered PDF: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("failed to write PDF: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF catalog entry is missing")]
    MissingCatalog,
    #[error("PDF catalog entry is not a dictionary")]
    InvalidCatalog,
    #[error("section {section} refers to missing page {page}")]
    MissingPage { section: String, page: usize },
}

/// Rewrites `pdf_bytes` without volatile metadata, adding the section outline
/// when the `bookmarks` feature is enabled.
pub fn normalize(pdf_bytes: &[u8], sections: &[SectionAnchor]) -> Result<Vec<u8>, PostprocessError> {
    let mut document = Document::load_mem(pdf_bytes)?;

    strip_volatile_metadata(&mut document)?;

    #[cfg(feature = "bookmarks")]
    apply_section_outline(&mut document, sections)?;
    #[cfg(not(feature = "bookmarks"))]
    let _ = sections;

    let mut buffer = Vec::new();
    document.save_to(&mut buffer)?;
    Ok(buffer)
}

fn catalog_id(document: &Document) -> Result<ObjectId, PostprocessError> {
    document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PostprocessError::MissingCatalog)
}

fn catalog_mut(document: &mut Document) -> Result<&mut Dictionary, PostprocessError> {
    let id = catalog_id(document)?;
    document
        .objects
        .get_mut(&id)
        .ok_or(PostprocessError::MissingCatalog)?
        .as_dict_mut()
        .map_err(|_| PostprocessError::InvalidCatalog)
}

fn strip_volatile_metadata(document: &mut Document) -> Result<(), PostprocessError> {
    document.trailer.remove(b"ID");

    if let Ok(info_id) = document.trailer.get(b"Info").and_then(Object::as_reference) {
        if let Some(Object::Dictionary(info)) = document.objects.get_mut(&info_id) {
            for key in VOLATILE_INFO_KEYS {
                info.remove(key);
            }
        }
    }

    if let Some(Object::Reference(metadata_id)) = catalog_mut(document)?.remove(b"Metadata") {
        document.objects.remove(&metadata_id);
    }

    Ok(())
}

/// Encodes `text` as a PDF text string (UTF-16BE with BOM when not ASCII).
#[cfg(any(feature = "bookmarks", test))]
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, lopdf::StringFormat::Hexadecimal)
}

#[cfg(feature = "bookmarks")]
fn apply_section_outline(
    document: &mut Document,
    sections: &[SectionAnchor],
) -> Result<(), PostprocessError> {
    if sections.is_empty() {
        return Ok(());
    }

    let pages = document.get_pages();
    let mut entries = Vec::with_capacity(sections.len());
    for anchor in sections {
        let page_number = anchor.page + 1;
        let page_ref = pages
            .get(&(page_number as u32))
            .copied()
            .ok_or_else(|| PostprocessError::MissingPage {
                section: anchor.kind.title().to_string(),
                page: page_number,
            })?;
        entries.push((document.new_object_id(), page_ref, anchor.kind.title()));
    }

    let outlines_id = document.new_object_id();
    for (index, (object_id, page_ref, title)) in entries.iter().enumerate() {
        let mut dictionary = Dictionary::new();
        dictionary.set("Title", text_string(title));
        dictionary.set(
            "Dest",
            Object::Array(vec![
                Object::Reference(*page_ref),
                Object::Name("Fit".into()),
            ]),
        );
        dictionary.set("Parent", Object::Reference(outlines_id));
        if index > 0 {
            dictionary.set("Prev", Object::Reference(entries[index - 1].0));
        }
        if let Some(next) = entries.get(index + 1) {
            dictionary.set("Next", Object::Reference(next.0));
        }
        document
            .objects
            .insert(*object_id, Object::Dictionary(dictionary));
    }

    let mut outlines = Dictionary::new();
    outlines.set("Type", Object::Name("Outlines".into()));
    outlines.set("Count", Object::Integer(entries.len() as i64));
    outlines.set("First", Object::Reference(entries[0].0));
    outlines.set("Last", Object::Reference(entries[entries.len() - 1].0));
    document
        .objects
        .insert(outlines_id, Object::Dictionary(outlines));

    catalog_mut(document)?.set("Outlines", Object::Reference(outlines_id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    /// A one-page PDF with the kinds of volatile entries printpdf writes.
    fn sample_pdf(stamp: &str) -> Vec<u8> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let content_id = document.add_object(Stream::new(dictionary! {}, b"".to_vec()));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let metadata_id = document.add_object(Stream::new(
            dictionary! { "Type" => "Metadata" },
            format!("<xmpMM:InstanceID>{}</xmpMM:InstanceID>", stamp).into_bytes(),
        ));
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "Metadata" => metadata_id,
        });
        let info_id = document.add_object(dictionary! {
            "Title" => Object::string_literal("Reporte"),
            "CreationDate" => Object::string_literal(stamp),
            "ModDate" => Object::string_literal(stamp),
        });
        document.trailer.set("Root", catalog_id);
        document.trailer.set("Info", info_id);
        document.trailer.set(
            "ID",
            Object::Array(vec![
                Object::string_literal(stamp),
                Object::string_literal(stamp),
            ]),
        );

        let mut bytes = Vec::new();
        document.save_to(&mut bytes).expect("save sample");
        bytes
    }

    #[test]
    fn normalized_output_ignores_timestamps() {
        let first = normalize(&sample_pdf("D:20260101000000"), &[]).expect("normalize");
        let second = normalize(&sample_pdf("D:20261019120000"), &[]).expect("normalize");
        assert_eq!(first, second);

        let document = Document::load_mem(&first).expect("reload");
        assert!(document.trailer.get(b"ID").is_err());
        let catalog = document
            .get_object(catalog_id(&document).unwrap())
            .and_then(Object::as_dict)
            .expect("catalog");
        assert!(catalog.get(b"Metadata").is_err());
    }

    #[test]
    fn text_strings_use_utf16_for_accents() {
        assert_eq!(text_string("Firmas"), Object::string_literal("Firmas"));
        match text_string("Información") {
            Object::String(bytes, lopdf::StringFormat::Hexadecimal) => {
                assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
                assert_eq!(bytes.len(), 2 + 2 * "Información".chars().count());
            }
            other => panic!("unexpected object {:?}", other),
        }
    }

    #[cfg(feature = "bookmarks")]
    #[test]
    fn outline_points_at_section_pages() {
        use crate::layout::SectionKind;

        let sections = [SectionAnchor {
            kind: SectionKind::Client,
            page: 0,
        }];
        let bytes = normalize(&sample_pdf("D:1"), &sections).expect("normalize");
        let document = Document::load_mem(&bytes).expect("reload");
        let catalog = document
            .get_object(catalog_id(&document).unwrap())
            .and_then(Object::as_dict)
            .expect("catalog");
        assert!(catalog.get(b"Outlines").is_ok());

        let missing = [SectionAnchor {
            kind: SectionKind::Photos,
            page: 4,
        }];
        let err = normalize(&sample_pdf("D:1"), &missing).unwrap_err();
        assert!(matches!(err, PostprocessError::MissingPage { page: 5, .. }));
    }
}
