//! Composition of the message that carries a finished report.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::images::split_data_uri;
use crate::labels;
use crate::record::{Photo, ReportRecord};

const PDF_CONTENT_TYPE: &str = "application/pdf";
const DEFAULT_PHOTO_TYPE: (&str, &str) = ("image/jpeg", "jpg");

/// Known photo MIME types and the file extension used for them.
const PHOTO_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/bmp", "bmp"),
];

/// Addressing and body text chosen by the sender.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryRequest {
    /// Primary recipients, comma separated.
    pub to: String,
    pub cc: Option<String>,
    /// HTML body of the message.
    pub message: String,
}

/// A file attached to an outgoing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// An outgoing message carrying a report PDF and its photos.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportEmail {
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub html_body: String,
    /// The PDF first, then one attachment per photo in record order.
    pub attachments: Vec<Attachment>,
}

impl ReportEmail {
    /// Builds the message for `record` with the rendered `pdf`.
    pub fn compose(record: &ReportRecord, request: &DeliveryRequest, pdf: &[u8]) -> Self {
        let number = record.number_label();

        let mut attachments = Vec::with_capacity(record.photos.len() + 1);
        attachments.push(Attachment {
            filename: format!("{}{}.pdf", labels::PDF_ATTACHMENT_PREFIX, number),
            content_type: PDF_CONTENT_TYPE.to_string(),
            content: pdf.to_vec(),
        });
        attachments.extend(
            record
                .photos
                .iter()
                .enumerate()
                .map(|(index, photo)| photo_attachment(index, photo)),
        );

        Self {
            to: request.to.trim().to_string(),
            cc: request
                .cc
                .as_deref()
                .map(str::trim)
                .filter(|cc| !cc.is_empty())
                .map(str::to_string),
            subject: format!("{} {}", labels::EMAIL_SUBJECT_PREFIX, number),
            html_body: request.message.clone(),
            attachments,
        }
    }

    /// The attachment holding the report PDF.
    pub fn pdf(&self) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|attachment| attachment.content_type == PDF_CONTENT_TYPE)
    }
}

fn photo_type(mime: Option<&str>) -> (&'static str, &'static str) {
    mime.and_then(|mime| {
        PHOTO_TYPES
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(mime))
            .copied()
    })
    .unwrap_or(DEFAULT_PHOTO_TYPE)
}

fn photo_attachment(index: usize, photo: &Photo) -> Attachment {
    let (mime, payload) = split_data_uri(&photo.url).unwrap_or((None, photo.url.as_str()));
    let (content_type, extension) = photo_type(mime);

    let content = match STANDARD.decode(payload.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(
                "Photo {} ({}) is not valid base64 ({}); attaching the raw payload",
                index + 1,
                photo.id,
                err
            );
            payload.as_bytes().to_vec()
        }
    };

    Attachment {
        filename: format!("{}{}.{}", labels::PHOTO_ATTACHMENT_PREFIX, index + 1, extension),
        content_type: content_type.to_string(),
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_photos(urls: &[&str]) -> ReportRecord {
        ReportRecord {
            report_number: 7,
            photos: urls.iter().map(|url| Photo::new(*url, "")).collect(),
            ..ReportRecord::default()
        }
    }

    #[test]
    fn subject_and_pdf_name_use_padded_number() {
        let email = ReportEmail::compose(
            &record_with_photos(&[]),
            &DeliveryRequest {
                to: " cliente@example.com ".into(),
                cc: Some("  ".into()),
                message: "<p>Adjunto</p>".into(),
            },
            b"%PDF-1.5",
        );

        assert_eq!(email.subject, "Reporte Técnico N° 0007");
        assert_eq!(email.to, "cliente@example.com");
        assert_eq!(email.cc, None);
        assert_eq!(email.html_body, "<p>Adjunto</p>");
        assert_eq!(email.attachments.len(), 1);
        let pdf = email.pdf().expect("pdf attached");
        assert_eq!(pdf.filename, "Reporte_Tecnico_0007.pdf");
        assert_eq!(pdf.content, b"%PDF-1.5");
    }

    #[test]
    fn photos_are_numbered_with_their_type() {
        let record = record_with_photos(&[
            "data:image/jpeg;base64,QUJD",
            "data:image/png;base64,REVG",
            "R0hJ",
        ]);
        let email = ReportEmail::compose(&record, &DeliveryRequest::default(), b"pdf");

        let names: Vec<&str> = email
            .attachments
            .iter()
            .map(|attachment| attachment.filename.as_str())
            .collect();
        assert_eq!(
            names,
            ["Reporte_Tecnico_0007.pdf", "Foto_1.jpg", "Foto_2.png", "Foto_3.jpg"]
        );
        assert_eq!(email.attachments[1].content, b"ABC");
        assert_eq!(email.attachments[2].content_type, "image/png");
        assert_eq!(email.attachments[3].content_type, "image/jpeg");
        assert_eq!(email.attachments[3].content, b"GHI");
    }

    #[test]
    fn undecodable_photo_is_still_attached() {
        let record = record_with_photos(&["data:image/jpeg;base64,@@not base64@@"]);
        let email = ReportEmail::compose(&record, &DeliveryRequest::default(), b"pdf");

        assert_eq!(email.attachments.len(), 2);
        assert_eq!(email.attachments[1].filename, "Foto_1.jpg");
        assert_eq!(email.attachments[1].content, b"@@not base64@@");
    }
}
