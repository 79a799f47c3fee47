//! Strategies for the top-of-first-page identity region.
//!
//! The letterhead is either drawn from the record's company fields or taken
//! from a raster snapshot of the on-screen header. Everything below the
//! letterhead is laid out the same way for both strategies.

use log::warn;

use crate::images::{AssetKey, ImageSource, ReportAssets};
use crate::labels;
use crate::layout::{fit_within, PageWriter, TextMeasure, TextStyle};
use crate::record::ReportRecord;

const LOGO_BOX_WIDTH_MM: f64 = 40.0;
const LOGO_BOX_HEIGHT_MM: f64 = 20.0;
const CAPTURED_MAX_HEIGHT_MM: f64 = 60.0;
const RULE_SPACING_MM: f64 = 3.0;
const AFTER_RULE_MM: f64 = 6.0;

/// How the letterhead region is produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Letterhead {
    /// Title, report number, date and company identity drawn as text, with an
    /// optional custom logo in the top right corner.
    Drawn { logo: Option<ImageSource> },
    /// A captured raster of the on-screen header, scaled to the content width.
    Captured(ImageSource),
}

impl Default for Letterhead {
    fn default() -> Self {
        Self::Drawn { logo: None }
    }
}

impl Letterhead {
    /// Drawn letterhead with custom logo artwork.
    pub fn with_logo(logo: ImageSource) -> Self {
        Self::Drawn { logo: Some(logo) }
    }

    pub(crate) fn lay_out<M: TextMeasure + ?Sized>(
        &self,
        writer: &mut PageWriter,
        measure: &M,
        record: &ReportRecord,
        assets: &ReportAssets,
    ) {
        match self {
            Self::Captured(_) => match assets.dimensions(AssetKey::Header) {
                Some(dimensions) => lay_out_captured(writer, dimensions),
                None => {
                    warn!("Captured header unavailable; drawing the letterhead instead");
                    lay_out_drawn(writer, measure, record, None);
                }
            },
            Self::Drawn { .. } => {
                lay_out_drawn(writer, measure, record, assets.dimensions(AssetKey::Logo))
            }
        }

        writer.advance(RULE_SPACING_MM);
        writer.full_width_rule();
        writer.advance(AFTER_RULE_MM);
    }
}

fn lay_out_captured(writer: &mut PageWriter, dimensions: (u32, u32)) {
    let geometry = *writer.geometry();
    let (width, height) = fit_within(
        dimensions,
        geometry.content_width(),
        CAPTURED_MAX_HEIGHT_MM,
    );
    let x = geometry.margin_x + (geometry.content_width() - width) / 2.0;
    let y = writer.cursor().y;
    writer.image(AssetKey::Header, x, y, width, height);
    writer.advance(height);
}

fn lay_out_drawn<M: TextMeasure + ?Sized>(
    writer: &mut PageWriter,
    measure: &M,
    record: &ReportRecord,
    logo: Option<(u32, u32)>,
) {
    let geometry = *writer.geometry();
    let top = writer.cursor().y;

    let number = format!("{} {}", labels::NUMBER_PREFIX, record.number_label());
    let date = format!("{} {}", labels::DATE_PREFIX, record.date);
    let centered = [
        (labels::TITLE.to_string(), TextStyle::TITLE),
        (number, TextStyle::SUBTITLE),
        (date, TextStyle::BODY),
    ];
    for (text, style) in centered {
        let x = geometry.width / 2.0 - measure.text_width(&text, style) / 2.0;
        writer.text(x, text, style);
        writer.advance(style.line_height());
    }
    writer.advance(2.0);

    if let Some(dimensions) = logo {
        let (width, height) = fit_within(dimensions, LOGO_BOX_WIDTH_MM, LOGO_BOX_HEIGHT_MM);
        let x = geometry.width - geometry.margin_x - width;
        writer.image(AssetKey::Logo, x, top, width, height);
    }

    let company = &record.company_info;
    let lines = [
        (&company.name, TextStyle::BODY_BOLD),
        (&company.address, TextStyle::BODY),
        (&company.phone, TextStyle::BODY),
        (&company.email, TextStyle::BODY),
    ];
    for (line, style) in lines {
        if !line.trim().is_empty() {
            writer.text(geometry.margin_x, line.trim(), style);
        }
        writer.advance(style.line_height());
    }

    if logo.is_some() {
        let logo_bottom = top + LOGO_BOX_HEIGHT_MM;
        let y = writer.cursor().y;
        if logo_bottom > y {
            writer.advance(logo_bottom - y);
        }
    }
}
