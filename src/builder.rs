//! The report builder: resolve images, lay out, draw and normalise.

use std::fs;
use std::path::Path;

use genpdf::fonts::{FontData, FontFamily};
use log::{debug, info, warn};

use crate::document::{DocumentBuilder, FontMeasure, PageFooter, PlannedPages};
use crate::error::ReportError;
use crate::fonts;
use crate::images::ReportAssets;
use crate::labels;
use crate::layout::{LayoutEngine, LayoutPlan, PageGeometry, TextMeasure};
use crate::letterhead::Letterhead;
use crate::postprocess;
use crate::record::{PhotoId, ReportRecord};

/// A finished report document.
#[derive(Clone, Debug)]
pub struct RenderedReport {
    /// The PDF file contents.
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Number of photos whose image made it into the document.
    pub embedded_photos: usize,
    /// Photos left out because their payload did not decode.
    pub skipped_photos: Vec<PhotoId>,
}

impl RenderedReport {
    /// Writes the PDF to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Turns [`ReportRecord`]s into PDF documents.
///
/// ```no_run
/// use service_report::{ReportBuilder, ReportRecord};
///
/// let record = ReportRecord::default();
/// let report = ReportBuilder::new().build(&record)?;
/// std::fs::write("reporte.pdf", &report.bytes)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct ReportBuilder {
    letterhead: Letterhead,
    geometry: PageGeometry,
    page_footer: bool,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self {
            letterhead: Letterhead::default(),
            geometry: PageGeometry::A4,
            page_footer: true,
        }
    }
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_letterhead(mut self, letterhead: Letterhead) -> Self {
        self.letterhead = letterhead;
        self
    }

    pub fn with_geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Enables or disables the `Reporte N° … · Página N` footer.
    pub fn with_page_footer(mut self, enabled: bool) -> Self {
        self.page_footer = enabled;
        self
    }

    pub fn letterhead(&self) -> &Letterhead {
        &self.letterhead
    }

    /// Decodes every image the record and the letterhead refer to.
    pub fn resolve_assets(&self, record: &ReportRecord) -> ReportAssets {
        ReportAssets::resolve(record, &self.letterhead)
    }

    /// Lays out `record` without rendering it.
    pub fn plan<M: TextMeasure + ?Sized>(
        &self,
        record: &ReportRecord,
        assets: &ReportAssets,
        measure: &M,
    ) -> LayoutPlan {
        LayoutEngine::new(self.geometry, measure).lay_out(record, assets, &self.letterhead)
    }

    /// Builds the PDF for `record` with the default font family.
    pub fn build(&self, record: &ReportRecord) -> Result<RenderedReport, ReportError> {
        let font_family = fonts::default_font_family().map_err(ReportError::FontLoad)?;
        self.build_with_fonts(record, font_family)
    }

    /// Builds the PDF for `record` set in `font_family`.
    pub fn build_with_fonts(
        &self,
        record: &ReportRecord,
        font_family: FontFamily<FontData>,
    ) -> Result<RenderedReport, ReportError> {
        let number = record.number_label();
        info!("Building report {}", number);

        for finding in record.lint() {
            warn!("Report {}: {}", number, finding);
        }

        let assets = self.resolve_assets(record);

        let mut document_builder = DocumentBuilder::new()
            .with_title(format!("{} {}", labels::TITLE, number))
            .with_geometry(&self.geometry);
        if self.page_footer {
            document_builder = document_builder.with_footer(PageFooter::new(
                format!("{} {}", labels::FOOTER_PREFIX, number),
                self.geometry,
            ));
        }
        let mut document = document_builder.build(font_family);

        let plan = {
            let measure = FontMeasure::new(document.font_cache());
            self.plan(record, &assets, &measure)
        };

        let skipped_photos: Vec<PhotoId> = plan
            .skipped_photos
            .iter()
            .filter_map(|&index| record.photos.get(index))
            .map(|photo| photo.id.clone())
            .collect();
        for id in &skipped_photos {
            warn!("Report {}: photo {} left out of the document", number, id);
        }

        let page_count = plan.page_count();
        let embedded_photos = plan.placed_photos();
        let LayoutPlan {
            pages, sections, ..
        } = plan;

        document.push(PlannedPages::new(pages, assets));
        let mut rendered = Vec::new();
        document
            .render(&mut rendered)
            .map_err(ReportError::Render)?;
        debug!("Rendered {} bytes before normalisation", rendered.len());

        let bytes = postprocess::normalize(&rendered, &sections)?;
        info!(
            "Report {} ready: {} page(s), {} photo(s) embedded, {} skipped",
            number,
            page_count,
            embedded_photos,
            skipped_photos.len()
        );

        Ok(RenderedReport {
            bytes,
            page_count,
            embedded_photos,
            skipped_photos,
        })
    }
}
