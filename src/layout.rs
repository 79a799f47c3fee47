//! Page layout of a report.
//!
//! The layout engine walks a [`ReportRecord`] section by section and produces a
//! [`LayoutPlan`]: a list of pages holding absolutely positioned text, rules and
//! images. Coordinates are millimetres measured from the top left corner of the
//! page. The plan does not touch fonts or PDF objects; text widths come from a
//! [`TextMeasure`] implementation so the same plan can be checked in tests
//! and drawn by [`crate::document`].

use log::debug;

use crate::images::{AssetKey, ReportAssets};
use crate::labels;
use crate::letterhead::Letterhead;
use crate::record::{PhaseReadings, Reading, ReportRecord, Signature};

const HEADING_GAP_MM: f64 = 2.0;
const SECTION_GAP_MM: f64 = 4.0;
const BODY_INDENT_MM: f64 = 3.0;
const ROW_HEIGHT_MM: f64 = 6.0;
const ROW_TEXT_OFFSET_MM: f64 = 0.5;
const CELL_PADDING_MM: f64 = 2.0;
const TABLE_GAP_MM: f64 = 3.0;

const PHOTOS_PER_ROW: usize = 2;
const PHOTO_GAP_MM: f64 = 5.0;
const PHOTO_ASPECT: f64 = 0.75;
const CAPTION_SPACING_MM: f64 = 2.0;
const PHOTO_ROW_GAP_MM: f64 = 6.0;
const MAX_CAPTION_LINES: usize = 6;

const SIGNATURE_TOP_GAP_MM: f64 = 10.0;
const SIGNATURE_WIDTH_MM: f64 = 80.0;
const SIGNATURE_HEIGHT_MM: f64 = 40.0;
const SIGNATURE_LINE_OFFSET_MM: f64 = 42.0;
const SIGNATURE_LABEL_OFFSET_MM: f64 = 44.0;
const SIGNATURE_NAME_OFFSET_MM: f64 = 50.0;
const SIGNATURE_ID_OFFSET_MM: f64 = 55.0;

/// Dimensions of a page and its printable region, in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    /// Left and right margin.
    pub margin_x: f64,
    /// Where the cursor starts on every page.
    pub margin_top: f64,
    /// Content must not extend below this coordinate.
    pub printable_bottom: f64,
}

impl PageGeometry {
    /// A4 portrait with room for a page footer.
    pub const A4: PageGeometry = PageGeometry {
        width: 210.0,
        height: 297.0,
        margin_x: 15.0,
        margin_top: 15.0,
        printable_bottom: 280.0,
    };

    pub fn content_width(&self) -> f64 {
        self.width - 2.0 * self.margin_x
    }

    /// Height available to a block placed at the top of an empty page.
    pub fn printable_height(&self) -> f64 {
        self.printable_bottom - self.margin_top
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::A4
    }
}

/// Font size and weight of a text placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextStyle {
    /// Size in points.
    pub size: u8,
    pub bold: bool,
}

impl TextStyle {
    pub const TITLE: TextStyle = TextStyle::bold(18);
    pub const SUBTITLE: TextStyle = TextStyle::bold(12);
    pub const HEADING: TextStyle = TextStyle::bold(12);
    pub const BODY: TextStyle = TextStyle::regular(10);
    pub const BODY_BOLD: TextStyle = TextStyle::bold(10);
    pub const CAPTION: TextStyle = TextStyle::regular(8);

    pub const fn regular(size: u8) -> Self {
        Self { size, bold: false }
    }

    pub const fn bold(size: u8) -> Self {
        Self { size, bold: true }
    }

    /// Vertical advance of one line set in this style.
    pub fn line_height(self) -> f64 {
        f64::from(self.size) * 0.5
    }
}

/// Measures the printed width of a string.
pub trait TextMeasure {
    /// Width of `text` in millimetres when set in `style`.
    fn text_width(&self, text: &str, style: TextStyle) -> f64;
}

/// Width estimate based on an average glyph width of half an em.
///
/// Useful wherever the real fonts are not loaded, e.g. when inspecting a plan.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApproximateMeasure;

impl TextMeasure for ApproximateMeasure {
    fn text_width(&self, text: &str, style: TextStyle) -> f64 {
        const MM_PER_POINT: f64 = 25.4 / 72.0;
        let em = f64::from(style.size) * MM_PER_POINT;
        let factor = if style.bold { 0.55 } else { 0.5 };
        text.chars().count() as f64 * em * factor
    }
}

/// Breaks `text` into lines no wider than `max_width`.
///
/// Explicit newlines start a new line. Words wider than a line are split
/// between characters. Empty input yields no lines.
pub fn wrap_text<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    style: TextStyle,
    max_width: f64,
) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if measure.text_width(&candidate, style) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            if measure.text_width(word, style) <= max_width {
                current = word.to_string();
                continue;
            }

            for ch in word.chars() {
                current.push(ch);
                if current.chars().count() > 1 && measure.text_width(&current, style) > max_width {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
        lines.push(current);
    }

    lines
}

/// Largest size with the aspect ratio of `pixels` that fits the box.
pub fn fit_within(pixels: (u32, u32), box_width: f64, box_height: f64) -> (f64, f64) {
    let (px_width, px_height) = pixels;
    if px_width == 0 || px_height == 0 {
        return (0.0, 0.0);
    }
    let (px_width, px_height) = (f64::from(px_width), f64::from(px_height));
    let scale = (box_width / px_width).min(box_height / px_height);
    (px_width * scale, px_height * scale)
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextPlacement {
    pub x: f64,
    /// Top of the line box.
    pub y: f64,
    pub text: String,
    pub style: TextStyle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImagePlacement {
    pub key: AssetKey,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A single positioned drawing operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Placement {
    Text(TextPlacement),
    /// A horizontal line from `x1` to `x2`.
    Rule { x1: f64, x2: f64, y: f64 },
    Image(ImagePlacement),
}

/// Placements of one page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PagePlan {
    pub placements: Vec<Placement>,
}

impl PagePlan {
    pub fn texts(&self) -> impl Iterator<Item = &TextPlacement> {
        self.placements.iter().filter_map(|placement| match placement {
            Placement::Text(text) => Some(text),
            _ => None,
        })
    }

    pub fn images(&self) -> impl Iterator<Item = &ImagePlacement> {
        self.placements.iter().filter_map(|placement| match placement {
            Placement::Image(image) => Some(image),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// The sections of a report, in print order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Client,
    Service,
    Electrical,
    Battery,
    Description,
    Recommendations,
    Photos,
    Signatures,
}

impl SectionKind {
    pub fn title(self) -> &'static str {
        match self {
            SectionKind::Client => labels::CLIENT_SECTION,
            SectionKind::Service => labels::SERVICE_SECTION,
            SectionKind::Electrical => labels::ELECTRICAL_SECTION,
            SectionKind::Battery => labels::BATTERY_SECTION,
            SectionKind::Description => labels::DESCRIPTION_SECTION,
            SectionKind::Recommendations => labels::RECOMMENDATIONS_SECTION,
            SectionKind::Photos => labels::PHOTOS_SECTION,
            SectionKind::Signatures => labels::SIGNATURES_SECTION,
        }
    }
}

/// Where a section starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionAnchor {
    pub kind: SectionKind,
    /// Zero based page index.
    pub page: usize,
}

/// The complete, positioned content of a report.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutPlan {
    pub pages: Vec<PagePlan>,
    pub sections: Vec<SectionAnchor>,
    /// Indexes of photos whose image could not be placed.
    pub skipped_photos: Vec<usize>,
}

impl LayoutPlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn section_kinds(&self) -> Vec<SectionKind> {
        self.sections.iter().map(|anchor| anchor.kind).collect()
    }

    pub fn section_page(&self, kind: SectionKind) -> Option<usize> {
        self.sections
            .iter()
            .find(|anchor| anchor.kind == kind)
            .map(|anchor| anchor.page)
    }

    /// Number of photo images placed across all pages.
    pub fn placed_photos(&self) -> usize {
        self.pages
            .iter()
            .flat_map(PagePlan::images)
            .filter(|image| matches!(image.key, AssetKey::Photo(_)))
            .count()
    }

    /// Finds the first text placement equal to `text`, with its page index.
    pub fn find_text(&self, text: &str) -> Option<(usize, &TextPlacement)> {
        self.pages.iter().enumerate().find_map(|(index, page)| {
            page.texts()
                .find(|placement| placement.text == text)
                .map(|placement| (index, placement))
        })
    }

    pub fn find_image(&self, key: AssetKey) -> Option<(usize, &ImagePlacement)> {
        self.pages.iter().enumerate().find_map(|(index, page)| {
            page.images()
                .find(|image| image.key == key)
                .map(|image| (index, image))
        })
    }
}

/// Position of the layout cursor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cursor {
    /// Zero based page index.
    pub page: usize,
    pub y: f64,
}

/// Sole writer of the pages being laid out; owns the cursor.
#[derive(Debug)]
pub struct PageWriter {
    geometry: PageGeometry,
    pages: Vec<PagePlan>,
    sections: Vec<SectionAnchor>,
    cursor: Cursor,
}

impl PageWriter {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![PagePlan::default()],
            sections: Vec::new(),
            cursor: Cursor {
                page: 0,
                y: geometry.margin_top,
            },
        }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Whether a block of `height` fits below the cursor.
    pub fn fits(&self, height: f64) -> bool {
        self.cursor.y + height <= self.geometry.printable_bottom
    }

    fn at_page_top(&self) -> bool {
        self.cursor.y <= self.geometry.margin_top
    }

    /// Starts a new page unless a block of `height` fits on the current one.
    ///
    /// A cursor already at the top of a page stays put, so a block taller than
    /// a page never produces empty pages.
    pub fn ensure_room(&mut self, height: f64) {
        if !self.fits(height) && !self.at_page_top() {
            self.break_page();
        }
    }

    /// Starts a new page and moves the cursor to its top margin.
    pub fn break_page(&mut self) {
        self.pages.push(PagePlan::default());
        self.cursor = Cursor {
            page: self.cursor.page + 1,
            y: self.geometry.margin_top,
        };
    }

    pub fn advance(&mut self, height: f64) {
        self.cursor.y += height;
    }

    /// Records that `kind` starts on the current page.
    pub fn anchor(&mut self, kind: SectionKind) {
        self.sections.push(SectionAnchor {
            kind,
            page: self.cursor.page,
        });
    }

    fn push(&mut self, placement: Placement) {
        self.pages[self.cursor.page].placements.push(placement);
    }

    /// Places `text` at the cursor line.
    pub fn text(&mut self, x: f64, text: impl Into<String>, style: TextStyle) {
        let y = self.cursor.y;
        self.text_at(x, y, text, style);
    }

    pub fn text_at(&mut self, x: f64, y: f64, text: impl Into<String>, style: TextStyle) {
        self.push(Placement::Text(TextPlacement {
            x,
            y,
            text: text.into(),
            style,
        }));
    }

    pub fn rule(&mut self, x1: f64, x2: f64, y: f64) {
        self.push(Placement::Rule { x1, x2, y });
    }

    /// Horizontal rule across the content width at the cursor.
    pub fn full_width_rule(&mut self) {
        let x1 = self.geometry.margin_x;
        let x2 = self.geometry.width - self.geometry.margin_x;
        let y = self.cursor.y;
        self.rule(x1, x2, y);
    }

    pub fn image(&mut self, key: AssetKey, x: f64, y: f64, width: f64, height: f64) {
        self.push(Placement::Image(ImagePlacement {
            key,
            x,
            y,
            width,
            height,
        }));
    }

    fn finish(self, skipped_photos: Vec<usize>) -> LayoutPlan {
        LayoutPlan {
            pages: self.pages,
            sections: self.sections,
            skipped_photos,
        }
    }
}

/// Horizontal alignment of a table cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CellAlign {
    Left,
    Right,
}

/// Lays out reports on pages of a fixed geometry.
pub struct LayoutEngine<'a, M: TextMeasure + ?Sized> {
    geometry: PageGeometry,
    measure: &'a M,
}

impl<'a, M: TextMeasure + ?Sized> LayoutEngine<'a, M> {
    pub fn new(geometry: PageGeometry, measure: &'a M) -> Self {
        Self { geometry, measure }
    }

    /// Produces the plan for `record`.
    ///
    /// `assets` decides which images can be placed; empty slots are left out
    /// while the surrounding layout stays unchanged.
    pub fn lay_out(
        &self,
        record: &ReportRecord,
        assets: &ReportAssets,
        letterhead: &Letterhead,
    ) -> LayoutPlan {
        let mut writer = PageWriter::new(self.geometry);

        letterhead.lay_out(&mut writer, self.measure, record, assets);
        self.client_section(&mut writer, record);
        self.service_section(&mut writer, record);
        self.electrical_section(&mut writer, record);
        self.battery_section(&mut writer, record);
        self.text_section(&mut writer, SectionKind::Description, &record.description);
        self.text_section(
            &mut writer,
            SectionKind::Recommendations,
            &record.recommendations,
        );
        let skipped = self.photo_section(&mut writer, record, assets);
        self.signature_section(&mut writer, record, assets);

        let plan = writer.finish(skipped);
        debug!(
            "Laid out report {} on {} page(s)",
            record.number_label(),
            plan.page_count()
        );
        plan
    }

    fn body_x(&self) -> f64 {
        self.geometry.margin_x + BODY_INDENT_MM
    }

    fn body_width(&self) -> f64 {
        self.geometry.content_width() - BODY_INDENT_MM
    }

    fn heading_height() -> f64 {
        TextStyle::HEADING.line_height() + HEADING_GAP_MM
    }

    fn heading(&self, writer: &mut PageWriter, kind: SectionKind) {
        writer.anchor(kind);
        writer.text(self.geometry.margin_x, kind.title(), TextStyle::HEADING);
        writer.advance(Self::heading_height());
    }

    fn field_lines(&self, writer: &mut PageWriter, kind: SectionKind, lines: &[String]) {
        let line_height = TextStyle::BODY.line_height();
        writer.ensure_room(
            Self::heading_height() + lines.len() as f64 * line_height + SECTION_GAP_MM,
        );
        self.heading(writer, kind);
        for line in lines {
            writer.text(self.body_x(), line.as_str(), TextStyle::BODY);
            writer.advance(line_height);
        }
        writer.advance(SECTION_GAP_MM);
    }

    fn client_section(&self, writer: &mut PageWriter, record: &ReportRecord) {
        let client = &record.client;
        let values = [
            &client.company,
            &client.contact,
            &client.address,
            &client.city,
            &client.email,
            &client.phone,
        ];
        let lines: Vec<String> = labels::CLIENT_FIELDS
            .iter()
            .zip(values)
            .map(|(label, value)| field_line(label, value))
            .collect();
        self.field_lines(writer, SectionKind::Client, &lines);
    }

    fn service_section(&self, writer: &mut PageWriter, record: &ReportRecord) {
        let service = &record.service;
        let service_type = service
            .service_type
            .map(|kind| kind.label())
            .unwrap_or_default();
        let values = [
            service_type,
            service.equipment_model.as_str(),
            service.equipment_serial.as_str(),
        ];
        let lines: Vec<String> = labels::SERVICE_FIELDS
            .iter()
            .zip(values)
            .map(|(label, value)| field_line(label, value))
            .collect();
        self.field_lines(writer, SectionKind::Service, &lines);
    }

    fn table_height(rows: usize, titled: bool) -> f64 {
        let title = if titled {
            TextStyle::BODY_BOLD.line_height()
        } else {
            0.0
        };
        title + rows as f64 * ROW_HEIGHT_MM + TABLE_GAP_MM
    }

    fn electrical_section(&self, writer: &mut PageWriter, record: &ReportRecord) {
        let electrical = &record.electrical;
        let tables: [(&str, &[&str; 4], &PhaseReadings); 4] = [
            (labels::INPUT_VOLTAGE, &labels::VOLTAGE_PHASES, &electrical.input_voltage),
            (labels::INPUT_CURRENT, &labels::CURRENT_PHASES, &electrical.input_current),
            (labels::OUTPUT_VOLTAGE, &labels::VOLTAGE_PHASES, &electrical.output_voltage),
            (labels::OUTPUT_CURRENT, &labels::CURRENT_PHASES, &electrical.output_current),
        ];
        let table_height = Self::table_height(2, true);

        writer.ensure_room(Self::heading_height() + table_height);
        self.heading(writer, SectionKind::Electrical);

        for (title, phases, readings) in tables {
            writer.ensure_room(table_height);
            writer.text(self.body_x(), title, TextStyle::BODY_BOLD);
            writer.advance(TextStyle::BODY_BOLD.line_height());

            let header: Vec<&str> = phases.to_vec();
            let values: Vec<&str> = readings.values().into_iter().map(Reading::display).collect();
            let aligns = [CellAlign::Right; 4];
            self.table(writer, &aligns, &header, &[values]);
            writer.advance(TABLE_GAP_MM);
        }
        writer.advance(SECTION_GAP_MM - TABLE_GAP_MM);
    }

    fn battery_section(&self, writer: &mut PageWriter, record: &ReportRecord) {
        let battery = &record.battery;
        let rows = [
            (labels::BATTERY_VOLTAGE_TOTAL, battery.voltage_total.display_with_unit("V")),
            (labels::BATTERY_CURRENT_DISCHARGE, battery.current_discharge.display_with_unit("A")),
            (labels::BATTERY_VOLTAGE_TEST, battery.voltage_test.display_with_unit("V")),
            (labels::BATTERY_CURRENT_TEST, battery.current_test.display_with_unit("A")),
            (labels::BATTERY_QUANTITY, battery.quantity.display().to_string()),
            (labels::BATTERY_REFERENCE, battery.reference.display_with_unit("Ah")),
            (labels::BATTERY_AUTONOMY, battery.autonomy.display_with_unit("min")),
            (
                labels::BATTERY_STATUS,
                battery
                    .status
                    .map(|status| status.label().to_string())
                    .unwrap_or_else(|| labels::PLACEHOLDER.to_string()),
            ),
        ];

        let body: Vec<Vec<&str>> = rows
            .iter()
            .map(|(label, value)| vec![*label, value.as_str()])
            .collect();
        let height = Self::heading_height() + Self::table_height(body.len() + 1, false);

        writer.ensure_room(height);
        self.heading(writer, SectionKind::Battery);
        self.table(
            writer,
            &[CellAlign::Left, CellAlign::Right],
            &labels::BATTERY_HEADER,
            &body,
        );
        writer.advance(SECTION_GAP_MM);
    }

    /// Draws a header row and body rows in equal-width columns at the cursor.
    fn table(
        &self,
        writer: &mut PageWriter,
        aligns: &[CellAlign],
        header: &[&str],
        body: &[Vec<&str>],
    ) {
        let x = self.body_x();
        let width = self.body_width();
        let column_width = width / aligns.len() as f64;

        writer.rule(x, x + width, writer.cursor().y);
        self.table_row(writer, aligns, header, column_width, TextStyle::BODY_BOLD);
        writer.rule(x, x + width, writer.cursor().y);
        for row in body {
            self.table_row(writer, aligns, row, column_width, TextStyle::BODY);
        }
        writer.rule(x, x + width, writer.cursor().y);
    }

    fn table_row(
        &self,
        writer: &mut PageWriter,
        aligns: &[CellAlign],
        cells: &[&str],
        column_width: f64,
        style: TextStyle,
    ) {
        let y = writer.cursor().y + ROW_TEXT_OFFSET_MM;
        for (column, align) in aligns.iter().enumerate() {
            let text = cells.get(column).copied().unwrap_or(labels::PLACEHOLDER);
            let left = self.body_x() + column as f64 * column_width;
            let x = match align {
                CellAlign::Left => left + CELL_PADDING_MM,
                CellAlign::Right => {
                    left + column_width - CELL_PADDING_MM - self.measure.text_width(text, style)
                }
            };
            writer.text_at(x, y, text, style);
        }
        writer.advance(ROW_HEIGHT_MM);
    }

    fn text_section(&self, writer: &mut PageWriter, kind: SectionKind, text: &str) {
        let style = TextStyle::BODY;
        let line_height = style.line_height();
        let mut lines = wrap_text(self.measure, text, style, self.body_width());
        if lines.iter().all(|line| line.trim().is_empty()) {
            lines = vec![labels::PLACEHOLDER.to_string()];
        }

        let height = Self::heading_height() + lines.len() as f64 * line_height + SECTION_GAP_MM;
        if height <= self.geometry.printable_height() {
            writer.ensure_room(height);
            self.heading(writer, kind);
            for line in &lines {
                writer.text(self.body_x(), line.as_str(), style);
                writer.advance(line_height);
            }
        } else {
            // Longer than a page: flow line by line.
            writer.ensure_room(Self::heading_height() + line_height);
            self.heading(writer, kind);
            for line in &lines {
                writer.ensure_room(line_height);
                writer.text(self.body_x(), line.as_str(), style);
                writer.advance(line_height);
            }
        }
        writer.advance(SECTION_GAP_MM);
    }

    fn photo_section(
        &self,
        writer: &mut PageWriter,
        record: &ReportRecord,
        assets: &ReportAssets,
    ) -> Vec<usize> {
        let mut skipped = Vec::new();
        if record.photos.is_empty() {
            return skipped;
        }

        writer.break_page();
        self.heading(writer, SectionKind::Photos);

        let margin = self.geometry.margin_x;
        let box_width = (self.geometry.content_width()
            - PHOTO_GAP_MM * (PHOTOS_PER_ROW - 1) as f64)
            / PHOTOS_PER_ROW as f64;
        let box_height = box_width * PHOTO_ASPECT;
        let caption_line = TextStyle::CAPTION.line_height();

        for (row_index, row) in record.photos.chunks(PHOTOS_PER_ROW).enumerate() {
            let captions: Vec<Vec<String>> = row
                .iter()
                .map(|photo| self.caption_lines(&photo.description, box_width))
                .collect();
            let caption_height = captions.iter().map(Vec::len).max().unwrap_or(0) as f64
                * caption_line;
            let row_height = box_height + CAPTION_SPACING_MM + caption_height + PHOTO_ROW_GAP_MM;

            writer.ensure_room(row_height);
            let top = writer.cursor().y;

            for (column, lines) in captions.iter().enumerate() {
                let index = row_index * PHOTOS_PER_ROW + column;
                let x = margin + column as f64 * (box_width + PHOTO_GAP_MM);

                match assets.dimensions(AssetKey::Photo(index)) {
                    Some(dimensions) => {
                        let (width, height) = fit_within(dimensions, box_width, box_height);
                        let offset = (box_width - width) / 2.0;
                        writer.image(AssetKey::Photo(index), x + offset, top, width, height);
                    }
                    None => skipped.push(index),
                }

                let caption_top = top + box_height + CAPTION_SPACING_MM;
                for (line_index, line) in lines.iter().enumerate() {
                    let y = caption_top + line_index as f64 * caption_line;
                    writer.text_at(x, y, line.as_str(), TextStyle::CAPTION);
                }
            }

            writer.advance(row_height);
        }

        skipped
    }

    /// Wrapped caption, capped so that a photo row always fits on an empty page.
    fn caption_lines(&self, caption: &str, width: f64) -> Vec<String> {
        let mut lines = wrap_text(self.measure, caption, TextStyle::CAPTION, width);
        lines.retain(|line| !line.is_empty());
        if lines.len() > MAX_CAPTION_LINES {
            lines.truncate(MAX_CAPTION_LINES);
            if let Some(last) = lines.last_mut() {
                last.push('…');
            }
        }
        lines
    }

    fn signature_section(
        &self,
        writer: &mut PageWriter,
        record: &ReportRecord,
        assets: &ReportAssets,
    ) {
        if !record.has_signatures() {
            return;
        }

        writer.break_page();
        self.heading(writer, SectionKind::Signatures);
        let top = writer.cursor().y + SIGNATURE_TOP_GAP_MM;

        let blocks = [
            (
                &record.client_signature,
                AssetKey::ClientSignature,
                labels::CLIENT_SIGNATURE,
                self.geometry.margin_x,
            ),
            (
                &record.technician_signature,
                AssetKey::TechnicianSignature,
                labels::TECHNICIAN_SIGNATURE,
                self.geometry.width / 2.0,
            ),
        ];
        for (signature, key, label, x) in blocks {
            self.signature_block(writer, assets, signature, key, label, x, top);
        }

        writer.advance(SIGNATURE_TOP_GAP_MM + SIGNATURE_ID_OFFSET_MM + SECTION_GAP_MM);
    }

    /// Places one signature block at its fixed anchor `(x, top)`.
    #[allow(clippy::too_many_arguments)]
    fn signature_block(
        &self,
        writer: &mut PageWriter,
        assets: &ReportAssets,
        signature: &Signature,
        key: AssetKey,
        label: &str,
        x: f64,
        top: f64,
    ) {
        if !signature.is_present() {
            return;
        }

        if let Some(dimensions) = assets.dimensions(key) {
            let (width, height) = fit_within(dimensions, SIGNATURE_WIDTH_MM, SIGNATURE_HEIGHT_MM);
            let y = top + SIGNATURE_HEIGHT_MM - height;
            writer.image(key, x, y, width, height);
        }

        writer.rule(x, x + SIGNATURE_WIDTH_MM, top + SIGNATURE_LINE_OFFSET_MM);
        writer.text_at(x, top + SIGNATURE_LABEL_OFFSET_MM, label, TextStyle::BODY_BOLD);
        writer.text_at(
            x,
            top + SIGNATURE_NAME_OFFSET_MM,
            field_line(labels::SIGNER_NAME.trim_end_matches(':'), &signature.name),
            TextStyle::BODY,
        );
        writer.text_at(
            x,
            top + SIGNATURE_ID_OFFSET_MM,
            field_line(labels::SIGNER_ID.trim_end_matches(':'), &signature.id),
            TextStyle::BODY,
        );
    }
}

/// `Label: value`, with the placeholder standing in for an empty value.
fn field_line(label: &str, value: &str) -> String {
    let value = value.trim();
    let value = if value.is_empty() {
        labels::PLACEHOLDER
    } else {
        value
    };
    format!("{}: {}", label, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is 2 mm wide.
    struct FixedWidth;

    impl TextMeasure for FixedWidth {
        fn text_width(&self, text: &str, _style: TextStyle) -> f64 {
            text.chars().count() as f64 * 2.0
        }
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_text(&FixedWidth, "one two three four", TextStyle::BODY, 20.0);
        assert_eq!(lines, vec!["one two", "three four"]);
    }

    #[test]
    fn wrap_keeps_explicit_line_breaks() {
        let lines = wrap_text(&FixedWidth, "first\n\nsecond", TextStyle::BODY, 100.0);
        assert_eq!(lines, vec!["first", "", "second"]);
    }

    #[test]
    fn wrap_splits_overlong_words() {
        let lines = wrap_text(&FixedWidth, "abcdefghij", TextStyle::BODY, 8.0);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrap_of_empty_text_is_empty() {
        assert!(wrap_text(&FixedWidth, "", TextStyle::BODY, 10.0).is_empty());
    }

    #[test]
    fn fit_preserves_aspect_ratio() {
        assert_eq!(fit_within((400, 300), 80.0, 40.0), (160.0 / 3.0, 40.0));
        assert_eq!(fit_within((100, 10), 80.0, 40.0), (80.0, 8.0));
        assert_eq!(fit_within((0, 10), 80.0, 40.0), (0.0, 0.0));
    }

    #[test]
    fn ensure_room_breaks_only_when_needed() {
        let mut writer = PageWriter::new(PageGeometry::A4);
        writer.ensure_room(500.0);
        assert_eq!(writer.cursor().page, 0, "no break at the top of a page");

        writer.advance(200.0);
        writer.ensure_room(60.0);
        assert_eq!(writer.cursor().page, 0);

        writer.ensure_room(70.0);
        assert_eq!(writer.cursor().page, 1);
        assert_eq!(writer.cursor().y, PageGeometry::A4.margin_top);
    }

    #[test]
    fn field_line_uses_placeholder() {
        assert_eq!(field_line("Ciudad", "  "), "Ciudad: -");
        assert_eq!(field_line("Ciudad", "Bogotá"), "Ciudad: Bogotá");
    }

    #[test]
    fn right_aligned_cells_share_a_right_edge() {
        let mut record = ReportRecord::default();
        record.electrical.input_voltage = PhaseReadings::new("1", "22", "333", "4444");
        let plan = LayoutEngine::new(PageGeometry::A4, &FixedWidth).lay_out(
            &record,
            &ReportAssets::default(),
            &Letterhead::default(),
        );

        let right_edge = |text: &str| {
            let (_, placement) = plan.find_text(text).expect("cell placed");
            placement.x + FixedWidth.text_width(text, placement.style)
        };
        let column_width = (PageGeometry::A4.content_width() - BODY_INDENT_MM) / 4.0;
        assert!((right_edge("22") - right_edge("1") - column_width).abs() < 1e-9);
        assert!((right_edge("4444") - right_edge("333") - column_width).abs() < 1e-9);
    }
}
