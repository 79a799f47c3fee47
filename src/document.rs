//! Drawing a [`LayoutPlan`] with `genpdf`.
//!
//! The plan is pushed into a `genpdf::Document` as a single [`PlannedPages`]
//! element that draws one planned page per render call and asks for another
//! page until the plan is exhausted. The optional [`PageFooter`] is printed by
//! a page decorator below the printable region.

use genpdf::error::Error;
use genpdf::fonts::{FontCache, FontData, FontFamily};
use genpdf::style::Style;
use genpdf::{self, render, Element, Mm, PageDecorator, Position, RenderResult, Size};
use log::warn;

use crate::images::ReportAssets;
use crate::labels;
use crate::layout::{PageGeometry, PagePlan, Placement, TextMeasure, TextStyle};

pub(crate) fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

pub(crate) fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

/// Converts a planned text style into a `genpdf` style.
fn pdf_style(style: TextStyle) -> Style {
    let mut pdf_style = Style::new().with_font_size(style.size);
    if style.bold {
        pdf_style.set_bold();
    }
    pdf_style
}

/// Measures text with the metrics of the loaded fonts.
pub struct FontMeasure<'a> {
    font_cache: &'a FontCache,
}

impl<'a> FontMeasure<'a> {
    pub fn new(font_cache: &'a FontCache) -> Self {
        Self { font_cache }
    }
}

impl TextMeasure for FontMeasure<'_> {
    fn text_width(&self, text: &str, style: TextStyle) -> f64 {
        mm_to_f64(pdf_style(style).str_width(self.font_cache, text))
    }
}

/// The `Reporte N° 0007 · Página N` line printed under the planned content.
///
/// It sits in the band between the printable bottom and the paper edge, so it
/// never competes with the layout for room.
#[derive(Clone, Debug, PartialEq)]
pub struct PageFooter {
    prefix: String,
    geometry: PageGeometry,
}

impl PageFooter {
    pub fn new(prefix: impl Into<String>, geometry: PageGeometry) -> Self {
        Self {
            prefix: prefix.into(),
            geometry,
        }
    }

    /// Footer text of the one based `page`.
    pub fn text(&self, page: usize) -> String {
        format!("{} · {} {}", self.prefix, labels::PAGE, page)
    }

    /// Top of the footer line, centred vertically in the bottom band.
    pub fn top(&self) -> f64 {
        let band = self.geometry.height - self.geometry.printable_bottom;
        self.geometry.printable_bottom + (band - TextStyle::CAPTION.line_height()).max(0.0) / 2.0
    }
}

/// Builder for `genpdf::Document` instances used to draw reports.
#[derive(Default)]
pub struct DocumentBuilder {
    title: Option<String>,
    paper_size: Option<Size>,
    footer: Option<PageFooter>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document title stored in the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the paper size from the layout geometry.
    pub fn with_geometry(mut self, geometry: &PageGeometry) -> Self {
        self.paper_size = Some(Size::new(
            mm_from_f64(geometry.width),
            mm_from_f64(geometry.height),
        ));
        self
    }

    /// Configures a footer printed at the bottom of every page.
    pub fn with_footer(mut self, footer: impl Into<Option<PageFooter>>) -> Self {
        self.footer = footer.into();
        self
    }

    /// Builds the configured `genpdf::Document`.
    pub fn build(self, font_family: FontFamily<FontData>) -> genpdf::Document {
        let mut document = genpdf::Document::new(font_family);

        if let Some(title) = self.title {
            document.set_title(title);
        }
        if let Some(paper_size) = self.paper_size {
            document.set_paper_size(paper_size);
        }
        if let Some(footer) = self.footer {
            document.set_page_decorator(FooterDecorator { page: 0, footer });
        }

        document
    }
}

/// Counts pages as genpdf starts them and prints the footer on each.
struct FooterDecorator {
    page: usize,
    footer: PageFooter,
}

impl PageDecorator for FooterDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'a>,
        style: Style,
    ) -> Result<render::Area<'a>, Error> {
        self.page += 1;

        let text = self.footer.text(self.page);
        let footer_style = style.and(pdf_style(TextStyle::CAPTION));
        let width = mm_to_f64(footer_style.str_width(&context.font_cache, &text));
        let x = (self.footer.geometry.width - width) / 2.0;
        area.print_str(
            &context.font_cache,
            Position::new(mm_from_f64(x), mm_from_f64(self.footer.top())),
            footer_style,
            &text,
        )?;

        Ok(area)
    }
}

/// Element drawing a laid out report, one planned page per rendered page.
pub struct PlannedPages {
    pages: Vec<PagePlan>,
    assets: ReportAssets,
    next: usize,
}

impl PlannedPages {
    pub fn new(pages: Vec<PagePlan>, assets: ReportAssets) -> Self {
        Self {
            pages,
            assets,
            next: 0,
        }
    }

    fn draw_page(
        &self,
        page: &PagePlan,
        context: &genpdf::Context,
        area: &render::Area<'_>,
        style: Style,
    ) -> Result<(), Error> {
        for placement in &page.placements {
            match placement {
                Placement::Text(text) => {
                    let position = Position::new(mm_from_f64(text.x), mm_from_f64(text.y));
                    area.print_str(
                        &context.font_cache,
                        position,
                        style.and(pdf_style(text.style)),
                        &text.text,
                    )?;
                }
                Placement::Rule { x1, x2, y } => {
                    area.draw_line(
                        vec![
                            Position::new(mm_from_f64(*x1), mm_from_f64(*y)),
                            Position::new(mm_from_f64(*x2), mm_from_f64(*y)),
                        ],
                        Style::new(),
                    );
                }
                Placement::Image(image) => {
                    let Some(asset) = self.assets.get(image.key) else {
                        warn!("No decoded image for {:?}; leaving its slot blank", image.key);
                        continue;
                    };
                    let mut element = asset.to_pdf_image(image.width, image.height)?;
                    element.set_position(Position::new(
                        mm_from_f64(image.x),
                        mm_from_f64(image.y),
                    ));
                    element.render(context, area.clone(), style)?;
                }
            }
        }
        Ok(())
    }
}

impl Element for PlannedPages {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        let Some(page) = self.pages.get(self.next) else {
            return Ok(result);
        };

        self.draw_page(page, context, &area, style)?;
        self.next += 1;

        result.size = area.size();
        result.has_more = self.next < self.pages.len();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_line_sits_below_the_printable_region() {
        let footer = PageFooter::new("Reporte N° 0007", PageGeometry::A4);
        assert_eq!(footer.text(3), "Reporte N° 0007 · Página 3");

        let top = footer.top();
        assert!(top >= PageGeometry::A4.printable_bottom);
        assert!(top + TextStyle::CAPTION.line_height() <= PageGeometry::A4.height);
    }

    #[test]
    fn millimetres_survive_the_unit_conversion() {
        assert!((mm_to_f64(mm_from_f64(18.25)) - 18.25).abs() < 1e-9);
    }
}
