use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
use service_report::images::{AssetKey, ImageSource};
use service_report::layout::{ApproximateMeasure, LayoutPlan, PageGeometry, SectionKind, TextStyle};
use service_report::record::{Photo, Signature};
use service_report::{labels, Letterhead, ReportBuilder, ReportRecord};

const CORRUPT_PHOTO: &str = "data:image/jpeg;base64,bm90IGEganBlZw==";

fn png_data_uri(width: u32, height: u32) -> String {
    let buffer = ImageBuffer::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 200]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(buffer)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .expect("encode png");
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

fn plan(record: &ReportRecord) -> LayoutPlan {
    plan_with(ReportBuilder::new(), record)
}

fn plan_with(builder: ReportBuilder, record: &ReportRecord) -> LayoutPlan {
    let assets = builder.resolve_assets(record);
    builder.plan(record, &assets, &ApproximateMeasure)
}

fn texts_on_page(plan: &LayoutPlan, page: usize) -> Vec<&str> {
    plan.pages[page]
        .texts()
        .map(|text| text.text.as_str())
        .collect()
}

#[test]
fn empty_record_has_the_six_fixed_sections() {
    let plan = plan(&ReportRecord::default());

    assert_eq!(
        plan.section_kinds(),
        vec![
            SectionKind::Client,
            SectionKind::Service,
            SectionKind::Electrical,
            SectionKind::Battery,
            SectionKind::Description,
            SectionKind::Recommendations,
        ]
    );
    assert!(plan.find_text(labels::PHOTOS_SECTION).is_none());
    assert!(plan.find_text(labels::SIGNATURES_SECTION).is_none());
    assert!(plan.find_text("Empresa: -").is_some());
}

#[test]
fn every_photo_is_either_placed_or_skipped() {
    for count in [0usize, 1, 5, 50] {
        let mut record = ReportRecord::default();
        record.photos = (0..count)
            .map(|index| {
                let url = if index % 4 == 3 {
                    CORRUPT_PHOTO.to_string()
                } else {
                    png_data_uri(8, 6)
                };
                Photo::new(url, format!("Foto {}", index + 1))
            })
            .collect();

        let plan = plan(&record);
        assert_eq!(
            plan.placed_photos() + plan.skipped_photos.len(),
            count,
            "{} photos",
            count
        );
        assert_eq!(plan.skipped_photos.len(), count / 4);

        if count > 0 {
            let photos_page = plan.section_page(SectionKind::Photos).expect("photo section");
            let recommendations = plan
                .section_page(SectionKind::Recommendations)
                .expect("recommendations");
            assert!(photos_page > recommendations, "photos start on a new page");
        } else {
            assert!(plan.section_page(SectionKind::Photos).is_none());
        }
    }
}

#[test]
fn content_stays_above_the_printable_bottom() {
    let mut record = ReportRecord::default();
    record.description = "medición ".repeat(2_000);
    record.photos = (0..9)
        .map(|index| Photo::new(png_data_uri(30, 40), "detalle ".repeat(index * 10)))
        .collect();
    record.client_signature = Signature::new(png_data_uri(40, 20), "Ana", "1");

    let plan = plan(&record);
    let bottom = PageGeometry::A4.printable_bottom;
    for page in &plan.pages {
        for text in page.texts() {
            assert!(text.y + text.style.line_height() <= bottom + 1e-9, "{:?}", text);
        }
        for image in page.images() {
            assert!(image.y + image.height <= bottom + 1e-9, "{:?}", image);
        }
    }
    assert!(plan.pages.iter().all(|page| !page.is_empty()));
}

#[test]
fn technician_signature_keeps_its_anchor_without_client() {
    let mut record = ReportRecord::default();
    record.technician_signature = Signature::new(png_data_uri(60, 30), "Luis Pérez", "CC 123");

    let plan = plan(&record);
    let (page, label) = plan
        .find_text(labels::TECHNICIAN_SIGNATURE)
        .expect("technician block");
    assert_eq!(label.x, PageGeometry::A4.width / 2.0);
    assert_eq!(Some(page), plan.section_page(SectionKind::Signatures));
    assert!(plan.find_text(labels::CLIENT_SIGNATURE).is_none());
    assert!(plan.find_text("Nombre: Luis Pérez").is_some());

    let (_, image) = plan
        .find_image(AssetKey::TechnicianSignature)
        .expect("signature image");
    assert_eq!(image.x, PageGeometry::A4.width / 2.0);
    assert!(plan.find_image(AssetKey::ClientSignature).is_none());
}

#[test]
fn signature_names_without_images_still_print() {
    let mut record = ReportRecord::default();
    record.client_signature = Signature {
        image: None,
        name: "Ana Gómez".into(),
        id: String::new(),
    };

    let plan = plan(&record);
    let (_, label) = plan.find_text(labels::CLIENT_SIGNATURE).expect("client block");
    assert_eq!(label.x, PageGeometry::A4.margin_x);
    assert!(plan.find_text("ID: -").is_some());
    assert!(plan.find_image(AssetKey::ClientSignature).is_none());
}

#[test]
fn end_to_end_scenario() {
    let description = "Se realizó limpieza general del equipo, ajuste de borneras, \
        verificación de ventiladores y medición de parámetros eléctricos en la entrada \
        y en la salida. "
        .repeat(3);
    let record: ReportRecord = serde_json::from_value(serde_json::json!({
        "reportNumber": 7,
        "date": "2026-10-19",
        "client": { "company": "Hospital San José", "city": "Medellín" },
        "service": { "serviceType": "mantenimiento_preventivo" },
        "electrical": { "inputVoltage": { "l1": 120, "l2": "121", "l3": "", "ff": "208" } },
        "battery": { "quantity": 16, "status": "bueno" },
        "description": description,
        "photos": [
            { "id": "a", "url": png_data_uri(40, 30), "description": "Banco de baterías" },
            { "id": "b", "url": CORRUPT_PHOTO, "description": "Tablero" }
        ],
        "clientSignature": { "image": png_data_uri(50, 20), "name": "Ana", "id": "1" },
        "technicianSignature": { "image": png_data_uri(50, 20), "name": "Luis", "id": "2" }
    }))
    .expect("record parses");

    let plan = plan(&record);

    let (page, _) = plan.find_text("N° 0007").expect("padded report number");
    assert_eq!(page, 0);
    assert!(plan.find_text("Tipo de Servicio: Mantenimiento Preventivo").is_some());

    let description_page = plan
        .section_page(SectionKind::Description)
        .expect("description");
    let body_x = PageGeometry::A4.margin_x + 3.0;
    let body_lines = plan.pages[description_page]
        .texts()
        .filter(|text| text.style == TextStyle::BODY && text.x == body_x)
        .filter(|text| !text.text.contains(':') && text.text != labels::PLACEHOLDER)
        .count();
    assert!(body_lines >= 3, "description wraps onto several lines");

    assert_eq!(plan.placed_photos(), 1);
    assert_eq!(plan.skipped_photos, vec![1]);
    let photos_page = plan.section_page(SectionKind::Photos).expect("photos");
    let captions = texts_on_page(&plan, photos_page);
    assert!(captions.contains(&"Banco de baterías"));
    assert!(captions.contains(&"Tablero"));

    let signatures_page = plan.section_page(SectionKind::Signatures).expect("signatures");
    assert!(signatures_page > photos_page);
    let signature_texts = texts_on_page(&plan, signatures_page);
    assert!(signature_texts.contains(&labels::CLIENT_SIGNATURE));
    assert!(signature_texts.contains(&labels::TECHNICIAN_SIGNATURE));
}

#[test]
fn custom_logo_sits_in_the_top_right_box() {
    let mut record = ReportRecord::default();
    record.company_info.name = "Energía Continua S.A.S.".into();
    record.company_info.phone = "604 555 0101".into();
    let letterhead = Letterhead::with_logo(ImageSource::from_data_uri(png_data_uri(400, 100)));

    let plan = plan_with(ReportBuilder::new().with_letterhead(letterhead), &record);
    let geometry = PageGeometry::A4;

    let (page, logo) = plan.find_image(AssetKey::Logo).expect("logo placed");
    assert_eq!(page, 0);
    assert_eq!(logo.y, geometry.margin_top);
    assert!((logo.x + logo.width - (geometry.width - geometry.margin_x)).abs() < 1e-9);
    assert!((logo.width - 40.0).abs() < 1e-9, "{:?}", logo);
    assert!((logo.height - 10.0).abs() < 1e-9, "{:?}", logo);

    let (page, name) = plan.find_text("Energía Continua S.A.S.").expect("company name");
    assert_eq!(page, 0);
    assert_eq!(name.x, geometry.margin_x);
    assert!(plan.find_text("604 555 0101").is_some());
    assert!(plan.find_text(labels::TITLE).is_some());
}

#[test]
fn battery_table_is_never_split_from_its_heading() {
    let mut record = ReportRecord::default();
    record.description = "Limpieza y ajuste de borneras. ".repeat(200);
    let row_labels = [
        labels::BATTERY_HEADER[0],
        labels::BATTERY_VOLTAGE_TOTAL,
        labels::BATTERY_CURRENT_DISCHARGE,
        labels::BATTERY_VOLTAGE_TEST,
        labels::BATTERY_CURRENT_TEST,
        labels::BATTERY_QUANTITY,
        labels::BATTERY_REFERENCE,
        labels::BATTERY_AUTONOMY,
        labels::BATTERY_STATUS,
    ];

    let mut moved = 0;
    for bottom in (150..=280).step_by(5) {
        let geometry = PageGeometry {
            printable_bottom: f64::from(bottom),
            ..PageGeometry::A4
        };
        let plan = plan_with(ReportBuilder::new().with_geometry(geometry), &record);

        let (heading_page, _) = plan
            .find_text(labels::BATTERY_SECTION)
            .expect("battery heading");
        assert_eq!(plan.section_page(SectionKind::Battery), Some(heading_page));
        for label in row_labels {
            let (page, _) = plan.find_text(label).expect("battery row");
            assert_eq!(page, heading_page, "{} at bottom {}", label, bottom);
        }

        let (last_table_page, _) = plan
            .find_text(labels::OUTPUT_CURRENT)
            .expect("last electrical table");
        if heading_page > last_table_page {
            moved += 1;
            let (_, heading) = plan.find_text(labels::BATTERY_SECTION).unwrap();
            assert_eq!(heading.y, geometry.margin_top, "moved block starts the page");
        }
        assert!(plan.section_page(SectionKind::Description).unwrap() >= heading_page);
    }
    assert!(moved > 0, "some geometry pushes the battery table to a new page");
}

#[test]
fn long_photo_captions_are_cut_with_an_ellipsis() {
    let mut record = ReportRecord::default();
    record.photos = vec![Photo::new(png_data_uri(40, 30), "detalle del tablero ".repeat(60))];

    let plan = plan(&record);
    let page = plan.section_page(SectionKind::Photos).expect("photos");
    let captions: Vec<&str> = plan.pages[page]
        .texts()
        .filter(|text| text.style == TextStyle::CAPTION)
        .map(|text| text.text.as_str())
        .collect();

    assert_eq!(captions.len(), 6);
    assert!(captions[5].ends_with('…'));
    assert!(captions[..5].iter().all(|line| !line.ends_with('…')));
}

#[test]
fn planning_is_repeatable() {
    let mut record = ReportRecord::default();
    record.report_number = 12;
    record.recommendations = "Cambiar baterías en seis meses.".into();
    record.photos = vec![Photo::new(png_data_uri(10, 10), "Vista frontal")];

    assert_eq!(plan(&record), plan(&record));
}
