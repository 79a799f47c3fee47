//! Raster inputs of the report: data URI parsing, decoding and conversion into
//! `genpdf` images.
//!
//! Every image of a report is decoded once, up front, into a [`ReportAssets`]
//! table. A payload that cannot be decoded is logged and left out of the table;
//! the layout then treats the slot as empty instead of failing the build.

use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba};
use log::{debug, warn};

use genpdf::elements::Image;
use genpdf::error::Error;
use genpdf::Scale;

use crate::letterhead::Letterhead;
use crate::record::ReportRecord;

const DEFAULT_IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;

/// Errors raised while turning an image source into a raster.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("malformed data URI: {0}")]
    DataUri(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to read image file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The decoded content of a `data:<mime>;base64,<payload>` string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUri {
    /// MIME type, when the URI declares one.
    pub mime: Option<String>,
    /// Raw payload bytes.
    pub bytes: Vec<u8>,
}

/// Splits a data URI into MIME type and base64 payload without decoding it.
///
/// Strings without the `data:` prefix are taken as a bare base64 payload.
pub fn split_data_uri(uri: &str) -> Result<(Option<&str>, &str), ImageError> {
    let uri = uri.trim();
    let Some(rest) = uri.strip_prefix("data:") else {
        return Ok((None, uri));
    };
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageError::DataUri("missing `,` before the payload".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| ImageError::DataUri(format!("unsupported encoding in `{}`", header)))?;
    let mime = Some(mime).filter(|mime| !mime.is_empty());
    Ok((mime, payload))
}

/// Parses and decodes a data URI.
pub fn parse_data_uri(uri: &str) -> Result<DataUri, ImageError> {
    let (mime, payload) = split_data_uri(uri)?;
    let bytes = STANDARD.decode(payload.trim())?;
    Ok(DataUri {
        mime: mime.map(str::to_string),
        bytes,
    })
}

/// Where the bytes of an image come from.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageSource {
    /// A MIME tagged base64 string, as produced by browsers.
    DataUri(String),
    /// Encoded image bytes (PNG, JPEG, ...).
    Bytes(Vec<u8>),
    /// An image file on disk.
    Path(PathBuf),
}

impl ImageSource {
    pub fn from_data_uri(uri: impl Into<String>) -> Self {
        Self::DataUri(uri.into())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Decodes the source into an [`ImageAsset`].
    pub fn load(&self) -> Result<ImageAsset, ImageError> {
        let image = match self {
            Self::DataUri(uri) => decode_image_from_bytes(parse_data_uri(uri)?.bytes)?,
            Self::Bytes(bytes) => decode_image_from_bytes(bytes)?,
            Self::Path(path) => decode_image_from_path(path)?,
        };
        Ok(ImageAsset::new(image))
    }
}

/// Loads an image from in-memory bytes, guessing the format from the content.
pub fn decode_image_from_bytes(bytes: impl AsRef<[u8]>) -> Result<DynamicImage, ImageError> {
    Ok(image::load_from_memory(bytes.as_ref())?)
}

/// Loads an image from the given path.
pub fn decode_image_from_path(path: impl AsRef<Path>) -> Result<DynamicImage, ImageError> {
    let path = path.as_ref();
    let reader = image::io::Reader::open(path).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = reader.with_guessed_format().map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(reader.decode()?)
}

/// Composites transparent pixels onto white.
///
/// `genpdf` refuses images with an alpha channel, and signature pads export
/// black strokes over a transparent background.
fn flatten_alpha(image: DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return image;
    }

    let rgba = image.to_rgba8();
    let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let alpha = u16::from(a);
        let blend = |channel: u8| ((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    });
    DynamicImage::ImageRgb8(flattened)
}

/// A decoded raster ready to be placed on a page.
#[derive(Clone, Debug)]
pub struct ImageAsset {
    image: DynamicImage,
}

impl ImageAsset {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: flatten_alpha(image),
        }
    }

    /// Pixel dimensions as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Size in millimetres at the default embedding resolution.
    fn natural_size_mm(&self) -> (f64, f64) {
        let (px_width, px_height) = self.dimensions();
        (
            MM_PER_INCH * f64::from(px_width) / DEFAULT_IMAGE_DPI,
            MM_PER_INCH * f64::from(px_height) / DEFAULT_IMAGE_DPI,
        )
    }

    /// Builds a `genpdf` image scaled to exactly `width_mm` by `height_mm`.
    pub fn to_pdf_image(&self, width_mm: f64, height_mm: f64) -> Result<Image, Error> {
        let (natural_width, natural_height) = self.natural_size_mm();
        let mut image = Image::from_dynamic_image(self.image.clone())?;
        if natural_width > f64::EPSILON && natural_height > f64::EPSILON {
            image.set_scale(Scale::new(
                width_mm / natural_width,
                height_mm / natural_height,
            ));
        }
        Ok(image)
    }
}

/// Identifies one image slot of a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKey {
    /// Captured snapshot of the on-screen header.
    Header,
    /// Custom letterhead logo.
    Logo,
    /// Photo at the given index of [`ReportRecord::photos`].
    Photo(usize),
    ClientSignature,
    TechnicianSignature,
}

/// Every decoded image of one report.
#[derive(Clone, Debug, Default)]
pub struct ReportAssets {
    pub header: Option<ImageAsset>,
    pub logo: Option<ImageAsset>,
    /// One slot per photo; `None` when the payload did not decode.
    pub photos: Vec<Option<ImageAsset>>,
    pub client_signature: Option<ImageAsset>,
    pub technician_signature: Option<ImageAsset>,
}

impl ReportAssets {
    /// Decodes the images referenced by `record` and `letterhead`.
    ///
    /// Failures are logged and leave the slot empty.
    pub fn resolve(record: &ReportRecord, letterhead: &Letterhead) -> Self {
        let (header, logo) = match letterhead {
            Letterhead::Captured(source) => (load_logged(source, "captured header"), None),
            Letterhead::Drawn { logo: Some(source) } => (None, load_logged(source, "logo")),
            Letterhead::Drawn { logo: None } => (None, None),
        };

        let photos = record
            .photos
            .iter()
            .enumerate()
            .map(|(index, photo)| {
                let source = ImageSource::from_data_uri(photo.url.as_str());
                load_logged(&source, &format!("photo {} ({})", index + 1, photo.id))
            })
            .collect();

        let signature = |image: &Option<String>, what: &str| {
            image
                .as_deref()
                .filter(|uri| !uri.trim().is_empty())
                .and_then(|uri| load_logged(&ImageSource::from_data_uri(uri), what))
        };

        Self {
            header,
            logo,
            photos,
            client_signature: signature(&record.client_signature.image, "client signature"),
            technician_signature: signature(
                &record.technician_signature.image,
                "technician signature",
            ),
        }
    }

    /// Looks up the asset stored for `key`.
    pub fn get(&self, key: AssetKey) -> Option<&ImageAsset> {
        match key {
            AssetKey::Header => self.header.as_ref(),
            AssetKey::Logo => self.logo.as_ref(),
            AssetKey::Photo(index) => self.photos.get(index).and_then(Option::as_ref),
            AssetKey::ClientSignature => self.client_signature.as_ref(),
            AssetKey::TechnicianSignature => self.technician_signature.as_ref(),
        }
    }

    /// Pixel dimensions of the asset stored for `key`.
    pub fn dimensions(&self, key: AssetKey) -> Option<(u32, u32)> {
        self.get(key).map(ImageAsset::dimensions)
    }
}

fn load_logged(source: &ImageSource, what: &str) -> Option<ImageAsset> {
    match source.load() {
        Ok(asset) => {
            let (width, height) = asset.dimensions();
            debug!("Decoded {} ({}x{} px)", what, width, height);
            Some(asset)
        }
        Err(err) => {
            warn!("Skipping {}: {}", what, err);
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{ImageBuffer, ImageOutputFormat, RgbaImage};

    use super::*;
    use crate::record::{Photo, Signature};

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, 128])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .expect("encode png");
        bytes
    }

    pub(crate) fn png_data_uri(width: u32, height: u32) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(width, height)))
    }

    #[test]
    fn splits_data_uri() {
        let (mime, payload) = split_data_uri("data:image/jpeg;base64,QUJD").unwrap();
        assert_eq!(mime, Some("image/jpeg"));
        assert_eq!(payload, "QUJD");

        let (mime, payload) = split_data_uri("QUJD").unwrap();
        assert_eq!(mime, None);
        assert_eq!(payload, "QUJD");
    }

    #[test]
    fn rejects_non_base64_data_uri() {
        let err = split_data_uri("data:text/plain,hello").unwrap_err();
        assert!(matches!(err, ImageError::DataUri(_)));
    }

    #[test]
    fn decodes_png_data_uri() {
        let asset = ImageSource::from_data_uri(png_data_uri(8, 6))
            .load()
            .expect("decodes");
        assert_eq!(asset.dimensions(), (8, 6));
    }

    #[test]
    fn corrupt_payload_is_an_error() {
        let source = ImageSource::from_data_uri("data:image/jpeg;base64,bm90IGFuIGltYWdl");
        assert!(matches!(source.load(), Err(ImageError::Decode(_))));
        let source = ImageSource::from_data_uri("data:image/jpeg;base64,***");
        assert!(matches!(source.load(), Err(ImageError::Base64(_))));
    }

    #[test]
    fn transparent_pixels_become_white() {
        let rgba: RgbaImage = ImageBuffer::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let asset = ImageAsset::new(DynamicImage::ImageRgba8(rgba));
        assert!(!asset.image.color().has_alpha());
        let rgb = asset.image.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn resolve_leaves_broken_slots_empty() {
        let mut record = ReportRecord::default();
        record.photos = vec![
            Photo::new(png_data_uri(4, 3), "ok"),
            Photo::new("data:image/jpeg;base64,AAAA", "broken"),
        ];
        record.technician_signature = Signature::new(png_data_uri(10, 5), "Tec", "1");

        let assets = ReportAssets::resolve(&record, &Letterhead::default());
        assert_eq!(assets.photos.len(), 2);
        assert!(assets.get(AssetKey::Photo(0)).is_some());
        assert!(assets.get(AssetKey::Photo(1)).is_none());
        assert!(assets.get(AssetKey::Photo(2)).is_none());
        assert!(assets.client_signature.is_none());
        assert_eq!(assets.dimensions(AssetKey::TechnicianSignature), Some((10, 5)));
    }
}
