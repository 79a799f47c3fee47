//! Core entry point for the service_report crate.
//!
//! A [`record::ReportRecord`] is laid out page by page by [`layout`], drawn with
//! `genpdf` by [`document`] and normalised with `lopdf` by [`postprocess`].
//! [`builder::ReportBuilder`] ties the stages together; [`email`] and
//! [`delivery`] prepare the finished document for sending.

pub mod builder;
pub mod delivery;
pub mod document;
pub mod email;
pub mod error;
pub mod fonts;
pub mod images;
pub mod labels;
pub mod layout;
pub mod letterhead;
pub mod postprocess;
pub mod record;

pub use builder::{RenderedReport, ReportBuilder};
pub use error::ReportError;
pub use letterhead::Letterhead;
pub use record::ReportRecord;
