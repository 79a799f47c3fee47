//! Errors returned while building a report document.

use std::io;

use crate::postprocess::PostprocessError;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// No usable font family could be loaded.
    #[error("failed to load fonts")]
    FontLoad(#[source] genpdf::error::Error),
    #[error("failed to render the PDF document")]
    Render(#[source] genpdf::error::Error),
    #[error("failed to normalize the rendered PDF")]
    Normalize(#[from] PostprocessError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
