//! Font discovery for report rendering.
//!
//! Reports are set in a TrueType family loaded from disk. The search order is:
//! `REPORT_FONTS_DIR`, `assets/fonts` next to the executable, `assets/fonts`
//! in the crate directory (all expecting Roboto), and finally the system
//! Liberation Sans installation.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::Error;
use genpdf::fonts::{self, FontData, FontFamily};
use log::{debug, warn};

/// Environment variable pointing at a directory with the bundled font files.
pub const FONTS_DIR_ENV: &str = "REPORT_FONTS_DIR";

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

const SYSTEM_FAMILY_NAME: &str = "LiberationSans";

const SYSTEM_FONT_DIRECTORIES: &[&str] = &[
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/liberation2",
    "/usr/share/fonts/liberation-sans",
    "/usr/share/fonts/liberation",
];

const STYLE_SUFFIXES: &[&str] = &["Regular", "Bold", "Italic", "BoldItalic"];

/// A directory expected to hold the four styles of one family.
#[derive(Clone, Debug, PartialEq, Eq)]
struct FontCandidate {
    directory: PathBuf,
    family: &'static str,
}

impl FontCandidate {
    fn new(directory: PathBuf, family: &'static str) -> Self {
        Self { directory, family }
    }

    fn missing_files(&self) -> Vec<String> {
        STYLE_SUFFIXES
            .iter()
            .map(|suffix| format!("{}-{}.ttf", self.family, suffix))
            .filter(|name| !self.directory.join(name).is_file())
            .collect()
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
}

/// Directory holding the fonts that ship with the crate.
pub fn bundled_fonts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn font_candidates() -> Vec<FontCandidate> {
    let mut candidates = Vec::new();
    let mut push = |candidate: FontCandidate| {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    };

    if let Some(path) = env_path(FONTS_DIR_ENV) {
        push(FontCandidate::new(path, DEFAULT_FONT_FAMILY_NAME));
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            push(FontCandidate::new(
                bin_dir.join("assets/fonts"),
                DEFAULT_FONT_FAMILY_NAME,
            ));
        }
    }

    push(FontCandidate::new(
        bundled_fonts_dir(),
        DEFAULT_FONT_FAMILY_NAME,
    ));

    for directory in SYSTEM_FONT_DIRECTORIES {
        push(FontCandidate::new(
            Path::new(directory).to_path_buf(),
            SYSTEM_FAMILY_NAME,
        ));
    }

    candidates
}

fn resolve_font_candidate() -> Result<FontCandidate, Error> {
    let mut attempts = Vec::new();

    for candidate in font_candidates() {
        if !candidate.directory.is_dir() {
            attempts.push(format!("{} (directory missing)", candidate.directory.display()));
            continue;
        }

        let missing = candidate.missing_files();
        if missing.is_empty() {
            return Ok(candidate);
        }
        attempts.push(format!(
            "{} (missing files [{}])",
            candidate.directory.display(),
            missing.join(", ")
        ));
    }

    Err(Error::new(
        format!(
            "Unable to locate a font family. Checked: {}. Set {} to a directory containing {}-Regular.ttf, -Bold.ttf, -Italic.ttf and -BoldItalic.ttf.",
            attempts.join(", "),
            FONTS_DIR_ENV,
            DEFAULT_FONT_FAMILY_NAME
        ),
        io::Error::new(io::ErrorKind::NotFound, "report fonts not found"),
    ))
}

/// Loads the first complete font family found on the search path.
pub fn default_font_family() -> Result<FontFamily<FontData>, Error> {
    let candidate = resolve_font_candidate()?;
    if candidate.family != DEFAULT_FONT_FAMILY_NAME {
        warn!(
            "Bundled fonts unavailable; falling back to '{}' from {}",
            candidate.family,
            candidate.directory.display()
        );
    }

    debug!(
        "Loading font family '{}' from {}",
        candidate.family,
        candidate.directory.display()
    );
    fonts::from_files(&candidate.directory, candidate.family, None).map_err(|err| {
        Error::new(
            format!(
                "Failed to load font family '{}' from {}: {}",
                candidate.family,
                candidate.directory.display(),
                err
            ),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

/// Indicates whether any usable font family is present on disk.
pub fn default_fonts_available() -> bool {
    resolve_font_candidate().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_reports_missing_styles() {
        let candidate = FontCandidate::new(PathBuf::from("/__no_such_fonts__"), "Roboto");
        assert_eq!(
            candidate.missing_files(),
            vec![
                "Roboto-Regular.ttf",
                "Roboto-Bold.ttf",
                "Roboto-Italic.ttf",
                "Roboto-BoldItalic.ttf"
            ]
        );
    }

    #[test]
    fn search_path_ends_with_system_fonts() {
        let candidates = font_candidates();
        let last = candidates.last().expect("at least one candidate");
        assert_eq!(last.family, SYSTEM_FAMILY_NAME);
        assert!(candidates
            .iter()
            .any(|candidate| candidate.directory == bundled_fonts_dir()));
    }
}
