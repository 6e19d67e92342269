//! Date labels of a raster stack.
//!
//! A stack carries no dates of its own: a text file beside it lists one label
//! per band, and position in the file is the only link to the band. Labels are
//! fixed-width (`2019-05-03`); a column token is the label with a fixed-width
//! prefix dropped (`05-03`).
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ZonalError};

/// Ordered date labels, one per raster band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateLabels {
    labels: Vec<String>,
}

impl DateLabels {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Parse one label per line. Line terminators are stripped; blank lines
    /// are rejected so that a stray empty line cannot shift the alignment.
    pub fn parse(text: &str) -> Result<Self> {
        let mut labels = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let label = line.trim_end_matches('\r');
            if label.trim().is_empty() {
                return Err(ZonalError::DateLabel {
                    line: i + 1,
                    reason: "empty line".into(),
                });
            }
            labels.push(label.to_string());
        }
        Ok(Self { labels })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ZonalError::io(path, e))?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Column names `<suffix>_<token>` in band order.
    pub fn column_names(&self, suffix: &str, prefix_width: usize) -> Result<Vec<String>> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let token = date_token(label, prefix_width).ok_or_else(|| ZonalError::DateLabel {
                    line: i + 1,
                    reason: format!("'{label}' is shorter than the {prefix_width}-character prefix"),
                })?;
                Ok(format!("{suffix}_{token}"))
            })
            .collect()
    }

    /// Fail unless there is exactly one label per band.
    pub fn check_band_count(&self, bands: usize) -> Result<()> {
        if self.labels.len() != bands {
            return Err(ZonalError::BandCountMismatch {
                bands,
                labels: self.labels.len(),
            });
        }
        Ok(())
    }
}

/// Label with its first `prefix_width` characters removed.
/// None when nothing is left after the prefix.
pub fn date_token(label: &str, prefix_width: usize) -> Option<&str> {
    let start = match label.char_indices().nth(prefix_width) {
        Some((byte, _)) => byte,
        None => return None,
    };
    Some(&label[start..])
}

/// Date file that belongs to a stack raster.
///
/// `<dir>/stack_NDVI_2019.tif` with suffix `ndvi` → `<dir>/dates_ndvi_2019.txt`.
/// The raster stem must start with `stack_<SUFFIX>` (case-insensitive).
pub fn dates_path_for(raster: &Path, suffix: &str) -> Result<PathBuf> {
    let stem = raster
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ZonalError::Config {
            reason: format!("raster path {} has no file name", raster.display()),
        })?;

    let prefix = format!("stack_{suffix}");
    let rest = match stem.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(&prefix) => &stem[prefix.len()..],
        _ => {
            return Err(ZonalError::Config {
                reason: format!(
                    "cannot derive the date file of {}: name does not start with '{prefix}'",
                    raster.display()
                ),
            })
        }
    };

    let dir = raster.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(format!("dates_{suffix}{rest}.txt")))
}
