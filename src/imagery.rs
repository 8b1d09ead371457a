//! Correlation of sensor samples with camera frames on disk.
//!
//! Archives are laid out as
//! `<root>/<YYYY-MM-DD>/<jpg|fits>/<prefix><YYYYMMDDTHHMM[SS]>*.<ext>`, with the
//! all-sky camera under the imagery root and the ZWO camera under
//! `<root>/<zwo_subdir>` using the `zwo_` prefix.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ImageryConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    AllSkyJpg,
    ZwoJpg,
    ZwoFits,
}

impl ImageKind {
    pub const ALL: [ImageKind; 3] = [ImageKind::AllSkyJpg, ImageKind::ZwoJpg, ImageKind::ZwoFits];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::AllSkyJpg => "allsky_jpg",
            ImageKind::ZwoJpg => "zwo_jpg",
            ImageKind::ZwoFits => "zwo_fits",
        }
    }

    fn subdir(&self) -> &'static str {
        match self {
            ImageKind::AllSkyJpg | ImageKind::ZwoJpg => "jpg",
            ImageKind::ZwoFits => "fits",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            ImageKind::AllSkyJpg => "",
            ImageKind::ZwoJpg | ImageKind::ZwoFits => "zwo_",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            ImageKind::AllSkyJpg | ImageKind::ZwoJpg => "jpg",
            ImageKind::ZwoFits => "fit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub kind: ImageKind,
    pub path: PathBuf,
    pub captured_at: DateTime<Utc>,
}

impl ImageRef {
    /// True when the frame was taken at or before `at`, at most `max_age` earlier.
    pub fn within(&self, at: DateTime<Utc>, max_age: Duration) -> bool {
        self.captured_at <= at && at - self.captured_at <= max_age
    }
}

pub trait ImageLookup: Send + Sync {
    /// Newest frame of `kind` captured in `[at - max_age, at]`.
    fn find(&self, kind: ImageKind, at: DateTime<Utc>, max_age: Duration) -> Option<ImageRef>;
}

/// Lookup that never finds anything, used when no archive is configured.
pub struct NoImages;

impl ImageLookup for NoImages {
    fn find(&self, _kind: ImageKind, _at: DateTime<Utc>, _max_age: Duration) -> Option<ImageRef> {
        None
    }
}

pub struct FsImageLookup {
    allsky_root: PathBuf,
    zwo_root: PathBuf,
}

impl FsImageLookup {
    pub fn new(root: impl Into<PathBuf>, zwo_subdir: &str) -> Self {
        let allsky_root = root.into();
        let zwo_root = allsky_root.join(zwo_subdir);
        Self {
            allsky_root,
            zwo_root,
        }
    }

    pub fn from_config(config: &ImageryConfig) -> Option<Self> {
        config
            .root
            .as_ref()
            .map(|root| Self::new(root.clone(), &config.zwo_subdir))
    }

    fn root_for(&self, kind: ImageKind) -> &Path {
        match kind {
            ImageKind::AllSkyJpg => &self.allsky_root,
            ImageKind::ZwoJpg | ImageKind::ZwoFits => &self.zwo_root,
        }
    }

    fn candidates_in(&self, kind: ImageKind, date: NaiveDate) -> Vec<ImageRef> {
        let dir = self
            .root_for(kind)
            .join(date.format("%Y-%m-%d").to_string())
            .join(kind.subdir());

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let captured_at = parse_capture_time(file_name.to_str()?, kind)?;
                Some(ImageRef {
                    kind,
                    path: entry.path(),
                    captured_at,
                })
            })
            .collect()
    }
}

impl ImageLookup for FsImageLookup {
    fn find(&self, kind: ImageKind, at: DateTime<Utc>, max_age: Duration) -> Option<ImageRef> {
        let earliest = at - max_age;
        let mut dates = vec![at.date_naive()];
        if earliest.date_naive() != at.date_naive() {
            dates.push(earliest.date_naive());
        }

        let found = dates
            .into_iter()
            .flat_map(|date| self.candidates_in(kind, date))
            .filter(|image| image.within(at, max_age))
            .max_by(|a, b| {
                a.captured_at
                    .cmp(&b.captured_at)
                    .then_with(|| a.path.cmp(&b.path))
            });

        if found.is_none() {
            debug!("no {} frame within {}s before {at}", kind.as_str(), max_age.num_seconds());
        }
        found
    }
}

/// Parse `<prefix>YYYYMMDDTHHMM[SS]...<.ext>` into a UTC capture time.
fn parse_capture_time(file_name: &str, kind: ImageKind) -> Option<DateTime<Utc>> {
    let stem = file_name.strip_suffix(kind.extension())?.strip_suffix('.')?;
    let rest = stem.strip_prefix(kind.prefix())?;

    let minute_part = rest.get(..13)?;
    let seconds = rest
        .get(13..15)
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or("00");

    let naive =
        NaiveDateTime::parse_from_str(&format!("{minute_part}{seconds}"), "%Y%m%dT%H%M%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}
