//! Catalog fixtures: filenames and temporary data directories.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Structured dataset id used by most fixtures.
pub const DATA_ID: &str = "TM5-met2010_AP3-CTRL";

/// Same model and meteorology as [`DATA_ID`], another experiment.
pub const DATA_ID_OTHER_EXPERIMENT: &str = "TM5-met2010_AP2-CTRL";

/// `aerocom3_<data_id>_<var>_<vert>_<year>_<ts>.nc`
pub fn aerocom3_name(data_id: &str, var: &str, vert: &str, year: i32, ts: &str) -> String {
    format!("aerocom3_{}_{}_{}_{}_{}.nc", data_id, var, vert, year, ts)
}

/// `aerocom3_<data_id>_<chunk>_<var>_<vert>_<year>_<ts>.nc`
pub fn aerocom3_chunk_name(
    data_id: &str,
    chunk: &str,
    var: &str,
    vert: &str,
    year: i32,
    ts: &str,
) -> String {
    format!("aerocom3_{}_{}_{}_{}_{}_{}.nc", data_id, chunk, var, vert, year, ts)
}

/// `aerocom.<data_id>.<ts>.<var>.<year>.nc`
pub fn aerocom2_name(data_id: &str, ts: &str, var: &str, year: i32) -> String {
    format!("aerocom.{}.{}.{}.{}.nc", data_id, ts, var, year)
}

/// A temporary data directory, removed on drop.
pub struct CatalogDir {
    dir: TempDir,
}

impl CatalogDir {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create an empty file.
    pub fn touch(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        File::create(&path)?;
        Ok(path)
    }

    /// Create several empty files.
    pub fn touch_all<S: AsRef<str>>(&self, names: &[S]) -> io::Result<()> {
        for name in names {
            self.touch(name.as_ref())?;
        }
        Ok(())
    }

    /// Create a subdirectory.
    pub fn subdir(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Remove a file created earlier.
    pub fn remove(&self, name: &str) -> io::Result<()> {
        fs::remove_file(self.dir.path().join(name))
    }
}

/// One file per year for `var`, at resolution `ts`.
pub fn yearly_files(var: &str, vert: &str, years: std::ops::RangeInclusive<i32>, ts: &str) -> Vec<String> {
    years
        .map(|year| aerocom3_name(DATA_ID, var, vert, year, ts))
        .collect()
}
