use std::{
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use fs_err::File;
use serde::{de::DeserializeOwned, Serialize};

/// Runs `parse` on the file at `path`, naming the file and the target type
/// in the error.
fn parse_file<T>(
    path: &Path,
    parse: impl FnOnce(&Path) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    parse(path).with_context(|| {
        format!(
            "Failed to load {} from {path:?}",
            std::any::type_name::<T>()
        )
    })
}

/// Histories and other pipeline outputs.
pub fn read_json<P: Into<PathBuf>, T: DeserializeOwned>(path: P) -> anyhow::Result<T> {
    parse_file(&path.into(), |path| {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    })
}

/// Writes the whole value at once; the file is truncated first.
pub fn write_json<P: Into<PathBuf>, T: Serialize>(path: P, value: &T) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Hand-edited configuration, such as the scraping session.
pub fn read_toml<P: Into<PathBuf>, T: DeserializeOwned>(path: P) -> anyhow::Result<T> {
    parse_file(&path.into(), |path| {
        Ok(toml::from_str(&fs_err::read_to_string(path)?)?)
    })
}
