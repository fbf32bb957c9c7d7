//! OPC zip package access.
//!
//! Reading goes through `ZipArchive`; writing always produces a new archive
//! with the original entry order, where every entry that is not replaced is
//! copied with its compressed bytes untouched.

use std::io::{Cursor, Read, Write};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::FormatError;

/// An in-memory DOCX package.
#[derive(Debug, Clone)]
pub struct Package {
    bytes: Vec<u8>,
    entries: Vec<String>,
}

/// Result of rewriting a package.
#[derive(Debug, Clone)]
pub struct RewrittenPackage {
    pub bytes: Vec<u8>,
    /// Names of the entries whose content was replaced, in archive order.
    pub replaced: Vec<String>,
}

impl Package {
    /// Opens a package from raw bytes, failing when they are not a zip archive.
    pub fn open(bytes: Vec<u8>) -> Result<Self, FormatError> {
        let mut entries = Vec::new();
        {
            let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))
                .map_err(|e| FormatError::InvalidPackage(e.to_string()))?;
            for index in 0..archive.len() {
                let file = archive.by_index_raw(index).map_err(read_error)?;
                entries.push(file.name().to_string());
            }
        }
        Ok(Self { bytes, entries })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Entry names in archive order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry == name)
    }

    /// Reads the decompressed content of an entry.
    pub fn read(&self, name: &str) -> Result<Vec<u8>, FormatError> {
        let mut archive = self.archive()?;
        let mut file = archive.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => FormatError::MissingPart(name.to_string()),
            other => FormatError::ReadPart {
                part: name.to_string(),
                reason: other.to_string(),
            },
        })?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| FormatError::ReadPart {
                part: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(content)
    }

    /// Reads an entry as UTF-8 text.
    pub fn read_string(&self, name: &str) -> Result<String, FormatError> {
        let content = self.read(name)?;
        String::from_utf8(content).map_err(|e| FormatError::ReadPart {
            part: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Writes a new archive. `transform` is called with the decompressed
    /// content of every file entry accepted by `select`; returning `Some`
    /// replaces that entry, `None` copies it unchanged.
    pub fn rewrite<S, F>(&self, select: S, mut transform: F) -> Result<RewrittenPackage, FormatError>
    where
        S: Fn(&str) -> bool,
        F: FnMut(&str, &[u8]) -> Option<Vec<u8>>,
    {
        let mut archive = self.archive()?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.bytes.len())));
        let mut replaced = Vec::new();

        for index in 0..archive.len() {
            let (name, is_dir) = {
                let file = archive.by_index_raw(index).map_err(read_error)?;
                (file.name().to_string(), file.is_dir())
            };

            let replacement = if !is_dir && select(&name) {
                let mut content = Vec::new();
                archive
                    .by_index(index)
                    .map_err(read_error)?
                    .read_to_end(&mut content)
                    .map_err(|e| FormatError::ReadPart {
                        part: name.clone(),
                        reason: e.to_string(),
                    })?;
                transform(&name, &content)
            } else {
                None
            };

            let file = archive.by_index_raw(index).map_err(read_error)?;
            match replacement {
                Some(content) => {
                    let mut options =
                        SimpleFileOptions::default().compression_method(file.compression());
                    if let Some(modified) = file.last_modified() {
                        options = options.last_modified_time(modified);
                    }
                    drop(file);
                    writer
                        .start_file(name.as_str(), options)
                        .map_err(write_error)?;
                    writer
                        .write_all(&content)
                        .map_err(|e| FormatError::WritePackage(e.to_string()))?;
                    replaced.push(name);
                }
                None => writer.raw_copy_file(file).map_err(write_error)?,
            }
        }

        let cursor = writer.finish().map_err(write_error)?;
        Ok(RewrittenPackage {
            bytes: cursor.into_inner(),
            replaced,
        })
    }

    fn archive(&self) -> Result<ZipArchive<Cursor<&[u8]>>, FormatError> {
        ZipArchive::new(Cursor::new(self.bytes.as_slice()))
            .map_err(|e| FormatError::InvalidPackage(e.to_string()))
    }
}

fn read_error(e: ZipError) -> FormatError {
    FormatError::InvalidPackage(e.to_string())
}

fn write_error(e: ZipError) -> FormatError {
    FormatError::WritePackage(e.to_string())
}

/// Writes a fresh deflated archive from `(name, content)` pairs.
#[cfg(any(test, feature = "test-util"))]
pub fn write_package<'a, I>(entries: I) -> Result<Vec<u8>, FormatError>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        writer.start_file(name, options).map_err(write_error)?;
        writer
            .write_all(content)
            .map_err(|e| FormatError::WritePackage(e.to_string()))?;
    }
    let cursor = writer.finish().map_err(write_error)?;
    Ok(cursor.into_inner())
}
