#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::{
    collections::HashSet,
    fmt, fs,
    io::{self, ErrorKind},
    path::Path,
    slice::Iter,
    str,
};

use byteorder::LE;
use thiserror::Error;
use tracing::debug;
use zerocopy::{byteorder::U32, FromBytes, LayoutVerified, Unaligned};

pub const SIGNATURE: &[u8; 4] = b"1RAS";
pub const VERSION: u32 = 0x1000;

#[derive(Debug, PartialEq, FromBytes, Unaligned)]
#[repr(C)]
struct Header {
    signature: [u8; 4],
    file_size: U32<LE>,
    version: U32<LE>,
    entry_count: U32<LE>,
    toc_offset: U32<LE>,
    data_offset: U32<LE>,
    reserved: [u8; 8],
    path: [u8; 32],
}

#[derive(Debug, PartialEq, FromBytes, Unaligned)]
#[repr(C)]
struct TocEntry {
    offset: U32<LE>,
    size: U32<LE>,
    hash: U32<LE>,
    name: [u8; 52],
}

/// An error that can happen during reading an [`Archive`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("io error reading `{path}`: {error}")]
    Io {
        path: String,
        kind: ErrorKind,
        error: String,
    },
    #[error("not a sar archive: invalid signature `{0}`")]
    InvalidSignature(String),
    #[error("unsupported sar version {0:#x}")]
    UnsupportedVersion(u32),
    #[error("corrupted sar: {0}")]
    Corrupted(&'static str),
    #[error("corrupted sar: duplicate entry `{0}`")]
    DuplicateEntry(String),
}

impl Error {
    fn from_io(err: &io::Error, path: &Path) -> Self {
        Self::Io {
            path: path.display().to_string(),
            kind: err.kind(),
            error: err.to_string(),
        }
    }

    /// Returns `true` if the error was caused by a missing file.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Io {
                kind: ErrorKind::NotFound,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

fn parse<T: Unaligned>(bytes: &[u8], offset: usize) -> Option<LayoutVerified<&[u8], T>> {
    bytes
        .get(offset..)
        .and_then(LayoutVerified::new_unaligned_from_prefix)
        .map(|(verified, _)| verified)
}

fn nul_str(bytes: &[u8]) -> &[u8] {
    bytes.split(|&b| b == 0).next().unwrap_or_default()
}

/// A named file inside an [`Archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: String,
    offset: usize,
    size: usize,
    hash: u32,
}

impl Entry {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    fn has_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.name
            .rsplit_once('.')
            .map_or(false, |(_, ext)| ext.eq_ignore_ascii_case(extension))
    }
}

/// A SAR archive, kept in memory.
/// Entries keep the order of the table of contents.
#[derive(Clone)]
pub struct Archive {
    path: String,
    bytes: Vec<u8>,
    entries: Vec<Entry>,
}

impl Archive {
    /// Read an [`Archive`] from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file can't be read or is not a valid sar archive.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| Error::from_io(&err, path))?;
        Self::parse(bytes)
    }

    /// Parse an [`Archive`] from an owned byte buffer.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the header or the table of contents is invalid.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let header: LayoutVerified<_, Header> =
            parse(&bytes, 0).ok_or(Error::Corrupted("eof reading header"))?;

        if &header.signature != SIGNATURE {
            return Err(Error::InvalidSignature(
                String::from_utf8_lossy(&header.signature).into_owned(),
            ));
        }

        let version = header.version.get();
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        if header.file_size.get() as usize != bytes.len() {
            return Err(Error::Corrupted("file size doesn't match header"));
        }

        let entry_count = header.entry_count.get() as usize;
        let toc_offset = header.toc_offset.get() as usize;
        let data_offset = header.data_offset.get() as usize;

        let toc: LayoutVerified<_, [TocEntry]> = bytes
            .get(toc_offset..)
            .and_then(|toc| LayoutVerified::new_slice_unaligned_from_prefix(toc, entry_count))
            .map(|(toc, _)| toc)
            .ok_or(Error::Corrupted("table of contents out of bounds"))?;

        let mut names = HashSet::with_capacity(entry_count);
        let mut entries = Vec::with_capacity(entry_count);

        for toc_entry in toc.iter() {
            let name = str::from_utf8(nul_str(&toc_entry.name))
                .map_err(|_| Error::Corrupted("entry name is not valid utf8"))?
                .to_owned();

            let offset = toc_entry.offset.get() as usize;
            let size = toc_entry.size.get() as usize;

            if offset < data_offset
                || offset
                    .checked_add(size)
                    .map_or(true, |end| end > bytes.len())
            {
                return Err(Error::Corrupted("entry data out of bounds"));
            }

            if !names.insert(name.clone()) {
                return Err(Error::DuplicateEntry(name));
            }

            entries.push(Entry {
                name,
                offset,
                size,
                hash: toc_entry.hash.get(),
            });
        }

        let path = String::from_utf8_lossy(nul_str(&header.path)).into_owned();
        debug!("sar `{}`: {} entries", path, entries.len());

        Ok(Self {
            path,
            bytes,
            entries,
        })
    }

    /// The path stored in the archive header.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over the entries in table of contents order.
    pub fn entries(&self) -> Iter<Entry> {
        self.entries.iter()
    }

    /// Index of the first entry whose name ends with `extension`.
    /// The extension can be given with or without the leading dot.
    #[must_use]
    pub fn file_index_from_extension(&self, extension: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.has_extension(extension))
    }

    #[must_use]
    pub fn file_name(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(Entry::name)
    }

    /// Returns the bytes of the entry at `index`.
    #[must_use]
    pub fn file(&self, index: usize) -> Option<&[u8]> {
        self.entries
            .get(index)
            .map(|entry| &self.bytes[entry.offset..entry.offset + entry.size])
    }

    #[must_use]
    pub fn file_by_name(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .and_then(|index| self.file(index))
    }
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}
