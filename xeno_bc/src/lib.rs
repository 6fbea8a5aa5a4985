#![warn(clippy::all, clippy::pedantic)]
// this is intentional
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

mod animation;
mod binary_utils;
mod skeleton;

use std::{
    borrow::Cow,
    fmt::{self, Display},
    fs,
    io::{self, ErrorKind},
    path::Path,
    result,
};

pub use animation::{Animation, Track, TrackType, TransformFrame};
pub use skeleton::{BoneTransform, Skeleton, SkeletonBone};

use byteorder::LE;
use thiserror::Error;
use tracing::debug;
use zerocopy::{byteorder::U32, FromBytes, Unaligned};

use binary_utils::{parse, parse_slice};

pub const SIGNATURE: &[u8; 4] = b"BC\0\0";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("io error reading `{path}`: {error}")]
    Io {
        path: String,
        kind: ErrorKind,
        error: String,
    },
    #[error("not a bc file: invalid signature `{0}`")]
    InvalidSignature(String),
    #[error("unsupported {ty} version {version}")]
    UnsupportedVersion { ty: Section, version: u32 },
    #[error("{ty} corrupted: {error}")]
    Corrupted { ty: Section, error: &'static str },
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Section {
    Header,
    Skeleton,
    Animation,
}

impl Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Header => "bc",
            Section::Skeleton => "skeleton record",
            Section::Animation => "animation record",
        })
    }
}

impl Error {
    fn from_io(err: &io::Error, path: &Path) -> Self {
        Self::Io {
            path: path.display().to_string(),
            kind: err.kind(),
            error: err.to_string(),
        }
    }

    fn corrupted(error: &'static str) -> Self {
        Self::Corrupted {
            ty: Section::Header,
            error,
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct Header {
    signature: [u8; 4],
    file_size: U32<LE>,
    pointer_count: U32<LE>,
    pointers_offset: U32<LE>,
    record_count: U32<LE>,
    records_offset: U32<LE>,
    reserved: [u8; 8],
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct RecordEntry {
    kind: [u8; 4],
    version: U32<LE>,
    offset: U32<LE>,
    size: U32<LE>,
}

/// Descriptor of a typed record inside a [`ChunkSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    kind: [u8; 4],
    version: u32,
    offset: usize,
    size: usize,
}

impl Record {
    #[must_use]
    pub fn kind(&self) -> &[u8; 4] {
        &self.kind
    }

    #[must_use]
    pub fn kind_str(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.kind)
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Absolute offset of the record payload.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

/// A typed record that can be read out of a [`ChunkSet`].
pub trait Class<'a>: Sized {
    const KIND: [u8; 4];
    const VERSION: u32;
    const SECTION: Section;

    /// Parses the record payload. Offsets inside the payload are absolute to `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the payload is corrupted.
    fn parse(bytes: &'a [u8], record: &Record) -> Result<Self>;
}

/// A chunked class file.
/// Either owns its bytes (stand-alone files) or is linked into bytes owned by someone else,
/// such as an archive entry.
pub struct ChunkSet<'a> {
    bytes: Cow<'a, [u8]>,
    records: Vec<Record>,
}

impl ChunkSet<'static> {
    /// Reads a stand-alone chunk file.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file can't be read or is not a valid chunk file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| Error::from_io(&err, path))?;
        Self::new(Cow::Owned(bytes))
    }
}

impl<'a> ChunkSet<'a> {
    /// Links a chunk file embedded in `bytes` without copying it.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `bytes` is not a valid chunk file or its pointer table is invalid.
    pub fn link(bytes: &'a [u8]) -> Result<Self> {
        Self::new(Cow::Borrowed(bytes))
    }

    fn new(bytes: Cow<'a, [u8]>) -> Result<Self> {
        let records = Self::parse_records(&bytes)?;
        Ok(Self { bytes, records })
    }

    fn parse_records(bytes: &[u8]) -> Result<Vec<Record>> {
        let signature = bytes
            .get(0..4)
            .ok_or_else(|| Error::corrupted("eof reading signature"))?;
        if signature != SIGNATURE {
            return Err(Error::InvalidSignature(
                String::from_utf8_lossy(signature).into_owned(),
            ));
        }

        let header: &Header =
            parse(bytes, 0).ok_or_else(|| Error::corrupted("eof reading header"))?;

        if header.file_size.get() as usize != bytes.len() {
            return Err(Error::corrupted("file size doesn't match header"));
        }

        let pointers: &[U32<LE>] = parse_slice(
            bytes,
            header.pointers_offset.get() as usize,
            header.pointer_count.get() as usize,
        )
        .ok_or_else(|| Error::corrupted("pointer table out of bounds"))?;

        for pointer in pointers {
            let target: &U32<LE> = parse(bytes, pointer.get() as usize)
                .ok_or_else(|| Error::corrupted("pointer out of bounds"))?;
            if target.get() as usize >= bytes.len() {
                return Err(Error::corrupted("pointer target out of bounds"));
            }
        }

        let entries: &[RecordEntry] = parse_slice(
            bytes,
            header.records_offset.get() as usize,
            header.record_count.get() as usize,
        )
        .ok_or_else(|| Error::corrupted("record table out of bounds"))?;

        entries
            .iter()
            .map(|entry| {
                let offset = entry.offset.get() as usize;
                let size = entry.size.get() as usize;
                if offset
                    .checked_add(size)
                    .map_or(true, |end| end > bytes.len())
                {
                    return Err(Error::corrupted("record payload out of bounds"));
                }
                Ok(Record {
                    kind: entry.kind,
                    version: entry.version.get(),
                    offset,
                    size,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns the first record of class `C`.
    /// A missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the record has an unsupported version or is corrupted.
    pub fn get_class<'s, C: Class<'s>>(&'s self) -> Result<Option<C>> {
        let record = match self.records.iter().find(|r| r.kind == C::KIND) {
            Some(record) => record,
            None => {
                debug!("no {} in chunk set", C::SECTION);
                return Ok(None);
            }
        };

        if record.version != C::VERSION {
            return Err(Error::UnsupportedVersion {
                ty: C::SECTION,
                version: record.version,
            });
        }

        C::parse(&self.bytes, record).map(Some)
    }

    /// Returns `true` if the chunk set owns its bytes.
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        matches!(self.bytes, Cow::Owned(_))
    }
}

impl<'a> fmt::Debug for ChunkSet<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkSet")
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use xeno_test_utils::{BcBuilder, SkeletonBoneSpec};

    fn one_bone() -> Vec<u8> {
        BcBuilder::new()
            .skeleton(vec![SkeletonBoneSpec::new("root", -1, [0.0; 3])])
            .build()
    }

    #[test]
    fn linked_and_standalone_agree() {
        let bytes = one_bone();
        let linked = ChunkSet::link(&bytes).unwrap();
        assert!(!linked.is_standalone());

        let path = std::env::temp_dir().join(format!("xeno_bc_{}.skl", std::process::id()));
        fs::write(&path, &bytes).unwrap();
        let standalone = ChunkSet::read(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(standalone.is_standalone());

        assert_eq!(linked.records(), standalone.records());
        assert_eq!(linked.records()[0].kind(), b"SKEL");
    }

    #[test]
    fn missing_class_is_none() {
        let bytes = one_bone();
        let chunks = ChunkSet::link(&bytes).unwrap();

        assert!(chunks.get_class::<Animation>().unwrap().is_none());
        assert!(chunks.get_class::<Skeleton>().unwrap().is_some());
    }

    #[test]
    fn unsupported_version() {
        let bytes = BcBuilder::new().raw_record(b"ANIM", 7).build();
        let chunks = ChunkSet::link(&bytes).unwrap();

        assert_eq!(
            chunks.get_class::<Animation>().unwrap_err(),
            Error::UnsupportedVersion {
                ty: Section::Animation,
                version: 7
            }
        );
    }

    #[test]
    fn dangling_pointer_fails_linking() {
        let mut bytes = one_bone();
        let pointers_offset = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        let first_pointer = pointers_offset;
        bytes[first_pointer..first_pointer + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        assert_eq!(
            ChunkSet::link(&bytes).unwrap_err(),
            Error::corrupted("pointer out of bounds")
        );
    }

    #[test]
    fn pointer_to_end_of_file_fails_linking() {
        let mut bytes = one_bone();
        let pointers_offset = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        let location =
            u32::from_le_bytes(bytes[pointers_offset..pointers_offset + 4].try_into().unwrap())
                as usize;
        let len = bytes.len() as u32;
        bytes[location..location + 4].copy_from_slice(&len.to_le_bytes());

        assert_eq!(
            ChunkSet::link(&bytes).unwrap_err(),
            Error::corrupted("pointer target out of bounds")
        );
    }

    #[test]
    fn invalid_signature() {
        let mut bytes = one_bone();
        bytes[0] = b'X';

        assert!(matches!(
            ChunkSet::link(&bytes),
            Err(Error::InvalidSignature(_))
        ));
    }
}
