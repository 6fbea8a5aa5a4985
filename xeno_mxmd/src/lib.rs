#![warn(clippy::all, clippy::pedantic)]
// this is intentional
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

mod binary_utils;
mod descriptor;
mod geometry;
mod instance;
mod material;
mod model;

use std::{
    fmt::{self, Display},
    fs,
    io::{self, ErrorKind},
    path::Path,
    result,
};

pub use descriptor::{Attribute, AttributeKind, VertexDescriptor};
pub use geometry::{
    FaceBuffer, GeomBuffers, MorphControl, MorphTarget, VertexBuffer, VertexWeight, WeightBuffer,
};
pub use instance::Instance;
pub use material::{ExternalTexture, Material, Texture, TextureFormat};
pub use model::{weight_buffer_key, Bone, MeshObject, Model};

use byteorder::LE;
use thiserror::Error;
use tracing::debug;
use zerocopy::{byteorder::U32, FromBytes, Unaligned};

use binary_utils::parse;

pub const SIGNATURE: &[u8; 4] = b"DMXM";
pub const SUPPORTED_VERSIONS: &[u32] = &[10040, 10111, 10112];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("io error reading `{path}`: {error}")]
    Io {
        path: String,
        kind: ErrorKind,
        error: String,
    },
    #[error("not a mxmd file: invalid signature `{signature}`")]
    InvalidSignature { signature: String },
    #[error("unsupported mxmd version {version}")]
    UnsupportedVersion { version: u32 },
    #[error("mxmd {ty} corrupted: {error}")]
    Corrupted { ty: Section, error: &'static str },
    #[error("{kind:?} attribute can't be decoded as {expected}")]
    AttributeMismatch {
        kind: AttributeKind,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Section {
    Header,
    Model,
    Geometry,
    VertexBuffer,
    Materials,
    Textures,
    Instances,
}

impl Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Header => "header",
            Section::Model => "model",
            Section::Geometry => "geometry",
            Section::VertexBuffer => "vertex buffer",
            Section::Materials => "materials",
            Section::Textures => "textures",
            Section::Instances => "instances",
        })
    }
}

impl Section {
    pub(crate) fn corrupted(self, error: &'static str) -> Error {
        Error::Corrupted { ty: self, error }
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
}

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
struct Header {
    signature: [u8; 4],
    version: U32<LE>,
    model_offset: U32<LE>,
    materials_offset: U32<LE>,
    geometry_offset: U32<LE>,
    textures_offset: U32<LE>,
    external_textures_offset: U32<LE>,
    instances_offset: U32<LE>,
    reserved: [U32<LE>; 4],
}

/// A model container.
/// Sections are parsed when requested, geometry one mesh group at a time.
#[derive(Clone)]
pub struct Mxmd {
    bytes: Vec<u8>,
    header: Header,
}

impl Mxmd {
    /// # Errors
    ///
    /// Returns `Err` if the file can't be read or its header is invalid.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| Error::from_io(&err, path))?;
        Self::parse(bytes)
    }

    /// # Errors
    ///
    /// Returns `Err` if the signature, version or section offsets are invalid.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let signature = bytes
            .get(0..4)
            .ok_or_else(|| Section::Header.corrupted("eof reading signature"))?;
        if signature != SIGNATURE {
            return Err(Error::InvalidSignature {
                signature: String::from_utf8_lossy(signature).into_owned(),
            });
        }

        let header: Header = parse::<Header>(&bytes, 0)
            .ok_or_else(|| Section::Header.corrupted("eof reading header"))?
            .clone();

        let version = header.version.get();
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(Error::UnsupportedVersion { version });
        }

        let offsets = [
            header.model_offset.get(),
            header.materials_offset.get(),
            header.geometry_offset.get(),
            header.textures_offset.get(),
            header.external_textures_offset.get(),
            header.instances_offset.get(),
        ];
        if offsets.iter().any(|&offset| offset as usize >= bytes.len()) {
            return Err(Section::Header.corrupted("section offset out of bounds"));
        }

        if header.textures_offset.get() != 0 && header.external_textures_offset.get() != 0 {
            return Err(Section::Textures.corrupted("both embedded and external textures present"));
        }

        debug!("mxmd version {}, {} bytes", version, bytes.len());

        Ok(Self { bytes, header })
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.header.version.get()
    }

    fn section(offset: &U32<LE>) -> Option<usize> {
        match offset.get() {
            0 => None,
            offset => Some(offset as usize),
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the model section is corrupted.
    pub fn model(&self) -> Result<Option<Model>> {
        Self::section(&self.header.model_offset)
            .map(|offset| Model::parse(&self.bytes, offset))
            .transpose()
    }

    /// Number of mesh groups with a geometry table entry.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the geometry table is corrupted.
    pub fn geometry_group_count(&self) -> Result<usize> {
        match Self::section(&self.header.geometry_offset) {
            Some(offset) => Ok(geometry::group_table(&self.bytes, offset)?.len()),
            None => Ok(0),
        }
    }

    /// Resolves the geometry buffers of one mesh group.
    /// Returns `Ok(None)` if the file has no geometry for the group.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the geometry of the group is corrupted.
    pub fn geometry(&self, group: usize) -> Result<Option<GeomBuffers>> {
        let offset = match Self::section(&self.header.geometry_offset) {
            Some(offset) => offset,
            None => return Ok(None),
        };
        let table = geometry::group_table(&self.bytes, offset)?;
        match table.get(group).map(|entry| entry.get()) {
            None | Some(0) => Ok(None),
            Some(buffers) => GeomBuffers::parse(&self.bytes, buffers as usize).map(Some),
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the material section is corrupted.
    pub fn materials(&self) -> Result<Option<Vec<Material>>> {
        Self::section(&self.header.materials_offset)
            .map(|offset| material::parse_materials(&self.bytes, offset))
            .transpose()
    }

    /// Embedded textures. Never present together with [`Mxmd::external_textures`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the texture section is corrupted.
    pub fn textures(&self) -> Result<Option<Vec<Texture>>> {
        Self::section(&self.header.textures_offset)
            .map(|offset| material::parse_textures(&self.bytes, offset))
            .transpose()
    }

    /// References into an external texture bank.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the texture section is corrupted.
    pub fn external_textures(&self) -> Result<Option<Vec<ExternalTexture>>> {
        Self::section(&self.header.external_textures_offset)
            .map(|offset| material::parse_external_textures(&self.bytes, offset))
            .transpose()
    }

    /// # Errors
    ///
    /// Returns `Err` if the instance section is corrupted.
    pub fn instances(&self) -> Result<Option<Vec<Instance>>> {
        Self::section(&self.header.instances_offset)
            .map(|offset| instance::parse_instances(&self.bytes, offset))
            .transpose()
    }
}

impl fmt::Debug for Mxmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mxmd")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use xeno_test_utils::{MxmdBuilder, TextureSpec};

    use super::*;

    #[test]
    fn empty_sections_are_none() {
        let mxmd = Mxmd::parse(MxmdBuilder::new().build()).unwrap();

        assert_eq!(mxmd.version(), 10112);
        assert!(mxmd.model().unwrap().is_none());
        assert!(mxmd.materials().unwrap().is_none());
        assert!(mxmd.geometry(0).unwrap().is_none());
        assert!(mxmd.textures().unwrap().is_none());
        assert!(mxmd.external_textures().unwrap().is_none());
        assert!(mxmd.instances().unwrap().is_none());
        assert_eq!(mxmd.geometry_group_count().unwrap(), 0);
    }

    #[test]
    fn invalid_signature() {
        let mut bytes = MxmdBuilder::new().build();
        bytes[0..4].copy_from_slice(b"XXXX");

        assert_eq!(
            Mxmd::parse(bytes).unwrap_err(),
            Error::InvalidSignature {
                signature: "XXXX".to_owned()
            }
        );
    }

    #[test]
    fn unsupported_version() {
        let builder = MxmdBuilder {
            version: 1,
            ..MxmdBuilder::new()
        };

        assert_eq!(
            Mxmd::parse(builder.build()).unwrap_err(),
            Error::UnsupportedVersion { version: 1 }
        );
    }

    #[test]
    fn textures_are_mutually_exclusive() {
        let builder = MxmdBuilder {
            textures: Some(vec![TextureSpec {
                name: "a_COL".to_owned(),
                ..TextureSpec::default()
            }]),
            external_textures: Some(vec![(0, 1)]),
            ..MxmdBuilder::new()
        };

        assert_eq!(
            Mxmd::parse(builder.build()).unwrap_err(),
            Section::Textures.corrupted("both embedded and external textures present")
        );
    }

    #[test]
    fn section_offset_past_eof() {
        let mut bytes = MxmdBuilder::new().build();
        bytes[8..12].copy_from_slice(&u32::MAX.to_le_bytes());

        assert_eq!(
            Mxmd::parse(bytes).unwrap_err(),
            Section::Header.corrupted("section offset out of bounds")
        );
    }
}
