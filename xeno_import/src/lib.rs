#![warn(clippy::all, clippy::pedantic)]
// this is intentional
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod animation;
pub mod importer;
pub mod instance;
pub mod material;
pub mod mesh;
pub mod morph;
pub mod scene;
mod session;
mod settings;
mod sink;
pub mod skeleton;
pub mod skin;
pub mod texture;
pub mod transform;

use thiserror::Error;

pub use importer::{FileKind, Importer};
pub use mesh::{DecodedMesh, MeshFeatures};
pub use scene::{MaterialId, NodeId, Scene, SceneMaterial, SceneNode, SceneTexture, TextureId};
pub use session::{ImportSession, SessionTexture, TextureLocation};
pub use settings::ImportSettings;
pub use sink::{
    AnimationTrack, Interpolation, KeySpace, MeshData, SceneSink, TextureSlot, TimeResolution,
    TransformKey, UvChannel,
};
pub use texture::{
    ExtractParams, FsTextureExtractor, TextureError, TextureErrorInner, TextureExtractor,
};

pub use xeno_bc as bc;
pub use xeno_mxmd as mxmd;
pub use xeno_sar as sar;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("error reading archive `{path}`: {error}")]
    Archive {
        path: String,
        error: xeno_sar::Error,
    },
    #[error("error reading `{path}`: {error}")]
    Class { path: String, error: xeno_bc::Error },
    #[error("error reading model `{path}`: {error}")]
    Model {
        path: String,
        error: xeno_mxmd::Error,
    },
    #[error("`{path}` holds no {class} record")]
    ClassNotFound { path: String, class: &'static str },
    #[error("motion archive `{path}` holds no animations")]
    NoMotions { path: String },
    #[error(transparent)]
    Texture(#[from] TextureError),
}

pub type Result<T> = std::result::Result<T, Error>;
