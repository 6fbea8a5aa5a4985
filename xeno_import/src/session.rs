use std::collections::HashMap;

use crate::{ImportSettings, SceneSink};

/// Where the images of the model's textures live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureLocation {
    /// Extracted to a directory named after the model.
    Embedded,
    /// In the shared `textures` directory next to the model directory.
    Bank,
}

#[derive(Debug, Clone)]
pub struct SessionTexture<T> {
    pub name: String,
    pub handle: T,
}

/// State shared by the stages of one import.
#[derive(Debug)]
pub struct ImportSession<S: SceneSink> {
    pub(crate) settings: ImportSettings,
    /// Nodes of the model's skin bones, indexed by skin bone id.
    pub(crate) remap_nodes: Vec<S::Node>,
    pub(crate) textures: Vec<SessionTexture<S::Texture>>,
    pub(crate) texture_location: Option<TextureLocation>,
    pub(crate) materials: Vec<S::Material>,
    /// Nodes of mesh groups that were already decoded, keyed by group index.
    pub(crate) group_nodes: HashMap<usize, Vec<S::Node>>,
    /// Names of the motions found in a motion archive.
    pub(crate) motions: Vec<String>,
}

impl<S: SceneSink> ImportSession<S> {
    #[must_use]
    pub fn new(settings: ImportSettings) -> Self {
        Self {
            settings,
            remap_nodes: Vec::new(),
            textures: Vec::new(),
            texture_location: None,
            materials: Vec::new(),
            group_nodes: HashMap::new(),
            motions: Vec::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    #[must_use]
    pub fn remap_nodes(&self) -> &[S::Node] {
        &self.remap_nodes
    }

    #[must_use]
    pub fn textures(&self) -> &[SessionTexture<S::Texture>] {
        &self.textures
    }

    #[must_use]
    pub fn texture_location(&self) -> Option<TextureLocation> {
        self.texture_location
    }

    #[must_use]
    pub fn materials(&self) -> &[S::Material] {
        &self.materials
    }

    #[must_use]
    pub fn motions(&self) -> &[String] {
        &self.motions
    }
}
