use std::path::Path;

use glam::{Mat4, Vec2, Vec3};

/// Texture slot of a host material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Diffuse,
    Specular,
    SelfIllumination,
    Reflection,
    Normal,
}

/// A UV set of a mesh, `map` is 1 based.
#[derive(Debug, Clone, PartialEq)]
pub struct UvChannel {
    pub map: usize,
    pub uvs: Vec<Vec2>,
}

/// Decoded triangle mesh, all per-vertex arrays share the face indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    /// Empty if the vertex buffer has no normals.
    pub normals: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
    pub uv_channels: Vec<UvChannel>,
    pub colors: Option<Vec<Vec3>>,
    /// Vertex color alpha, stored separately as a grayscale channel.
    pub alpha: Option<Vec<f32>>,
}

impl MeshData {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Time base of the host, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeResolution {
    pub ticks_per_second: u32,
    pub ticks_per_frame: u32,
}

impl Default for TimeResolution {
    fn default() -> Self {
        Self {
            ticks_per_second: 4800,
            ticks_per_frame: 160,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpace {
    /// Relative to the parent node.
    Local,
    World,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    /// Linear position and scale, smooth rotation.
    Smooth,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformKey {
    pub tick: i64,
    pub transform: Mat4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTrack {
    pub space: KeySpace,
    pub interpolation: Interpolation,
    pub keys: Vec<TransformKey>,
}

/// Scene construction interface of the host application.
///
/// The importer only holds the handles returned by the sink, it never owns host objects.
/// Node transforms are world space matrices in column vector form.
pub trait SceneSink {
    type Node: Clone;
    type Material: Clone;
    type Texture: Clone;

    fn find_node_by_name(&self, name: &str) -> Option<Self::Node>;

    /// Creates an empty node used as a bone.
    fn create_helper(&mut self, name: &str) -> Self::Node;

    fn create_mesh_node(&mut self, name: &str, mesh: MeshData) -> Self::Node;

    fn set_name(&mut self, node: &Self::Node, name: &str);

    fn world_transform(&self, node: &Self::Node) -> Mat4;

    fn set_world_transform(&mut self, node: &Self::Node, transform: Mat4);

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Reparents `node`, keeping its world transform.
    fn set_parent(&mut self, node: &Self::Node, parent: &Self::Node);

    /// Marks `node` as the bone `bone_index` of the skeleton, used to find animation targets.
    fn tag_bone(&mut self, node: &Self::Node, bone_index: usize);

    fn find_bone(&self, bone_index: usize) -> Option<Self::Node>;

    /// Cosmetic grouping of nodes, may be ignored.
    fn set_layer(&mut self, node: &Self::Node, layer: &str);

    fn create_material(&mut self, name: &str) -> Self::Material;

    fn assign_material(&mut self, node: &Self::Node, material: &Self::Material);

    fn create_texture(&mut self, name: &str) -> Self::Texture;

    fn set_texture_path(&mut self, texture: &Self::Texture, path: &Path);

    fn bind_texture(
        &mut self,
        material: &Self::Material,
        slot: TextureSlot,
        texture: &Self::Texture,
    );

    /// Binds layered textures that didn't fit a dedicated slot to the ambient slot.
    fn bind_composite(&mut self, material: &Self::Material, layers: &[Self::Texture]);

    fn create_skin(&mut self, node: &Self::Node, bones: &[Self::Node]);

    /// Registers the influences of one vertex, `bones` index the list given to
    /// [`SceneSink::create_skin`].
    fn add_skin_weights(
        &mut self,
        node: &Self::Node,
        vertex: usize,
        bones: [usize; 4],
        weights: [f32; 4],
    );

    fn create_morpher(&mut self, node: &Self::Node);

    fn add_morph_channel(
        &mut self,
        node: &Self::Node,
        channel: usize,
        name: &str,
        deltas: Vec<Vec3>,
    );

    /// Creates instances of `nodes` sharing their geometry, returned in the same order.
    fn instance_nodes(&mut self, nodes: &[Self::Node]) -> Vec<Self::Node>;

    fn set_animation_range(&mut self, start: i64, end: i64);

    fn set_track(&mut self, node: &Self::Node, track: AnimationTrack);

    fn time_resolution(&self) -> TimeResolution {
        TimeResolution::default()
    }
}
