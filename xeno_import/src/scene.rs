use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
    sync::Arc,
};

use glam::{Mat4, Vec3};

use crate::{AnimationTrack, MeshData, SceneSink, TextureSlot, TimeResolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(usize);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skin {
    pub bones: Vec<NodeId>,
    /// Influences keyed by vertex.
    pub weights: BTreeMap<usize, ([usize; 4], [f32; 4])>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphChannel {
    pub index: usize,
    pub name: String,
    pub deltas: Vec<Vec3>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub world: Mat4,
    pub layer: Option<String>,
    /// Shared between a node and its instances.
    pub mesh: Option<Arc<MeshData>>,
    pub material: Option<MaterialId>,
    pub skin: Option<Skin>,
    /// `None` if the node has no morpher.
    pub morph_channels: Option<Vec<MorphChannel>>,
    pub bone_index: Option<usize>,
    pub track: Option<AnimationTrack>,
    /// Node this one was instanced from.
    pub instance_of: Option<NodeId>,
}

impl SceneNode {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            parent: None,
            world: Mat4::IDENTITY,
            layer: None,
            mesh: None,
            material: None,
            skin: None,
            morph_channels: None,
            bone_index: None,
            track: None,
            instance_of: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneMaterial {
    pub name: String,
    pub slots: Vec<(TextureSlot, TextureId)>,
    /// Layers bound to the ambient slot.
    pub composite: Vec<TextureId>,
}

impl SceneMaterial {
    #[must_use]
    pub fn slot(&self, slot: TextureSlot) -> Option<TextureId> {
        self.slots
            .iter()
            .find(|(bound, _)| *bound == slot)
            .map(|(_, texture)| *texture)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneTexture {
    pub name: String,
    pub path: Option<PathBuf>,
}

/// An in-memory scene graph.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    materials: Vec<SceneMaterial>,
    textures: Vec<SceneTexture>,
    animation_range: Option<(i64, i64)>,
    resolution: TimeResolution,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_time_resolution(resolution: TimeResolution) -> Self {
        Self {
            resolution,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// # Panics
    ///
    /// Panics if `id` belongs to another scene.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut SceneNode {
        &mut self.nodes[id.0]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// First node named `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(NodeId)
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node_ids()
            .filter(move |&child| self.node(child).parent == Some(id))
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_ids()
            .filter(move |&node| self.node(node).parent.is_none())
    }

    /// # Panics
    ///
    /// Panics if `id` belongs to another scene.
    #[must_use]
    pub fn material(&self, id: MaterialId) -> &SceneMaterial {
        &self.materials[id.0]
    }

    #[must_use]
    pub fn materials(&self) -> &[SceneMaterial] {
        &self.materials
    }

    /// # Panics
    ///
    /// Panics if `id` belongs to another scene.
    #[must_use]
    pub fn texture(&self, id: TextureId) -> &SceneTexture {
        &self.textures[id.0]
    }

    #[must_use]
    pub fn textures(&self) -> &[SceneTexture] {
        &self.textures
    }

    #[must_use]
    pub fn animation_range(&self) -> Option<(i64, i64)> {
        self.animation_range
    }

    fn push(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn fmt_node(&self, f: &mut Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
        let node = self.node(id);
        write!(f, "{:indent$}{}", "", node.name, indent = depth * 2)?;

        if let Some(bone) = node.bone_index {
            write!(f, " [bone {}]", bone)?;
        }
        if let Some(mesh) = &node.mesh {
            write!(
                f,
                " [mesh: {} vertices, {} faces]",
                mesh.vertex_count(),
                mesh.faces.len()
            )?;
        }
        if let Some(material) = node.material {
            write!(f, " [material `{}`]", self.material(material).name)?;
        }
        if let Some(skin) = &node.skin {
            write!(f, " [skin: {} bones]", skin.bones.len())?;
        }
        if let Some(channels) = &node.morph_channels {
            write!(f, " [morphs: {}]", channels.len())?;
        }
        if let Some(track) = &node.track {
            write!(f, " [track: {} keys]", track.keys.len())?;
        }
        if let Some(source) = node.instance_of {
            write!(f, " [instance of `{}`]", self.node(source).name)?;
        }
        writeln!(f)?;

        for child in self.children(id) {
            self.fmt_node(f, child, depth + 1)?;
        }

        Ok(())
    }
}

impl Display for Scene {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for root in self.roots() {
            self.fmt_node(f, root, 0)?;
        }

        for material in &self.materials {
            write!(f, "material `{}`", material.name)?;
            for (slot, texture) in &material.slots {
                write!(f, " {:?}=`{}`", slot, self.texture(*texture).name)?;
            }
            if !material.composite.is_empty() {
                write!(f, " composite={}", material.composite.len())?;
            }
            writeln!(f)?;
        }

        for texture in &self.textures {
            match &texture.path {
                Some(path) => writeln!(f, "texture `{}` -> {}", texture.name, path.display())?,
                None => writeln!(f, "texture `{}`", texture.name)?,
            }
        }

        if let Some((start, end)) = self.animation_range {
            writeln!(f, "animation {}..={}", start, end)?;
        }

        Ok(())
    }
}

impl SceneSink for Scene {
    type Node = NodeId;
    type Material = MaterialId;
    type Texture = TextureId;

    fn find_node_by_name(&self, name: &str) -> Option<NodeId> {
        self.find(name)
    }

    fn create_helper(&mut self, name: &str) -> NodeId {
        self.push(SceneNode::new(name))
    }

    fn create_mesh_node(&mut self, name: &str, mesh: MeshData) -> NodeId {
        self.push(SceneNode {
            mesh: Some(Arc::new(mesh)),
            ..SceneNode::new(name)
        })
    }

    fn set_name(&mut self, node: &NodeId, name: &str) {
        self.node_mut(*node).name = name.to_owned();
    }

    fn world_transform(&self, node: &NodeId) -> Mat4 {
        self.node(*node).world
    }

    fn set_world_transform(&mut self, node: &NodeId, transform: Mat4) {
        self.node_mut(*node).world = transform;
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.node(*node).parent
    }

    fn set_parent(&mut self, node: &NodeId, parent: &NodeId) {
        if node != parent {
            self.node_mut(*node).parent = Some(*parent);
        }
    }

    fn tag_bone(&mut self, node: &NodeId, bone_index: usize) {
        self.node_mut(*node).bone_index = Some(bone_index);
    }

    fn find_bone(&self, bone_index: usize) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.bone_index == Some(bone_index))
            .map(NodeId)
    }

    fn set_layer(&mut self, node: &NodeId, layer: &str) {
        self.node_mut(*node).layer = Some(layer.to_owned());
    }

    fn create_material(&mut self, name: &str) -> MaterialId {
        self.materials.push(SceneMaterial {
            name: name.to_owned(),
            slots: Vec::new(),
            composite: Vec::new(),
        });
        MaterialId(self.materials.len() - 1)
    }

    fn assign_material(&mut self, node: &NodeId, material: &MaterialId) {
        self.node_mut(*node).material = Some(*material);
    }

    fn create_texture(&mut self, name: &str) -> TextureId {
        self.textures.push(SceneTexture {
            name: name.to_owned(),
            path: None,
        });
        TextureId(self.textures.len() - 1)
    }

    fn set_texture_path(&mut self, texture: &TextureId, path: &Path) {
        self.textures[texture.0].path = Some(path.to_owned());
    }

    fn bind_texture(&mut self, material: &MaterialId, slot: TextureSlot, texture: &TextureId) {
        let slots = &mut self.materials[material.0].slots;
        slots.retain(|(bound, _)| *bound != slot);
        slots.push((slot, *texture));
    }

    fn bind_composite(&mut self, material: &MaterialId, layers: &[TextureId]) {
        self.materials[material.0].composite = layers.to_vec();
    }

    fn create_skin(&mut self, node: &NodeId, bones: &[NodeId]) {
        self.node_mut(*node).skin = Some(Skin {
            bones: bones.to_vec(),
            weights: BTreeMap::new(),
        });
    }

    fn add_skin_weights(
        &mut self,
        node: &NodeId,
        vertex: usize,
        bones: [usize; 4],
        weights: [f32; 4],
    ) {
        if let Some(skin) = &mut self.node_mut(*node).skin {
            skin.weights.insert(vertex, (bones, weights));
        }
    }

    fn create_morpher(&mut self, node: &NodeId) {
        self.node_mut(*node).morph_channels.get_or_insert_with(Vec::new);
    }

    fn add_morph_channel(&mut self, node: &NodeId, channel: usize, name: &str, deltas: Vec<Vec3>) {
        self.node_mut(*node)
            .morph_channels
            .get_or_insert_with(Vec::new)
            .push(MorphChannel {
                index: channel,
                name: name.to_owned(),
                deltas,
            });
    }

    fn instance_nodes(&mut self, nodes: &[NodeId]) -> Vec<NodeId> {
        nodes
            .iter()
            .map(|&source| {
                let node = self.node(source);
                let instance = SceneNode {
                    world: node.world,
                    layer: node.layer.clone(),
                    mesh: node.mesh.clone(),
                    material: node.material,
                    instance_of: Some(source),
                    ..SceneNode::new(&node.name)
                };
                self.push(instance)
            })
            .collect()
    }

    fn set_animation_range(&mut self, start: i64, end: i64) {
        self.animation_range = Some((start, end));
    }

    fn set_track(&mut self, node: &NodeId, track: AnimationTrack) {
        self.node_mut(*node).track = Some(track);
    }

    fn time_resolution(&self) -> TimeResolution {
        self.resolution
    }
}
