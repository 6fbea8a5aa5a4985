use bitflags::bitflags;
use glam::{Vec2, Vec3, Vec4};
use tracing::{debug, debug_span};

use xeno_mxmd::{
    Attribute, AttributeKind, Error, GeomBuffers, MeshObject, Model, MorphControl, Mxmd, Result,
    Section, VertexDescriptor,
};

use crate::{
    morph::apply_morph, skin::apply_skin, transform::correct, ImportSession, MeshData,
    SceneSink, UvChannel,
};

bitflags! {
    /// Vertex features decoded for a mesh, listed in debug node names.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MeshFeatures: u8 {
        const UV1 = 1 << 0;
        const UV2 = 1 << 1;
        const UV3 = 1 << 2;
        const COLOR = 1 << 3;
        const ALPHA = 1 << 4;
        const NORMALS = 1 << 5;
        const MORPHS = 1 << 6;
        const SKIN = 1 << 7;
    }
}

impl MeshFeatures {
    fn uv_map(map: usize) -> Self {
        match map {
            1 => Self::UV1,
            2 => Self::UV2,
            3 => Self::UV3,
            _ => Self::empty(),
        }
    }

    /// Node name suffix such as `_UV1_UV2_VC_VA_NRM`.
    #[must_use]
    pub fn suffix(self) -> String {
        [
            (Self::UV1, "_UV1"),
            (Self::UV2, "_UV2"),
            (Self::UV3, "_UV3"),
            (Self::COLOR, "_VC"),
            (Self::ALPHA, "_VA"),
            (Self::NORMALS, "_NRM"),
            (Self::MORPHS, "_MRP"),
            (Self::SKIN, "_SKN"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, suffix)| *suffix)
        .collect()
    }
}

fn corrupted(error: &'static str) -> Error {
    Error::Corrupted {
        ty: Section::Geometry,
        error,
    }
}

fn keep<T>(values: Vec<T>, referenced: &[bool]) -> Vec<T> {
    values
        .into_iter()
        .zip(referenced)
        .filter_map(|(value, &referenced)| referenced.then_some(value))
        .collect()
}

fn per_vertex<T: Attribute>(descriptor: &VertexDescriptor, vertex_count: usize) -> Result<Vec<T>> {
    (0..vertex_count)
        .map(|vertex| descriptor.evaluate(vertex))
        .collect()
}

/// A mesh object decoded into the canonical vertex space.
///
/// Vertices no face refers to are dropped, the remaining ones keep their order.
/// Face buffers keep referring to the original vertex ids (corners), which
/// [`DecodedMesh::canonical`] maps to canonical ids.
#[derive(Debug, Clone)]
pub struct DecodedMesh<'a> {
    pub data: MeshData,
    vertex_count: usize,
    pub features: MeshFeatures,
    corners: Vec<[u16; 3]>,
    canonical: Vec<Option<u32>>,
    weight_ids: Option<VertexDescriptor<'a>>,
}

impl<'a> DecodedMesh<'a> {
    /// Original vertex ids of every face.
    #[must_use]
    pub fn corners(&self) -> &[[u16; 3]] {
        &self.corners
    }

    /// Canonical id of the original vertex `corner`.
    #[must_use]
    pub fn canonical(&self, corner: u16) -> Option<usize> {
        self.canonical
            .get(usize::from(corner))
            .copied()
            .flatten()
            .map(|index| index as usize)
    }

    /// Number of canonical vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Descriptor of the per-corner weight ids, if the mesh is skinned.
    #[must_use]
    pub fn weight_ids(&self) -> Option<&VertexDescriptor<'a>> {
        self.weight_ids.as_ref()
    }
}

/// Decodes the vertex and face buffers of `object`.
///
/// # Errors
///
/// Returns `Err` if the buffers referenced by the object are missing or malformed,
/// or a face refers to a vertex past the end of the vertex buffer.
pub fn decode_mesh<'a>(
    geometry: &GeomBuffers<'a>,
    object: &MeshObject,
    morph: Option<&MorphControl<'a>>,
    unit_scale: f32,
) -> Result<DecodedMesh<'a>> {
    let buffer = geometry
        .vertex_buffer(object.buffer_id)
        .ok_or_else(|| corrupted("mesh vertex buffer out of bounds"))?;
    let faces = geometry
        .face_buffer(object.uv_faces_id)
        .ok_or_else(|| corrupted("mesh face buffer out of bounds"))?;

    let vertex_count = buffer.vertex_count();
    if faces
        .max_index()
        .map_or(false, |max| usize::from(max) >= vertex_count)
    {
        return Err(corrupted("face index out of bounds"));
    }

    let mut features = MeshFeatures::empty();
    let mut positions = vec![Vec3::ZERO; vertex_count];
    let mut normals = Vec::new();
    let mut uv_channels = Vec::new();
    let mut colors = None;
    let mut alpha = None;
    let mut weight_ids = None;

    for descriptor in buffer.descriptors() {
        let kind = descriptor.kind();
        match kind {
            AttributeKind::Position => {
                positions = per_vertex::<Vec3>(descriptor, vertex_count)?
                    .into_iter()
                    .map(|position| correct(position * unit_scale))
                    .collect();
            }
            kind if kind.is_uv() => {
                let map = uv_channels.len() + 1;
                features |= MeshFeatures::uv_map(map);
                uv_channels.push(UvChannel {
                    map,
                    uvs: per_vertex::<Vec2>(descriptor, vertex_count)?
                        .into_iter()
                        .map(|uv| Vec2::new(uv.x, 1.0 - uv.y))
                        .collect(),
                });
            }
            kind if kind.is_normal() => {
                features |= MeshFeatures::NORMALS;
                normals = per_vertex::<Vec3>(descriptor, vertex_count)?
                    .into_iter()
                    .map(correct)
                    .collect();
            }
            AttributeKind::VertexColor => {
                features |= MeshFeatures::COLOR | MeshFeatures::ALPHA;
                let values = per_vertex::<Vec4>(descriptor, vertex_count)?;
                colors = Some(values.iter().map(|color| color.truncate()).collect());
                alpha = Some(values.iter().map(|color| color.w).collect());
            }
            AttributeKind::WeightId => weight_ids = Some(*descriptor),
            _ => {}
        }
    }

    if let Some(morph) = morph {
        features |= MeshFeatures::MORPHS;

        for descriptor in morph.base().descriptors() {
            match descriptor.kind() {
                AttributeKind::Position => {
                    positions = per_vertex::<Vec3>(descriptor, vertex_count)?
                        .into_iter()
                        .map(|position| correct(position * unit_scale))
                        .collect();
                }
                AttributeKind::MorphNormal => {
                    features |= MeshFeatures::NORMALS;
                    normals = per_vertex::<Vec4>(descriptor, vertex_count)?
                        .into_iter()
                        .map(|normal| correct(normal.truncate()))
                        .collect();
                }
                _ => {}
            }
        }
    }

    let corners: Vec<[u16; 3]> = faces.faces().collect();

    let mut referenced = vec![false; vertex_count];
    for &corner in corners.iter().flatten() {
        referenced[usize::from(corner)] = true;
    }

    let mut next: u32 = 0;
    let canonical: Vec<Option<u32>> = referenced
        .iter()
        .map(|&referenced| {
            referenced.then(|| {
                next += 1;
                next - 1
            })
        })
        .collect();

    let data = MeshData {
        positions: keep(positions, &referenced),
        normals: if normals.is_empty() {
            normals
        } else {
            keep(normals, &referenced)
        },
        faces: corners
            .iter()
            .map(|face| face.map(|corner| canonical[usize::from(corner)].unwrap_or_default()))
            .collect(),
        uv_channels: uv_channels
            .into_iter()
            .map(|channel| UvChannel {
                map: channel.map,
                uvs: keep(channel.uvs, &referenced),
            })
            .collect(),
        colors: colors.map(|colors| keep(colors, &referenced)),
        alpha: alpha.map(|alpha| keep(alpha, &referenced)),
    };

    Ok(DecodedMesh {
        vertex_count: next as usize,
        data,
        features,
        corners,
        canonical,
        weight_ids,
    })
}

/// Decodes every mesh object of a mesh group into mesh nodes.
///
/// Groups without geometry yield no nodes.
///
/// # Errors
///
/// Returns `Err` if the geometry of the group is corrupted.
pub fn load_meshes<S: SceneSink>(
    sink: &mut S,
    session: &mut ImportSession<S>,
    mxmd: &Mxmd,
    model: &Model,
    group: usize,
) -> Result<Vec<S::Node>> {
    let _span = debug_span!("mesh group", group).entered();

    let geometry = match mxmd.geometry(group)? {
        Some(geometry) => geometry,
        None => return Ok(Vec::new()),
    };
    let objects = model.mesh_group(group).unwrap_or_default();

    let settings = session.settings;
    let layer = format!("Group{}", group);
    let mut object_counter = 0;
    let mut nodes = Vec::with_capacity(objects.len());

    for object in objects {
        let morph = geometry.vertex_buffer_morph_targets(object.buffer_id);
        let mut mesh = decode_mesh(&geometry, object, morph, settings.unit_scale)?;

        let name = if object.gib_id == 0 {
            object_counter += 1;
            format!("Object{}", object_counter - 1)
        } else {
            format!("Part{}", object.gib_id)
        };

        let node = sink.create_mesh_node(&name, std::mem::take(&mut mesh.data));

        if object.lod_id > 0 {
            sink.set_layer(&node, &format!("{}_LOD{}", layer, object.lod_id));
        } else {
            sink.set_layer(&node, &layer);
        }

        if let Some(morph) = morph {
            apply_morph(sink, &node, morph, &mesh, model)?;
        }

        if mesh.weight_ids().is_some()
            && apply_skin(sink, session, &geometry, object, &node, &mesh)?
        {
            mesh.features |= MeshFeatures::SKIN;
        }

        if settings.debug_names {
            sink.set_name(&node, &format!("{}{}", name, mesh.features.suffix()));
        }

        if let Some(material) = session.materials.get(object.material_id) {
            sink.assign_material(&node, material);
        }

        nodes.push(node);
    }

    debug!("loaded {} meshes", nodes.len());

    Ok(nodes)
}
