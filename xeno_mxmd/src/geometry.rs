use byteorder::LE;
use itertools::Itertools;
use zerocopy::{
    byteorder::{U16, U32},
    FromBytes, Unaligned,
};

use crate::{
    binary_utils::{parse, parse_bytes, parse_table},
    AttributeKind, Result, Section, VertexDescriptor,
};

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct GeometryHeader {
    group_count: U32<LE>,
    groups_offset: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct GeomBuffersHeader {
    vertex_buffers_offset: U32<LE>,
    vertex_buffer_count: U32<LE>,
    face_buffers_offset: U32<LE>,
    face_buffer_count: U32<LE>,
    weight_buffers_offset: U32<LE>,
    weight_buffer_count: U32<LE>,
    morphs_offset: U32<LE>,
    morph_count: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct VertexBufferHeader {
    data_offset: U32<LE>,
    vertex_count: U32<LE>,
    stride: U32<LE>,
    descriptors_offset: U32<LE>,
    descriptor_count: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct DescriptorEntry {
    kind: U16<LE>,
    size: U16<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct FaceBufferHeader {
    data_offset: U32<LE>,
    index_count: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct WeightBufferHeader {
    key: U16<LE>,
    reserved: U16<LE>,
    data_offset: U32<LE>,
    weight_count: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct RawVertexWeight {
    weights: [U16<LE>; 4],
    bone_ids: [u8; 4],
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct MorphControlHeader {
    source_buffer_id: U32<LE>,
    base: VertexBufferHeader,
    targets_offset: U32<LE>,
    target_count: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct MorphTargetHeader {
    name_id: U32<LE>,
    buffer: VertexBufferHeader,
}

pub(crate) fn group_table(bytes: &[u8], offset: usize) -> Result<&[U32<LE>]> {
    let header: &GeometryHeader =
        parse(bytes, offset).ok_or_else(|| Section::Geometry.corrupted("eof reading header"))?;
    parse_table(bytes, header.groups_offset.get(), header.group_count.get())
    .ok_or_else(|| Section::Geometry.corrupted("group table out of bounds"))
}

/// Interleaved vertex data described by a list of attribute descriptors.
#[derive(Debug, Clone)]
pub struct VertexBuffer<'a> {
    vertex_count: usize,
    stride: usize,
    descriptors: Vec<VertexDescriptor<'a>>,
}

impl<'a> VertexBuffer<'a> {
    fn parse(bytes: &'a [u8], header: &VertexBufferHeader) -> Result<Self> {
        let corrupted = |error| Section::VertexBuffer.corrupted(error);

        let vertex_count = header.vertex_count.get() as usize;
        let stride = header.stride.get() as usize;

        let data = vertex_count
            .checked_mul(stride)
            .and_then(|len| parse_bytes(bytes, header.data_offset.get(), len))
            .ok_or_else(|| corrupted("vertex data out of bounds"))?;

        let entries: &[DescriptorEntry] = parse_table(
            bytes,
            header.descriptors_offset.get(),
            header.descriptor_count.get(),
        )
        .ok_or_else(|| corrupted("descriptors out of bounds"))?;

        let mut offset = 0;
        let mut descriptors = Vec::with_capacity(entries.len());

        for entry in entries {
            let kind = AttributeKind::from_code(entry.kind.get());
            let size = usize::from(entry.size.get());

            if offset + size > stride {
                return Err(corrupted("descriptor exceeds vertex stride"));
            }
            if kind.encoded_size().map_or(false, |encoded| encoded > size) {
                return Err(corrupted("descriptor smaller than its encoding"));
            }

            descriptors.push(VertexDescriptor::new(
                kind,
                data,
                stride,
                offset,
                size,
                vertex_count,
            ));
            offset += size;
        }

        Ok(Self {
            vertex_count,
            stride,
            descriptors,
        })
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[must_use]
    pub fn descriptors(&self) -> &[VertexDescriptor<'a>] {
        &self.descriptors
    }

    /// First descriptor of `kind`.
    #[must_use]
    pub fn descriptor(&self, kind: AttributeKind) -> Option<&VertexDescriptor<'a>> {
        self.descriptors.iter().find(|d| d.kind() == kind)
    }
}

/// Triangle list of 16-bit indices.
#[derive(Debug, Clone, Copy)]
pub struct FaceBuffer<'a> {
    indices: &'a [U16<LE>],
}

impl<'a> FaceBuffer<'a> {
    fn parse(bytes: &'a [u8], header: &FaceBufferHeader) -> Result<Self> {
        let index_count = header.index_count.get() as usize;
        if index_count % 3 != 0 {
            return Err(Section::Geometry.corrupted("face buffer is not a triangle list"));
        }
        let indices = parse_table(bytes, header.data_offset.get(), header.index_count.get())
            .ok_or_else(|| Section::Geometry.corrupted("face buffer out of bounds"))?;
        Ok(Self { indices })
    }

    #[must_use]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn face(&self, index: usize) -> Option<[u16; 3]> {
        let face = self.indices.get(index * 3..index * 3 + 3)?;
        Some([face[0].get(), face[1].get(), face[2].get()])
    }

    pub fn faces(&self) -> impl Iterator<Item = [u16; 3]> + 'a {
        self.indices
            .iter()
            .map(|index| index.get())
            .tuples()
            .map(|(a, b, c)| [a, b, c])
    }

    /// Largest index referenced by any face.
    #[must_use]
    pub fn max_index(&self) -> Option<u16> {
        self.indices.iter().map(|index| index.get()).max()
    }
}

/// Up to four bone influences of one vertex.
/// Bone ids index the model's skin bone table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    pub bone_ids: [u8; 4],
    pub weights: [f32; 4],
}

#[derive(Debug, Clone, Copy)]
pub struct WeightBuffer<'a> {
    key: u16,
    weights: &'a [RawVertexWeight],
}

impl<'a> WeightBuffer<'a> {
    #[must_use]
    pub fn key(&self) -> u16 {
        self.key
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<VertexWeight> {
        self.weights.get(index).map(|raw| VertexWeight {
            bone_ids: raw.bone_ids,
            weights: raw
                .weights
                .map(|weight| f32::from(weight.get()) / f32::from(u16::MAX)),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MorphTarget<'a> {
    /// Index into the model's morph name table.
    pub name_id: usize,
    pub buffer: VertexBuffer<'a>,
}

/// Base shape and sparse delta targets of one vertex buffer.
#[derive(Debug, Clone)]
pub struct MorphControl<'a> {
    source_buffer_id: usize,
    base: VertexBuffer<'a>,
    targets: Vec<MorphTarget<'a>>,
}

impl<'a> MorphControl<'a> {
    #[must_use]
    pub fn source_buffer_id(&self) -> usize {
        self.source_buffer_id
    }

    #[must_use]
    pub fn base(&self) -> &VertexBuffer<'a> {
        &self.base
    }

    #[must_use]
    pub fn targets(&self) -> &[MorphTarget<'a>] {
        &self.targets
    }
}

/// Geometry buffers of one mesh group.
#[derive(Debug, Clone)]
pub struct GeomBuffers<'a> {
    vertex_buffers: Vec<VertexBuffer<'a>>,
    face_buffers: Vec<FaceBuffer<'a>>,
    weight_buffers: Vec<WeightBuffer<'a>>,
    morphs: Vec<MorphControl<'a>>,
}

impl<'a> GeomBuffers<'a> {
    pub(crate) fn parse(bytes: &'a [u8], offset: usize) -> Result<Self> {
        let corrupted = |error| Section::Geometry.corrupted(error);

        let header: &GeomBuffersHeader =
            parse(bytes, offset).ok_or_else(|| corrupted("eof reading buffers header"))?;

        let vertex_headers: &[VertexBufferHeader] = parse_table(
            bytes,
            header.vertex_buffers_offset.get(),
            header.vertex_buffer_count.get(),
        )
        .ok_or_else(|| corrupted("vertex buffers out of bounds"))?;
        let vertex_buffers = vertex_headers
            .iter()
            .map(|header| VertexBuffer::parse(bytes, header))
            .collect::<Result<_>>()?;

        let face_headers: &[FaceBufferHeader] = parse_table(
            bytes,
            header.face_buffers_offset.get(),
            header.face_buffer_count.get(),
        )
        .ok_or_else(|| corrupted("face buffers out of bounds"))?;
        let face_buffers = face_headers
            .iter()
            .map(|header| FaceBuffer::parse(bytes, header))
            .collect::<Result<_>>()?;

        let weight_headers: &[WeightBufferHeader] = parse_table(
            bytes,
            header.weight_buffers_offset.get(),
            header.weight_buffer_count.get(),
        )
        .ok_or_else(|| corrupted("weight buffers out of bounds"))?;
        let weight_buffers = weight_headers
            .iter()
            .map(|header| {
                Ok(WeightBuffer {
                    key: header.key.get(),
                    weights: parse_table(
                        bytes,
                        header.data_offset.get(),
                        header.weight_count.get(),
                    )
                    .ok_or_else(|| corrupted("weights out of bounds"))?,
                })
            })
            .collect::<Result<_>>()?;

        let morph_headers: &[MorphControlHeader] = parse_table(
            bytes,
            header.morphs_offset.get(),
            header.morph_count.get(),
        )
        .ok_or_else(|| corrupted("morph controls out of bounds"))?;
        let morphs = morph_headers
            .iter()
            .map(|header| Self::parse_morph(bytes, header))
            .collect::<Result<_>>()?;

        Ok(Self {
            vertex_buffers,
            face_buffers,
            weight_buffers,
            morphs,
        })
    }

    fn parse_morph(bytes: &'a [u8], header: &MorphControlHeader) -> Result<MorphControl<'a>> {
        let target_headers: &[MorphTargetHeader] = parse_table(
            bytes,
            header.targets_offset.get(),
            header.target_count.get(),
        )
        .ok_or_else(|| Section::Geometry.corrupted("morph targets out of bounds"))?;

        let targets = target_headers
            .iter()
            .map(|target| {
                Ok(MorphTarget {
                    name_id: target.name_id.get() as usize,
                    buffer: VertexBuffer::parse(bytes, &target.buffer)?,
                })
            })
            .collect::<Result<_>>()?;

        Ok(MorphControl {
            source_buffer_id: header.source_buffer_id.get() as usize,
            base: VertexBuffer::parse(bytes, &header.base)?,
            targets,
        })
    }

    #[must_use]
    pub fn vertex_buffers(&self) -> &[VertexBuffer<'a>] {
        &self.vertex_buffers
    }

    #[must_use]
    pub fn vertex_buffer(&self, id: usize) -> Option<&VertexBuffer<'a>> {
        self.vertex_buffers.get(id)
    }

    #[must_use]
    pub fn face_buffer(&self, id: usize) -> Option<&FaceBuffer<'a>> {
        self.face_buffers.get(id)
    }

    /// Weight buffer selected by a skin key, see [`crate::weight_buffer_key`].
    #[must_use]
    pub fn weights_buffer(&self, key: u16) -> Option<&WeightBuffer<'a>> {
        self.weight_buffers.iter().find(|buffer| buffer.key == key)
    }

    /// Morph targets driving the vertex buffer `buffer_id`, if any.
    #[must_use]
    pub fn vertex_buffer_morph_targets(&self, buffer_id: usize) -> Option<&MorphControl<'a>> {
        self.morphs
            .iter()
            .find(|morph| morph.source_buffer_id == buffer_id)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{Vec2, Vec3};

    use xeno_test_utils::{
        GeomSpec, MorphSpec, MxmdBuilder, VertexBufferSpec, WeightBufferSpec,
    };

    use crate::{Error, Mxmd};

    use super::*;

    fn triangle() -> VertexBufferSpec {
        VertexBufferSpec::new()
            .positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
            .uvs(0, &[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]])
            .weight_ids(&[0, 1, 2])
    }

    fn builder(geometry: Vec<Option<GeomSpec>>) -> MxmdBuilder {
        MxmdBuilder {
            geometry: Some(geometry),
            ..MxmdBuilder::new()
        }
    }

    #[test]
    fn groups_resolve_lazily() {
        let mxmd = Mxmd::parse(
            builder(vec![
                None,
                Some(GeomSpec {
                    vertex_buffers: vec![triangle()],
                    face_buffers: vec![vec![0, 1, 2]],
                    weight_buffers: vec![WeightBufferSpec {
                        key: 0x0105,
                        weights: vec![([u16::MAX, 0, 0, 0], [1, 0, 0, 0])],
                    }],
                    morphs: Vec::new(),
                }),
            ])
            .build(),
        )
        .unwrap();

        assert_eq!(mxmd.geometry_group_count().unwrap(), 2);
        assert!(mxmd.geometry(0).unwrap().is_none());
        assert!(mxmd.geometry(5).unwrap().is_none());

        let geom = mxmd.geometry(1).unwrap().unwrap();
        let buffer = geom.vertex_buffer(0).unwrap();
        assert_eq!(buffer.vertex_count(), 3);
        assert_eq!(buffer.stride(), 24);

        let uvs = buffer.descriptor(AttributeKind::Uv1).unwrap();
        assert_eq!(uvs.offset(), 12);
        assert_relative_eq!(uvs.evaluate::<Vec2>(2).unwrap(), Vec2::new(0.0, 1.0));

        let positions = buffer.descriptor(AttributeKind::Position).unwrap();
        assert_relative_eq!(
            positions.evaluate::<Vec3>(1).unwrap(),
            Vec3::new(1.0, 0.0, 0.0)
        );

        let faces = geom.face_buffer(0).unwrap();
        assert_eq!(faces.index_count(), 3 * faces.face_count());
        assert_eq!(faces.face(0), Some([0, 1, 2]));
        assert_eq!(faces.max_index(), Some(2));

        let weights = geom.weights_buffer(0x0105).unwrap();
        let weight = weights.get(0).unwrap();
        assert_eq!(weight.bone_ids, [1, 0, 0, 0]);
        assert_relative_eq!(weight.weights[0], 1.0);
        assert!(geom.weights_buffer(0x0005).is_none());
    }

    #[test]
    fn morph_controls_by_source_buffer() {
        let mxmd = Mxmd::parse(
            builder(vec![Some(GeomSpec {
                vertex_buffers: vec![triangle(), triangle()],
                face_buffers: vec![vec![0, 1, 2]],
                weight_buffers: Vec::new(),
                morphs: vec![MorphSpec {
                    source_buffer_id: 1,
                    base: VertexBufferSpec::new()
                        .positions(&[[0.0; 3]; 3])
                        .morph_normals(&[[128, 128, 255, 0]; 3]),
                    targets: vec![(
                        4,
                        VertexBufferSpec::new()
                            .morph_vertex_ids(&[2])
                            .positions(&[[0.0, 0.0, 1.0]]),
                    )],
                }],
            })])
            .build(),
        )
        .unwrap();
        let geom = mxmd.geometry(0).unwrap().unwrap();

        assert!(geom.vertex_buffer_morph_targets(0).is_none());
        let morph = geom.vertex_buffer_morph_targets(1).unwrap();
        assert_eq!(morph.base().vertex_count(), 3);
        assert_eq!(morph.targets().len(), 1);

        let target = &morph.targets()[0];
        assert_eq!(target.name_id, 4);
        let ids = target.buffer.descriptor(AttributeKind::MorphVertexId).unwrap();
        assert_eq!(ids.values::<u32>().unwrap(), [2]);
        // delta buffers have their own stride
        assert_eq!(target.buffer.stride(), 16);
    }

    #[test]
    fn face_buffer_must_be_triangle_list() {
        let mxmd = Mxmd::parse(
            builder(vec![Some(GeomSpec {
                vertex_buffers: vec![triangle()],
                face_buffers: vec![vec![0, 1]],
                ..GeomSpec::default()
            })])
            .build(),
        )
        .unwrap();

        assert_eq!(
            mxmd.geometry(0).unwrap_err(),
            Section::Geometry.corrupted("face buffer is not a triangle list")
        );
    }

    #[test]
    fn descriptor_smaller_than_encoding() {
        let spec =
            VertexBufferSpec::new().attribute(AttributeKind::Position.code(), 4, vec![vec![0; 4]]);
        let mxmd = Mxmd::parse(
            builder(vec![Some(GeomSpec {
                vertex_buffers: vec![spec],
                ..GeomSpec::default()
            })])
            .build(),
        )
        .unwrap();

        assert_eq!(
            mxmd.geometry(0).unwrap_err(),
            Error::Corrupted {
                ty: Section::VertexBuffer,
                error: "descriptor smaller than its encoding"
            }
        );
    }
}
