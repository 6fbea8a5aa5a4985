use byteorder::LE;
use zerocopy::{
    byteorder::{F32, I32, U16, U32},
    FromBytes, Unaligned,
};

use crate::{
    binary_utils::{parse, parse_str, parse_table},
    Result, Section,
};

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct ModelHeader {
    groups_offset: U32<LE>,
    group_count: U32<LE>,
    bones_offset: U32<LE>,
    bone_count: U32<LE>,
    skin_bones_offset: U32<LE>,
    skin_bone_count: U32<LE>,
    morph_names_offset: U32<LE>,
    morph_name_count: U32<LE>,
    reserved: [U32<LE>; 2],
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct GroupEntry {
    objects_offset: U32<LE>,
    object_count: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct MeshObjectEntry {
    buffer_id: U16<LE>,
    uv_faces_id: U16<LE>,
    material_id: U16<LE>,
    lod_id: U16<LE>,
    gib_id: U16<LE>,
    skin_desc: U16<LE>,
    reserved: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct BoneEntry {
    name_offset: U32<LE>,
    parent: I32<LE>,
    rows: [[F32<LE>; 4]; 4],
}

/// Key of the weight buffer used by meshes of level of detail `lod` with skin descriptor
/// `skin_desc`.
#[must_use]
pub fn weight_buffer_key(lod: u16, skin_desc: u16) -> u16 {
    ((lod << 8) & 0xff00) | (skin_desc & 0x00ff)
}

/// One drawable mesh of a mesh group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshObject {
    pub buffer_id: usize,
    pub uv_faces_id: usize,
    pub material_id: usize,
    pub lod_id: u16,
    /// Breakable part index, 0 for regular meshes.
    pub gib_id: u16,
    pub skin_desc: u16,
}

impl MeshObject {
    #[must_use]
    pub fn weight_key(&self) -> u16 {
        weight_buffer_key(self.lod_id, self.skin_desc)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone<'a> {
    pub name: &'a str,
    /// Index of the parent bone, negative for roots.
    pub parent: i32,
    /// Absolute bind pose, row-major with the translation in the last row.
    pub rows: [[f32; 4]; 4],
}

impl<'a> Bone<'a> {
    #[must_use]
    pub fn parent(&self) -> Option<usize> {
        usize::try_from(self.parent).ok()
    }
}

/// Mesh groups, the bind pose skeleton and morph names of a model.
#[derive(Debug, Clone)]
pub struct Model<'a> {
    mesh_groups: Vec<Vec<MeshObject>>,
    bones: Vec<Bone<'a>>,
    skin_bones: Vec<usize>,
    morph_names: Vec<&'a str>,
}

impl<'a> Model<'a> {
    pub(crate) fn parse(bytes: &'a [u8], offset: usize) -> Result<Self> {
        let corrupted = |error| Section::Model.corrupted(error);

        let header: &ModelHeader =
            parse(bytes, offset).ok_or_else(|| corrupted("eof reading header"))?;

        let groups: &[GroupEntry] = parse_table(
            bytes,
            header.groups_offset.get(),
            header.group_count.get(),
        )
        .ok_or_else(|| corrupted("mesh groups out of bounds"))?;

        let mesh_groups = groups
            .iter()
            .map(|group| {
                let objects: &[MeshObjectEntry] = parse_table(
                    bytes,
                    group.objects_offset.get(),
                    group.object_count.get(),
                )
                .ok_or_else(|| corrupted("mesh objects out of bounds"))?;

                Ok(objects
                    .iter()
                    .map(|object| MeshObject {
                        buffer_id: usize::from(object.buffer_id.get()),
                        uv_faces_id: usize::from(object.uv_faces_id.get()),
                        material_id: usize::from(object.material_id.get()),
                        lod_id: object.lod_id.get(),
                        gib_id: object.gib_id.get(),
                        skin_desc: object.skin_desc.get(),
                    })
                    .collect())
            })
            .collect::<Result<_>>()?;

        let bone_entries: &[BoneEntry] = parse_table(
            bytes,
            header.bones_offset.get(),
            header.bone_count.get(),
        )
        .ok_or_else(|| corrupted("bones out of bounds"))?;

        let bones = bone_entries
            .iter()
            .map(|bone| {
                Ok(Bone {
                    name: parse_str(bytes, bone.name_offset.get())
                        .ok_or_else(|| corrupted("bone name out of bounds"))?,
                    parent: bone.parent.get(),
                    rows: bone.rows.map(|row| row.map(|value| value.get())),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if bones
            .iter()
            .filter_map(Bone::parent)
            .any(|parent| parent >= bones.len())
        {
            return Err(corrupted("bone parent out of bounds"));
        }

        let skin_entries: &[U16<LE>] = parse_table(
            bytes,
            header.skin_bones_offset.get(),
            header.skin_bone_count.get(),
        )
        .ok_or_else(|| corrupted("skin bones out of bounds"))?;

        let skin_bones: Vec<usize> = skin_entries
            .iter()
            .map(|index| usize::from(index.get()))
            .collect();
        if skin_bones.iter().any(|&index| index >= bones.len()) {
            return Err(corrupted("skin bone index out of bounds"));
        }

        let name_offsets: &[U32<LE>] = parse_table(
            bytes,
            header.morph_names_offset.get(),
            header.morph_name_count.get(),
        )
        .ok_or_else(|| corrupted("morph names out of bounds"))?;

        let morph_names = name_offsets
            .iter()
            .map(|offset| {
                parse_str(bytes, offset.get())
                    .ok_or_else(|| corrupted("morph name out of bounds"))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            mesh_groups,
            bones,
            skin_bones,
            morph_names,
        })
    }

    #[must_use]
    pub fn mesh_groups(&self) -> &[Vec<MeshObject>] {
        &self.mesh_groups
    }

    #[must_use]
    pub fn mesh_group(&self, index: usize) -> Option<&[MeshObject]> {
        self.mesh_groups.get(index).map(Vec::as_slice)
    }

    #[must_use]
    pub fn bones(&self) -> &[Bone<'a>] {
        &self.bones
    }

    #[must_use]
    pub fn bone(&self, index: usize) -> Option<&Bone<'a>> {
        self.bones.get(index)
    }

    /// Maps skin bone ids used by vertex weights to indices into [`Model::bones`].
    #[must_use]
    pub fn skin_bones(&self) -> &[usize] {
        &self.skin_bones
    }

    #[must_use]
    pub fn morph_name(&self, id: usize) -> Option<&'a str> {
        self.morph_names.get(id).copied()
    }
}
