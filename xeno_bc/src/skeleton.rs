use byteorder::LE;
use glam::{Quat, Vec3, Vec4};
use zerocopy::{
    byteorder::{F32, I16, U32},
    FromBytes, Unaligned,
};

use crate::{
    binary_utils::{parse, parse_slice, parse_str},
    Class, Error, Record, Result, Section,
};

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct SkeletonHeader {
    bone_count: U32<LE>,
    links_offset: U32<LE>,
    names_offset: U32<LE>,
    transforms_offset: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct NameEntry {
    name_offset: U32<LE>,
    reserved: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct RawTransform {
    position: [F32<LE>; 4],
    rotation: [F32<LE>; 4],
    scale: [F32<LE>; 4],
}

fn vec4(values: &[F32<LE>; 4]) -> Vec4 {
    Vec4::new(
        values[0].get(),
        values[1].get(),
        values[2].get(),
        values[3].get(),
    )
}

/// Local bone transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl BoneTransform {
    /// Component order: translation `xyz` (w unused), rotation `xyzw`, scale `xyz` (w unused).
    fn decode(raw: &RawTransform) -> Self {
        Self {
            translation: vec4(&raw.position).truncate(),
            rotation: Quat::from_vec4(vec4(&raw.rotation)),
            scale: vec4(&raw.scale).truncate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonBone<'a> {
    pub name: &'a str,
    /// Index of the parent bone, `-1` for roots.
    pub parent: i16,
    pub transform: BoneTransform,
}

/// Bone hierarchy of a `SKEL` record, in file order.
#[derive(Debug, Clone)]
pub struct Skeleton<'a> {
    bones: Vec<SkeletonBone<'a>>,
}

impl<'a> Skeleton<'a> {
    #[must_use]
    pub fn bones(&self) -> &[SkeletonBone<'a>] {
        &self.bones
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

impl<'a> Class<'a> for Skeleton<'a> {
    const KIND: [u8; 4] = *b"SKEL";
    const VERSION: u32 = 1;
    const SECTION: Section = Section::Skeleton;

    fn parse(bytes: &'a [u8], record: &Record) -> Result<Self> {
        let corrupted = |error| Error::Corrupted {
            ty: Section::Skeleton,
            error,
        };

        let header: &SkeletonHeader =
            parse(bytes, record.offset()).ok_or_else(|| corrupted("eof reading header"))?;
        let count = header.bone_count.get() as usize;

        let links: &[I16<LE>] = parse_slice(bytes, header.links_offset.get() as usize, count)
            .ok_or_else(|| corrupted("bone links out of bounds"))?;
        let names: &[NameEntry] = parse_slice(bytes, header.names_offset.get() as usize, count)
            .ok_or_else(|| corrupted("bone names out of bounds"))?;
        let transforms: &[RawTransform] =
            parse_slice(bytes, header.transforms_offset.get() as usize, count)
                .ok_or_else(|| corrupted("bone transforms out of bounds"))?;

        let bones = links
            .iter()
            .zip(names)
            .zip(transforms)
            .map(|((link, name), transform)| {
                Ok(SkeletonBone {
                    name: parse_str(bytes, name.name_offset.get() as usize)
                        .ok_or_else(|| corrupted("bone name out of bounds or not utf8"))?,
                    parent: link.get(),
                    transform: BoneTransform::decode(transform),
                })
            })
            .collect::<Result<_>>()?;

        Ok(Self { bones })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use xeno_test_utils::{BcBuilder, SkeletonBoneSpec};

    use crate::ChunkSet;

    use super::*;

    #[test]
    fn bones_in_file_order() {
        let mut child = SkeletonBoneSpec::new("child", 0, [0.0, 10.0, 0.0]);
        child.rotation = [0.0, 0.0, 0.707_106_8, 0.707_106_8];
        child.scale = [2.0, 2.0, 2.0];

        let bytes = BcBuilder::new()
            .skeleton(vec![
                SkeletonBoneSpec::new("root", -1, [0.0; 3]),
                child,
                SkeletonBoneSpec::new("leaf", 1, [0.0, 0.0, 5.0]),
            ])
            .build();
        let chunks = ChunkSet::link(&bytes).unwrap();
        let skeleton: Skeleton = chunks.get_class().unwrap().unwrap();

        let names: Vec<_> = skeleton.bones().iter().map(|b| b.name).collect();
        assert_eq!(names, ["root", "child", "leaf"]);

        let parents: Vec<_> = skeleton.bones().iter().map(|b| b.parent).collect();
        assert_eq!(parents, [-1, 0, 1]);

        let child = &skeleton.bones()[1].transform;
        assert_relative_eq!(child.translation, Vec3::new(0.0, 10.0, 0.0));
        assert_relative_eq!(
            child.rotation,
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            epsilon = 1e-5
        );
        assert_relative_eq!(child.scale, Vec3::splat(2.0));
    }

    #[test]
    fn truncated_bone_table_is_corrupted() {
        let bytes = BcBuilder::new()
            .skeleton(vec![SkeletonBoneSpec::new("root", -1, [0.0; 3])])
            .build();
        let chunks = ChunkSet::link(&bytes).unwrap();
        let record = chunks.records()[0].clone();

        // claim more bones than the tables hold
        let mut patched = bytes.clone();
        let offset = record.offset();
        patched[offset..offset + 4].copy_from_slice(&100_000_u32.to_le_bytes());

        assert!(matches!(
            Skeleton::parse(&patched, &record),
            Err(Error::Corrupted {
                ty: Section::Skeleton,
                ..
            })
        ));
    }
}
