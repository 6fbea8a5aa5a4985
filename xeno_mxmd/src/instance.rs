use byteorder::LE;
use zerocopy::{
    byteorder::{F32, I32, U32},
    FromBytes, Unaligned,
};

use crate::{
    binary_utils::{parse, parse_table},
    Result, Section,
};

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct InstancesHeader {
    instance_count: U32<LE>,
    instances_offset: U32<LE>,
    group_refs_offset: U32<LE>,
    group_ref_count: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct InstanceEntry {
    rows: [[F32<LE>; 4]; 4],
    group_start: U32<LE>,
    group_count: U32<LE>,
}

/// A placement of one or more mesh groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Row-major transform with the translation in the last row.
    pub rows: [[f32; 4]; 4],
    /// Mesh group indices, not validated against the group count.
    pub groups: Vec<i32>,
}

pub(crate) fn parse_instances(bytes: &[u8], offset: usize) -> Result<Vec<Instance>> {
    let corrupted = |error| Section::Instances.corrupted(error);

    let header: &InstancesHeader =
        parse(bytes, offset).ok_or_else(|| corrupted("eof reading header"))?;

    let entries: &[InstanceEntry] = parse_table(
        bytes,
        header.instances_offset.get(),
        header.instance_count.get(),
    )
    .ok_or_else(|| corrupted("instances out of bounds"))?;

    let refs: &[I32<LE>] = parse_table(
        bytes,
        header.group_refs_offset.get(),
        header.group_ref_count.get(),
    )
    .ok_or_else(|| corrupted("group refs out of bounds"))?;

    entries
        .iter()
        .map(|entry| {
            let start = entry.group_start.get() as usize;
            let groups = start
                .checked_add(entry.group_count.get() as usize)
                .and_then(|end| refs.get(start..end))
                .ok_or_else(|| corrupted("instance group range out of bounds"))?;

            Ok(Instance {
                rows: entry.rows.map(|row| row.map(|value| value.get())),
                groups: groups.iter().map(|group| group.get()).collect(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use xeno_test_utils::{translation_rows, InstanceSpec, MxmdBuilder, IDENTITY_ROWS};

    use crate::Mxmd;

    use super::*;

    fn mxmd(instances: Vec<InstanceSpec>) -> Mxmd {
        Mxmd::parse(
            MxmdBuilder {
                instances: Some(instances),
                ..MxmdBuilder::new()
            }
            .build(),
        )
        .unwrap()
    }

    #[test]
    fn instance_group_ranges() {
        let mxmd = mxmd(vec![
            InstanceSpec {
                rows: IDENTITY_ROWS,
                groups: vec![0, 2],
            },
            InstanceSpec {
                rows: translation_rows([1.0, 2.0, 3.0]),
                groups: vec![-1],
            },
        ]);
        let instances = mxmd.instances().unwrap().unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].groups, [0, 2]);
        assert_eq!(instances[1].groups, [-1]);
        assert_eq!(instances[1].rows[3], [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn group_range_past_refs() {
        let mut bytes = MxmdBuilder {
            instances: Some(vec![InstanceSpec {
                rows: IDENTITY_ROWS,
                groups: vec![1],
            }]),
            ..MxmdBuilder::new()
        }
        .build();
        // group_count of the only instance
        let count = bytes.len() - 4 - 4;
        bytes[count..count + 4].copy_from_slice(&2_u32.to_le_bytes());

        assert_eq!(
            Mxmd::parse(bytes).unwrap().instances().unwrap_err(),
            Section::Instances.corrupted("instance group range out of bounds")
        );
    }
}
