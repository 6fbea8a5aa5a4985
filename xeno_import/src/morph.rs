use std::collections::HashMap;

use glam::Vec3;
use itertools::Itertools;
use tracing::debug;

use xeno_mxmd::{AttributeKind, Model, MorphControl, MorphTarget, Result};

use crate::{mesh::DecodedMesh, transform::correct, SceneSink};

fn target_deltas(target: &MorphTarget) -> Result<Option<(Vec<u32>, Vec<Vec3>)>> {
    let buffer = &target.buffer;
    let ids = match buffer.descriptor(AttributeKind::MorphVertexId) {
        Some(ids) => ids.values::<u32>()?,
        None => return Ok(None),
    };
    let deltas = match buffer
        .descriptor(AttributeKind::Position)
        .or_else(|| buffer.descriptor(AttributeKind::MorphPosition))
    {
        Some(deltas) => deltas.values::<Vec3>()?,
        None => return Ok(None),
    };

    Ok(Some((ids, deltas)))
}

/// Adds one morph channel per target that moves at least one vertex of the mesh.
/// Deltas are axis corrected but not scaled.
/// Returns the number of channels created.
///
/// # Errors
///
/// Returns `Err` if a target's ids or deltas can't be decoded.
pub fn apply_morph<S: SceneSink>(
    sink: &mut S,
    node: &S::Node,
    morph: &MorphControl,
    mesh: &DecodedMesh,
    model: &Model,
) -> Result<usize> {
    sink.create_morpher(node);

    let mut channel = 0;

    for target in morph.targets() {
        let (ids, deltas) = match target_deltas(target)? {
            Some(target) => target,
            None => continue,
        };

        let mut lookup = HashMap::with_capacity(ids.len());
        for (index, &id) in ids.iter().enumerate() {
            lookup.entry(id).or_insert(index);
        }

        let mut moved = vec![Vec3::ZERO; mesh.vertex_count()];
        let mut matched = 0;

        let vertices = mesh
            .corners()
            .iter()
            .flatten()
            .filter_map(|&corner| Some((corner, mesh.canonical(corner)?)))
            .unique_by(|&(_, vertex)| vertex);

        for (corner, vertex) in vertices {
            if let Some(delta) = lookup
                .get(&u32::from(corner))
                .and_then(|&index| deltas.get(index))
            {
                moved[vertex] = correct(*delta);
                matched += 1;
            }
        }

        if matched == 0 {
            continue;
        }

        let name = match model.morph_name(target.name_id) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => format!("Morph {}", channel),
        };

        debug!("morph channel {} `{}` moves {} vertices", channel, name, matched);
        sink.add_morph_channel(node, channel, &name, moved);
        channel += 1;
    }

    Ok(channel)
}
