use itertools::Itertools;
use tracing::{debug, warn};

use xeno_mxmd::{GeomBuffers, MeshObject, Result};

use crate::{mesh::DecodedMesh, ImportSession, SceneSink};

/// Binds `node` to the session's skin bones.
///
/// A mesh of a model with a single skin bone is parented to that bone instead.
/// Returns whether a skin was created.
///
/// # Errors
///
/// Returns `Err` if a weight id can't be decoded.
pub fn apply_skin<S: SceneSink>(
    sink: &mut S,
    session: &ImportSession<S>,
    geometry: &GeomBuffers,
    object: &MeshObject,
    node: &S::Node,
    mesh: &DecodedMesh,
) -> Result<bool> {
    let bones = &session.remap_nodes;

    match bones.len() {
        0 => return Ok(false),
        1 => {
            sink.set_parent(node, &bones[0]);
            return Ok(false);
        }
        _ => {}
    }

    let weight_ids = match mesh.weight_ids() {
        Some(weight_ids) => weight_ids,
        None => return Ok(false),
    };

    let key = object.weight_key();
    let weights = match geometry.weights_buffer(key) {
        Some(weights) => weights,
        None => {
            warn!("no weight buffer with key {:#06x}, mesh left unskinned", key);
            return Ok(false);
        }
    };

    sink.create_skin(node, bones);

    let mut registered = 0;

    let vertices = mesh
        .corners()
        .iter()
        .flatten()
        .filter_map(|&corner| Some((corner, mesh.canonical(corner)?)))
        .unique_by(|&(_, vertex)| vertex);

    for (corner, vertex) in vertices {
        let weight_id: u16 = weight_ids.evaluate(usize::from(corner))?;
        let weight = match weights.get(usize::from(weight_id)) {
            Some(weight) => weight,
            None => {
                warn!("vertex {}: weight {} out of range", vertex, weight_id);
                continue;
            }
        };

        let bone_ids = weight.bone_ids.map(usize::from);
        if let Some(&bone) = bone_ids.iter().find(|&&bone| bone >= bones.len()) {
            warn!("vertex {}: skin bone {} out of range", vertex, bone);
            continue;
        }

        sink.add_skin_weights(node, vertex, bone_ids, weight.weights);
        registered += 1;
    }

    debug!(
        "skinned {} vertices to {} bones with weight buffer {:#06x}",
        registered,
        bones.len(),
        key
    );

    Ok(true)
}
