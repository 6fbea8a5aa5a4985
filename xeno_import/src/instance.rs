use tracing::{debug, warn};

use xeno_mxmd::{Instance, Model, Mxmd, Result};

use crate::{
    mesh::load_meshes,
    skeleton::load_model_pose,
    transform::{axis_correction, rows_to_mat4},
    ImportSession, SceneSink,
};

/// Places the mesh groups referenced by every instance.
///
/// The first reference to a group decodes it, later references duplicate the decoded nodes
/// with [`SceneSink::instance_nodes`]. Out of range group indices are skipped.
///
/// # Errors
///
/// Returns `Err` if the geometry of a referenced group is corrupted.
pub fn load_instances<S: SceneSink>(
    sink: &mut S,
    session: &mut ImportSession<S>,
    mxmd: &Mxmd,
    model: &Model,
    instances: &[Instance],
) -> Result<()> {
    let group_count = model.mesh_groups().len();
    let axis = axis_correction();
    let mut placed = 0;

    for (index, instance) in instances.iter().enumerate() {
        let transform =
            axis * rows_to_mat4(&instance.rows, session.settings.unit_scale) * axis.inverse();

        for &group in &instance.groups {
            if group < 0 || group as usize >= group_count {
                warn!("instance {}: mesh group {} out of range", index, group);
                continue;
            }
            let group = group as usize;

            let cached = session.group_nodes.get(&group).cloned();
            let nodes = match cached {
                Some(cached) if !cached.is_empty() => sink.instance_nodes(&cached),
                _ => {
                    let nodes = load_meshes(sink, session, mxmd, model, group)?;
                    session.group_nodes.insert(group, nodes.clone());
                    nodes
                }
            };

            for node in &nodes {
                sink.set_world_transform(node, transform);
            }
            placed += 1;
        }
    }

    debug!(
        "placed {} group references, {} groups decoded",
        placed,
        session.group_nodes.len()
    );

    Ok(())
}

/// Loads the skin bones and every mesh group once, for models without instances.
///
/// # Errors
///
/// Returns `Err` if the geometry of a group is corrupted.
pub fn load_models<S: SceneSink>(
    sink: &mut S,
    session: &mut ImportSession<S>,
    mxmd: &Mxmd,
    model: &Model,
) -> Result<()> {
    load_model_pose(sink, session, model);

    for group in 0..model.mesh_groups().len() {
        let nodes = load_meshes(sink, session, mxmd, model, group)?;
        session.group_nodes.insert(group, nodes);
    }

    Ok(())
}
