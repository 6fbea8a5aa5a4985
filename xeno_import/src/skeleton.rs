use tracing::{debug, warn};

use xeno_bc::Skeleton;
use xeno_mxmd::Model;

use crate::{
    transform::{axis_correction, decode_transform, rows_to_mat4},
    ImportSession, SceneSink,
};

fn find_or_create_bone<S: SceneSink>(sink: &mut S, name: &str) -> (S::Node, bool) {
    match sink.find_node_by_name(name) {
        Some(node) => (node, false),
        None => (sink.create_helper(name), true),
    }
}

/// Creates or updates one node per bone of a skeleton, in file order.
///
/// Parents must precede their children. A parent that wasn't processed yet is treated as
/// missing and the bone becomes a root.
pub fn load_skeleton<S: SceneSink>(
    sink: &mut S,
    session: &ImportSession<S>,
    skeleton: &Skeleton,
) -> Vec<S::Node> {
    let unit_scale = session.settings.unit_scale;
    let mut nodes: Vec<S::Node> = Vec::with_capacity(skeleton.len());

    for (index, bone) in skeleton.bones().iter().enumerate() {
        let (node, _) = find_or_create_bone(sink, bone.name);

        let local = decode_transform(
            bone.transform.translation,
            bone.transform.rotation,
            bone.transform.scale,
            unit_scale,
        );

        let parent = if bone.parent > -1 {
            let parent = nodes.get(bone.parent as usize);
            if parent.is_none() {
                warn!(
                    "bone `{}`: parent {} not processed yet, treating as root",
                    bone.name, bone.parent
                );
            }
            parent
        } else {
            None
        };

        let world = match parent {
            Some(parent) => {
                sink.set_parent(&node, parent);
                sink.world_transform(parent) * local
            }
            None => axis_correction() * local,
        };

        sink.set_world_transform(&node, world);
        sink.set_name(&node, bone.name);
        sink.tag_bone(&node, index);
        nodes.push(node);
    }

    debug!("loaded skeleton with {} bones", nodes.len());

    nodes
}

/// Creates the nodes of the model's skin bones and records them as the session's remap table.
/// Existing nodes with the same name are reused as is.
pub fn load_model_pose<S: SceneSink>(sink: &mut S, session: &mut ImportSession<S>, model: &Model) {
    let unit_scale = session.settings.unit_scale;

    for &bone_index in model.skin_bones() {
        let bone = match model.bone(bone_index) {
            Some(bone) => bone,
            None => continue,
        };

        let (node, created) = find_or_create_bone(sink, bone.name);
        if created {
            let absolute = rows_to_mat4(&bone.rows, unit_scale);
            sink.set_world_transform(&node, axis_correction() * absolute.inverse());
        }

        session.remap_nodes.push(node);
    }

    for (skin_index, &bone_index) in model.skin_bones().iter().enumerate() {
        let parent = match model.bone(bone_index).and_then(|bone| bone.parent()) {
            Some(parent) => parent,
            None => continue,
        };
        let parent_node = model
            .bone(parent)
            .and_then(|parent| sink.find_node_by_name(parent.name));

        if let (Some(parent_node), Some(node)) = (parent_node, session.remap_nodes.get(skin_index))
        {
            sink.set_parent(node, &parent_node);
        }
    }

    debug!("loaded {} skin bones", session.remap_nodes.len());
}
