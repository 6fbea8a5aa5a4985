use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use xeno_mxmd::{ExternalTexture, Material, Texture};

use crate::{session::SessionTexture, ImportSession, SceneSink, TextureLocation, TextureSlot};

/// Dedicated material slot of a texture, chosen by the marker in its name.
fn slot_of(name: &str) -> Option<TextureSlot> {
    [
        ("_SPM", TextureSlot::Specular),
        ("_GLO", TextureSlot::SelfIllumination),
        ("_RFM", TextureSlot::Reflection),
        ("_NRM", TextureSlot::Normal),
        ("_COL", TextureSlot::Diffuse),
    ]
    .iter()
    .find(|(marker, _)| name.contains(marker))
    .map(|(_, slot)| *slot)
}

/// Creates one host texture per texture of the model.
/// Embedded textures are preferred, a model never carries both kinds.
pub fn load_textures<S: SceneSink>(
    sink: &mut S,
    session: &mut ImportSession<S>,
    embedded: Option<&[Texture]>,
    external: Option<&[ExternalTexture]>,
) {
    let (names, location): (Vec<String>, _) = match (embedded, external) {
        (Some(textures), _) => (
            textures
                .iter()
                .map(|texture| texture.name.to_owned())
                .collect(),
            TextureLocation::Embedded,
        ),
        (None, Some(textures)) => (
            textures.iter().map(ExternalTexture::name).collect(),
            TextureLocation::Bank,
        ),
        (None, None) => return,
    };

    session.textures = names
        .into_iter()
        .map(|name| {
            let handle = sink.create_texture(&name);
            SessionTexture { name, handle }
        })
        .collect();
    session.texture_location = Some(location);

    debug!("loaded {} textures ({:?})", session.textures.len(), location);
}

/// Creates the host materials and binds their textures.
///
/// Every texture whose slot is taken or whose name has no known marker becomes a layer of
/// the composite map.
pub fn load_materials<S: SceneSink>(
    sink: &mut S,
    session: &mut ImportSession<S>,
    materials: &[Material],
) {
    for record in materials {
        let material = sink.create_material(record.name);
        let mut occupied = Vec::new();
        let mut layers = Vec::new();

        for &texture_index in &record.textures {
            let texture = match session.textures.get(texture_index) {
                Some(texture) => texture,
                None => {
                    debug!(
                        "material `{}`: texture {} out of range",
                        record.name, texture_index
                    );
                    continue;
                }
            };

            match slot_of(&texture.name) {
                Some(slot) if !occupied.contains(&slot) => {
                    sink.bind_texture(&material, slot, &texture.handle);
                    occupied.push(slot);
                }
                _ => layers.push(texture.handle.clone()),
            }
        }

        if !layers.is_empty() {
            sink.bind_composite(&material, &layers);
        }

        session.materials.push(material);
    }

    debug!("loaded {} materials", session.materials.len());
}

fn with_image_extension(base: &Path, name: &str) -> PathBuf {
    let png = base.join(format!("{}.png", name));
    if png.is_file() {
        png
    } else {
        base.join(format!("{}.dds", name))
    }
}

/// Directory the embedded textures of `model_path` are extracted to.
#[must_use]
pub fn extraction_dir(model_path: &Path) -> PathBuf {
    let stem = model_path.file_stem().unwrap_or_default();
    model_path.with_file_name(stem)
}

/// Points every texture of the session at its image file.
///
/// Embedded textures live in [`extraction_dir`], bank textures in the `textures` directory
/// next to the model's directory.
pub fn resolve_texture_paths<S: SceneSink>(
    sink: &mut S,
    session: &ImportSession<S>,
    model_path: &Path,
) {
    let base = match session.texture_location {
        Some(TextureLocation::Embedded) => extraction_dir(model_path),
        Some(TextureLocation::Bank) => {
            let model_dir = model_path.parent().unwrap_or_else(|| Path::new(""));
            match model_dir.parent() {
                Some(parent) => parent.join("textures"),
                None => {
                    warn!("model directory has no parent, looking for textures next to it");
                    model_dir.join("textures")
                }
            }
        }
        None => return,
    };

    for texture in &session.textures {
        let path = with_image_extension(&base, &texture.name);
        sink.set_texture_path(&texture.handle, &path);
    }
}
