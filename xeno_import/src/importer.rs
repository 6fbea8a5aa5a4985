use std::{panic, path::Path};

use crossbeam_utils::thread;
use tracing::{debug, debug_span, info, warn};

use xeno_bc::{Animation, ChunkSet, Skeleton};
use xeno_mxmd::{Model, Mxmd};
use xeno_sar::Archive;

use crate::{
    animation::load_animation,
    instance::{load_instances, load_models},
    material::{extraction_dir, load_materials, load_textures, resolve_texture_paths},
    skeleton::load_skeleton,
    Error, ExtractParams, FsTextureExtractor, ImportSession, ImportSettings, Result, SceneSink,
    TextureExtractor,
};

/// Kind of file an import dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Archive holding a skeleton.
    SkeletonArchive,
    Skeleton,
    /// Archive holding one or more animations.
    MotionArchive,
    Animation,
    Model,
}

impl FileKind {
    /// Any extension that is not known is imported as a model.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default();

        [
            ("arc", Self::SkeletonArchive),
            ("skl", Self::Skeleton),
            ("mot", Self::MotionArchive),
            ("anm", Self::Animation),
        ]
        .iter()
        .find(|(known, _)| extension.eq_ignore_ascii_case(known))
        .map_or(Self::Model, |(_, kind)| *kind)
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Imports files into a [`SceneSink`].
#[derive(Debug, Clone)]
pub struct Importer<E = FsTextureExtractor> {
    settings: ImportSettings,
    extractor: E,
}

impl Importer {
    #[must_use]
    pub fn new(settings: ImportSettings) -> Self {
        Self::with_extractor(settings, FsTextureExtractor)
    }
}

impl<E: TextureExtractor> Importer<E> {
    /// Uses `extractor` to write embedded textures.
    #[must_use]
    pub fn with_extractor(settings: ImportSettings, extractor: E) -> Self {
        Self {
            settings,
            extractor,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Imports the file at `path`, choosing what to load by its extension.
    ///
    /// Nodes created before a failure stay in the sink.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file or a file it depends on can't be read or is corrupted.
    pub fn import<S: SceneSink>(
        &self,
        path: impl AsRef<Path>,
        sink: &mut S,
    ) -> Result<ImportSession<S>> {
        let path = path.as_ref();
        let kind = FileKind::from_path(path);
        let _span = debug_span!("import", path = %path.display(), ?kind).entered();

        let mut session = ImportSession::new(self.settings);

        match kind {
            FileKind::SkeletonArchive => Self::import_skeleton_archive(path, sink, &session)?,
            FileKind::Skeleton => Self::import_skeleton(path, sink, &session)?,
            FileKind::MotionArchive => self.import_motion_archive(path, sink, &mut session)?,
            FileKind::Animation => Self::import_animation(path, sink, &session)?,
            FileKind::Model => self.import_model(path, sink, &mut session)?,
        }

        info!("imported `{}`", path.display());

        Ok(session)
    }

    fn import_skeleton_archive<S: SceneSink>(
        path: &Path,
        sink: &mut S,
        session: &ImportSession<S>,
    ) -> Result<()> {
        let archive = Archive::read(path).map_err(|error| Error::Archive {
            path: display(path),
            error,
        })?;

        let index = match archive.file_index_from_extension("skl") {
            Some(index) => index,
            None => {
                warn!("archive `{}` has no skeleton", path.display());
                return Ok(());
            }
        };
        let name = archive.file_name(index).unwrap_or_default();
        let entry_path = format!("{}/{}", path.display(), name);
        let class_error = |error| Error::Class {
            path: entry_path.clone(),
            error,
        };

        let bytes = archive.file(index).unwrap_or_default();
        let chunks = ChunkSet::link(bytes).map_err(class_error)?;

        match chunks.get_class::<Skeleton>().map_err(class_error)? {
            Some(skeleton) => {
                load_skeleton(sink, session, &skeleton);
            }
            None => warn!("`{}` holds no skeleton record", entry_path),
        }

        Ok(())
    }

    fn import_skeleton<S: SceneSink>(
        path: &Path,
        sink: &mut S,
        session: &ImportSession<S>,
    ) -> Result<()> {
        let class_error = |error| Error::Class {
            path: display(path),
            error,
        };

        let chunks = ChunkSet::read(path).map_err(class_error)?;
        let skeleton = chunks
            .get_class::<Skeleton>()
            .map_err(class_error)?
            .ok_or_else(|| Error::ClassNotFound {
                path: display(path),
                class: "skeleton",
            })?;

        load_skeleton(sink, session, &skeleton);

        Ok(())
    }

    fn import_motion_archive<S: SceneSink>(
        &self,
        path: &Path,
        sink: &mut S,
        session: &mut ImportSession<S>,
    ) -> Result<()> {
        let archive = Archive::read(path).map_err(|error| Error::Archive {
            path: display(path),
            error,
        })?;

        let mut motions = Vec::new();
        for (index, entry) in archive.entries().enumerate() {
            if !entry
                .name()
                .rsplit_once('.')
                .map_or(false, |(_, extension)| extension.eq_ignore_ascii_case("anm"))
            {
                continue;
            }

            let holds_animation = archive
                .file(index)
                .and_then(|bytes| ChunkSet::link(bytes).ok())
                .map_or(false, |chunks| {
                    let animation = chunks.get_class::<Animation>();
                    matches!(animation, Ok(Some(_)))
                });

            if holds_animation {
                motions.push((index, entry.name().to_owned()));
            } else {
                debug!("skipping `{}`, no animation record", entry.name());
            }
        }

        if motions.is_empty() {
            return Err(Error::NoMotions {
                path: display(path),
            });
        }

        let mut selected = self.settings.motion_index;
        if selected >= motions.len() {
            warn!(
                "motion {} out of range, archive has {} motions, using the first one",
                selected,
                motions.len()
            );
            selected = 0;
        }

        let (index, name) = &motions[selected];
        let entry_path = format!("{}/{}", path.display(), name);
        let class_error = |error| Error::Class {
            path: entry_path.clone(),
            error,
        };

        let bytes = archive.file(*index).unwrap_or_default();
        let chunks = ChunkSet::link(bytes).map_err(class_error)?;
        let animation = chunks
            .get_class::<Animation>()
            .map_err(class_error)?
            .ok_or_else(|| Error::ClassNotFound {
                path: entry_path.clone(),
                class: "animation",
            })?;

        debug!("playing motion `{}`", name);
        load_animation(sink, session, &animation);

        session.motions = motions.into_iter().map(|(_, name)| name).collect();

        Ok(())
    }

    fn import_animation<S: SceneSink>(
        path: &Path,
        sink: &mut S,
        session: &ImportSession<S>,
    ) -> Result<()> {
        let class_error = |error| Error::Class {
            path: display(path),
            error,
        };

        let chunks = ChunkSet::read(path).map_err(class_error)?;
        let animation = chunks
            .get_class::<Animation>()
            .map_err(class_error)?
            .ok_or_else(|| Error::ClassNotFound {
                path: display(path),
                class: "animation",
            })?;

        load_animation(sink, session, &animation);

        Ok(())
    }

    fn import_model<S: SceneSink>(
        &self,
        path: &Path,
        sink: &mut S,
        session: &mut ImportSession<S>,
    ) -> Result<()> {
        let archive_path = path.with_extension("arc");
        if archive_path.is_file() {
            if let Err(err) = Self::import_skeleton_archive(&archive_path, sink, session) {
                warn!("couldn't load skeleton archive: {}", err);
            }
        }

        let model_error = |error| Error::Model {
            path: display(path),
            error,
        };

        let mxmd = Mxmd::read(path).map_err(model_error)?;
        let model = mxmd.model().map_err(model_error)?;
        let textures = mxmd.textures().map_err(model_error)?;
        let external_textures = mxmd.external_textures().map_err(model_error)?;

        load_textures(
            sink,
            session,
            textures.as_deref(),
            external_textures.as_deref(),
        );

        if let Some(materials) = mxmd.materials().map_err(model_error)? {
            load_materials(sink, session, &materials);
        }

        let embedded = textures.as_deref().unwrap_or_default();
        let extract = self.settings.extract_textures && !embedded.is_empty();
        let dir = extraction_dir(path);
        let dir = dir.as_path();
        let params = ExtractParams {
            alternate_channel_packing: self.settings.alternate_channel_packing,
            force_uncompressed: self.settings.textures_to_png,
        };
        let extractor = &self.extractor;

        let scoped = thread::scope(|scope| {
            let worker = if extract {
                debug!("extracting {} textures", embedded.len());
                Some(scope.spawn(move |_| extractor.extract_all(embedded, dir, params)))
            } else {
                None
            };

            let built = build_scene(sink, session, &mxmd, model.as_ref());
            let extracted = worker.map(|worker| worker.join());

            (built, extracted)
        });

        let (built, extracted) = match scoped {
            Ok(results) => results,
            Err(payload) => panic::resume_unwind(payload),
        };

        built.map_err(model_error)?;

        match extracted {
            Some(Ok(result)) => result?,
            Some(Err(payload)) => panic::resume_unwind(payload),
            None => {}
        }

        resolve_texture_paths(sink, session, path);

        Ok(())
    }
}

fn build_scene<S: SceneSink>(
    sink: &mut S,
    session: &mut ImportSession<S>,
    mxmd: &Mxmd,
    model: Option<&Model>,
) -> xeno_mxmd::Result<()> {
    let model = match model {
        Some(model) => model,
        None => {
            debug!("file has no model section");
            return Ok(());
        }
    };

    match mxmd.instances()? {
        Some(instances) => load_instances(sink, session, mxmd, model, &instances),
        None => load_models(sink, session, mxmd, model),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(
            FileKind::from_path(Path::new("pc010101.ARC")),
            FileKind::SkeletonArchive
        );
        assert_eq!(FileKind::from_path(Path::new("a/b.skl")), FileKind::Skeleton);
        assert_eq!(
            FileKind::from_path(Path::new("mp010101.mot")),
            FileKind::MotionArchive
        );
        assert_eq!(FileKind::from_path(Path::new("idle.anm")), FileKind::Animation);
        assert_eq!(
            FileKind::from_path(Path::new("pc010101.wimdo")),
            FileKind::Model
        );
        assert_eq!(FileKind::from_path(Path::new("noextension")), FileKind::Model);
    }
}
