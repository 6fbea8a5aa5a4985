use clap::Parser;

use xeno_import::{ImportSettings, Importer, Scene};

#[derive(Parser)]
pub struct Import {
    /// Model, skeleton, animation or archive to import
    path: String,
    /// Skeleton or model imported first, e.g. to give an animation its bones
    #[clap(short, long)]
    base: Option<String>,
    #[clap(short, long, default_value_t = 145.0)]
    unit_scale: f32,
    #[clap(long)]
    no_debug_names: bool,
    #[clap(long)]
    extract_textures: bool,
    #[clap(long)]
    textures_to_png: bool,
    #[clap(long)]
    no_alternate_channel_packing: bool,
    #[clap(long)]
    global_frames: bool,
    #[clap(short, long, default_value_t = 0)]
    motion_index: usize,
}

impl Import {
    fn settings(&self) -> ImportSettings {
        let mut settings = ImportSettings::default();

        settings.unit_scale(self.unit_scale);
        settings.debug_names(!self.no_debug_names);
        settings.extract_textures(self.extract_textures);
        settings.textures_to_png(self.textures_to_png);
        settings.alternate_channel_packing(!self.no_alternate_channel_packing);
        settings.global_frames(self.global_frames);
        settings.motion_index(self.motion_index);

        settings
    }
}

pub fn import(opts: &Import) -> Result<(), xeno_import::Error> {
    let importer = Importer::new(opts.settings());
    let mut scene = Scene::new();

    if let Some(base) = &opts.base {
        importer.import(base, &mut scene)?;
    }

    let session = importer.import(&opts.path, &mut scene)?;

    print!("{}", scene);

    if !session.motions().is_empty() {
        eprintln!("motions:");
        for (index, motion) in session.motions().iter().enumerate() {
            eprintln!("{:>4} {}", index, motion);
        }
    }

    Ok(())
}
