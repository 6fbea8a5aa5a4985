/// Options of a single import.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportSettings {
    pub(crate) unit_scale: f32,
    pub(crate) debug_names: bool,
    pub(crate) extract_textures: bool,
    pub(crate) textures_to_png: bool,
    pub(crate) alternate_channel_packing: bool,
    pub(crate) global_frames: bool,
    pub(crate) motion_index: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            unit_scale: 145.0,
            debug_names: true,
            extract_textures: false,
            textures_to_png: false,
            alternate_channel_packing: true,
            global_frames: false,
            motion_index: 0,
        }
    }
}

impl ImportSettings {
    /// Factor applied to every translation and position.
    pub fn unit_scale(&mut self, unit_scale: f32) {
        self.unit_scale = unit_scale;
    }

    /// Appends the decoded vertex features to mesh node names, for example `Object0_UV1_NRM`.
    pub fn debug_names(&mut self, debug_names: bool) {
        self.debug_names = debug_names;
    }

    /// Writes embedded textures next to the model while it is imported.
    pub fn extract_textures(&mut self, extract_textures: bool) {
        self.extract_textures = extract_textures;
    }

    /// Decodes DDS payloads to PNG instead of copying them.
    pub fn textures_to_png(&mut self, textures_to_png: bool) {
        self.textures_to_png = textures_to_png;
    }

    /// Reconstructs the blue channel of two channel normal maps.
    pub fn alternate_channel_packing(&mut self, alternate_channel_packing: bool) {
        self.alternate_channel_packing = alternate_channel_packing;
    }

    /// Bakes the axis correction into world space animation keys.
    pub fn global_frames(&mut self, global_frames: bool) {
        self.global_frames = global_frames;
    }

    pub fn motion_index(&mut self, motion_index: usize) {
        self.motion_index = motion_index;
    }
}
