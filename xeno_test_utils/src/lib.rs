//! Builders for small in-memory asset files used by the tests of the other crates.

use std::io::Write;

use byteorder::{WriteBytesExt, LE};

pub mod kind {
    pub const POSITION: u16 = 0;
    pub const WEIGHT_ID: u16 = 3;
    pub const UV1: u16 = 5;
    pub const VERTEX_COLOR: u16 = 17;
    pub const NORMAL: u16 = 28;
    pub const NORMAL2: u16 = 32;
    pub const NORMAL32: u16 = 33;
    pub const MORPH_VERTEX_ID: u16 = 40;
    pub const MORPH_POSITION: u16 = 41;
    pub const MORPH_NORMAL: u16 = 42;
}

pub const IDENTITY_ROWS: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Row-major matrix with only a translation row.
pub fn translation_rows(translation: [f32; 3]) -> [[f32; 4]; 4] {
    let mut rows = IDENTITY_ROWS;
    rows[3] = [translation[0], translation[1], translation[2], 1.0];
    rows
}

/// Little endian writer with back-patching of offset fields.
#[derive(Debug, Default)]
pub struct Writer {
    bytes: Vec<u8>,
    pointers: Vec<u32>,
    strings: Vec<(usize, String)>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn u16(&mut self, value: u16) {
        self.bytes.write_u16::<LE>(value).unwrap();
    }

    pub fn i16(&mut self, value: i16) {
        self.bytes.write_i16::<LE>(value).unwrap();
    }

    pub fn u32(&mut self, value: u32) {
        self.bytes.write_u32::<LE>(value).unwrap();
    }

    pub fn i32(&mut self, value: i32) {
        self.bytes.write_i32::<LE>(value).unwrap();
    }

    pub fn f32(&mut self, value: f32) {
        self.bytes.write_f32::<LE>(value).unwrap();
    }

    pub fn f32s(&mut self, values: &[f32]) {
        for &value in values {
            self.f32(value);
        }
    }

    pub fn bytes(&mut self, bytes: &[u8]) {
        self.bytes.write_all(bytes).unwrap();
    }

    pub fn fixed_str(&mut self, value: &str, len: usize) {
        let mut field = vec![0; len];
        field[..value.len()].copy_from_slice(value.as_bytes());
        self.bytes(&field);
    }

    pub fn align(&mut self, alignment: usize) {
        while self.bytes.len() % alignment != 0 {
            self.bytes.push(0);
        }
    }

    /// Writes a zero offset to be patched later, returns its position.
    pub fn offset_placeholder(&mut self) -> usize {
        let position = self.bytes.len();
        self.pointers.push(position as u32);
        self.u32(0);
        position
    }

    /// Writes a zero `u32` to be patched later, returns its position.
    pub fn placeholder(&mut self) -> usize {
        let position = self.bytes.len();
        self.u32(0);
        position
    }

    pub fn patch(&mut self, position: usize, value: u32) {
        self.bytes[position..position + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Patches the placeholder at `position` with the current position.
    pub fn patch_here(&mut self, position: usize) {
        let here = self.position();
        self.patch(position, here);
    }

    /// Writes an offset to a string that is appended by [`Writer::flush_strings`].
    pub fn string_offset(&mut self, value: &str) {
        let position = self.offset_placeholder();
        self.strings.push((position, value.to_owned()));
    }

    pub fn flush_strings(&mut self) {
        for (position, value) in std::mem::take(&mut self.strings) {
            self.patch_here(position);
            self.bytes(value.as_bytes());
            self.u8(0);
        }
        self.align(4);
    }

    /// Positions of all offset fields written with [`Writer::offset_placeholder`].
    pub fn pointers(&self) -> &[u32] {
        &self.pointers
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.flush_strings();
        self.bytes
    }
}

/// Builds a sar archive.
#[derive(Debug, Default)]
pub struct SarBuilder {
    files: Vec<(String, Vec<u8>)>,
}

impl SarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, bytes: &[u8]) -> Self {
        self.files.push((name.to_owned(), bytes.to_vec()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut w = Writer::new();
        let toc_offset = 64;
        let data_offset = toc_offset + 64 * self.files.len() as u32;

        w.bytes(b"1RAS");
        let file_size = w.placeholder();
        w.u32(0x1000);
        w.u32(self.files.len() as u32);
        w.u32(toc_offset);
        w.u32(data_offset);
        w.bytes(&[0; 8]);
        w.fixed_str("test.arc", 32);

        let mut offset = data_offset;
        for (name, bytes) in &self.files {
            w.u32(offset);
            w.u32(bytes.len() as u32);
            w.u32(0);
            w.fixed_str(name, 52);
            offset += bytes.len() as u32;
        }

        for (_, bytes) in &self.files {
            w.bytes(bytes);
        }

        let size = w.position();
        w.patch(file_size, size);
        w.bytes
    }
}

#[derive(Debug, Clone)]
pub struct SkeletonBoneSpec {
    pub name: String,
    pub parent: i16,
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl SkeletonBoneSpec {
    pub fn new(name: &str, parent: i16, translation: [f32; 3]) -> Self {
        Self {
            name: name.to_owned(),
            parent,
            translation,
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone)]
pub struct CubicKeySpec {
    pub frame: f32,
    /// `[a, b, c, d]` per component, evaluated as `a*t^3 + b*t^2 + c*t + d`.
    pub coefficients: [[f32; 4]; 4],
}

#[derive(Debug, Clone)]
pub enum ChannelSpec {
    Uniform(Vec<[f32; 4]>),
    Cubic(Vec<CubicKeySpec>),
}

#[derive(Debug, Clone)]
pub struct TrackSpec {
    pub position: ChannelSpec,
    pub rotation: ChannelSpec,
    pub scale: ChannelSpec,
}

impl TrackSpec {
    pub fn uniform(positions: &[[f32; 3]], rotations: &[[f32; 4]], scales: &[[f32; 3]]) -> Self {
        let extend = |v: &[f32; 3], w| [v[0], v[1], v[2], w];
        Self {
            position: ChannelSpec::Uniform(positions.iter().map(|v| extend(v, 0.0)).collect()),
            rotation: ChannelSpec::Uniform(rotations.to_vec()),
            scale: ChannelSpec::Uniform(scales.iter().map(|v| extend(v, 0.0)).collect()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationSpec {
    pub frame_time: f32,
    pub frame_count: u32,
    pub cubic: bool,
    pub bone_table: Vec<i16>,
    pub tracks: Vec<TrackSpec>,
}

#[derive(Debug, Clone)]
enum RecordSpec {
    Skeleton(Vec<SkeletonBoneSpec>),
    Animation(AnimationSpec),
    Raw { kind: [u8; 4], version: u32 },
}

/// Builds a chunked class file with skeleton and animation records.
#[derive(Debug, Default)]
pub struct BcBuilder {
    records: Vec<RecordSpec>,
}

impl BcBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skeleton(mut self, bones: Vec<SkeletonBoneSpec>) -> Self {
        self.records.push(RecordSpec::Skeleton(bones));
        self
    }

    pub fn animation(mut self, animation: AnimationSpec) -> Self {
        self.records.push(RecordSpec::Animation(animation));
        self
    }

    /// Adds an empty record, e.g. to test version checks.
    pub fn raw_record(mut self, kind: &[u8; 4], version: u32) -> Self {
        self.records.push(RecordSpec::Raw {
            kind: *kind,
            version,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut w = Writer::new();

        w.bytes(b"BC\0\0");
        let file_size = w.placeholder();
        w.u32(0);
        let pointers_offset = w.placeholder();
        w.u32(self.records.len() as u32);
        let records_offset = w.placeholder();
        w.bytes(&[0; 8]);

        w.patch_here(records_offset);
        let mut record_offsets = Vec::new();
        for record in &self.records {
            let (kind, version) = match record {
                RecordSpec::Skeleton(_) => (*b"SKEL", 1),
                RecordSpec::Animation(_) => (*b"ANIM", 1),
                RecordSpec::Raw { kind, version } => (*kind, *version),
            };
            w.bytes(&kind);
            w.u32(version);
            let offset = w.placeholder();
            let size = w.placeholder();
            record_offsets.push((offset, size));
        }

        for (record, (offset, size)) in self.records.iter().zip(record_offsets) {
            w.align(4);
            let start = w.position();
            w.patch(offset, start);
            match record {
                RecordSpec::Skeleton(bones) => write_skeleton(&mut w, bones),
                RecordSpec::Animation(animation) => write_animation(&mut w, animation),
                RecordSpec::Raw { .. } => w.u32(0),
            }
            w.flush_strings();
            let end = w.position();
            w.patch(size, end - start);
        }

        let pointers = w.pointers().to_vec();
        w.patch(pointers_offset - 4, pointers.len() as u32);
        w.patch_here(pointers_offset);
        for pointer in pointers {
            w.u32(pointer);
        }

        let size = w.position();
        w.patch(file_size, size);
        w.bytes
    }
}

fn write_skeleton(w: &mut Writer, bones: &[SkeletonBoneSpec]) {
    w.u32(bones.len() as u32);
    let links = w.offset_placeholder();
    let names = w.offset_placeholder();
    let transforms = w.offset_placeholder();

    w.patch_here(links);
    for bone in bones {
        w.i16(bone.parent);
    }
    w.align(4);

    w.patch_here(names);
    for bone in bones {
        w.string_offset(&bone.name);
        w.u32(0);
    }

    w.patch_here(transforms);
    for bone in bones {
        let t = bone.translation;
        let s = bone.scale;
        w.f32s(&[t[0], t[1], t[2], 1.0]);
        w.f32s(&bone.rotation);
        w.f32s(&[s[0], s[1], s[2], 0.0]);
    }
}

fn write_animation(w: &mut Writer, animation: &AnimationSpec) {
    w.f32(animation.frame_time);
    w.u32(animation.frame_count);
    w.u16(if animation.cubic { 2 } else { 1 });
    w.u16(0);
    w.u32(animation.bone_table.len() as u32);
    let bone_table = w.offset_placeholder();
    w.u32(animation.tracks.len() as u32);
    let tracks = w.offset_placeholder();

    w.patch_here(bone_table);
    for &entry in &animation.bone_table {
        w.i16(entry);
    }
    w.align(4);

    w.patch_here(tracks);
    let mut channels = Vec::new();
    for track in &animation.tracks {
        for channel in [&track.position, &track.rotation, &track.scale] {
            let keys = w.offset_placeholder();
            let count = match channel {
                ChannelSpec::Uniform(keys) => keys.len(),
                ChannelSpec::Cubic(keys) => keys.len(),
            };
            w.u32(count as u32);
            channels.push((keys, channel));
        }
    }

    for (position, channel) in channels {
        w.patch_here(position);
        match channel {
            ChannelSpec::Uniform(keys) => {
                for key in keys {
                    w.f32s(key);
                }
            }
            ChannelSpec::Cubic(keys) => {
                for key in keys {
                    w.f32(key.frame);
                    for component in &key.coefficients {
                        w.f32s(component);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeshObjectSpec {
    pub buffer_id: u16,
    pub uv_faces_id: u16,
    pub material_id: u16,
    pub lod_id: u16,
    pub gib_id: u16,
    pub skin_desc: u16,
}

#[derive(Debug, Clone)]
pub struct ModelBoneSpec {
    pub name: String,
    pub parent: i32,
    pub rows: [[f32; 4]; 4],
}

#[derive(Debug, Clone, Default)]
pub struct ModelSpec {
    pub mesh_groups: Vec<Vec<MeshObjectSpec>>,
    pub bones: Vec<ModelBoneSpec>,
    pub skin_bones: Vec<u16>,
    pub morph_names: Vec<String>,
}

/// Interleaved vertex buffer, built column by column.
#[derive(Debug, Clone, Default)]
pub struct VertexBufferSpec {
    columns: Vec<(u16, u16, Vec<Vec<u8>>)>,
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl VertexBufferSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute column with one encoded value per vertex.
    pub fn attribute(mut self, kind: u16, size: u16, values: Vec<Vec<u8>>) -> Self {
        self.columns.push((kind, size, values));
        self
    }

    pub fn positions(self, values: &[[f32; 3]]) -> Self {
        self.vec3(kind::POSITION, values)
    }

    pub fn normals(self, values: &[[f32; 3]]) -> Self {
        self.vec3(kind::NORMAL, values)
    }

    pub fn morph_positions(self, values: &[[f32; 3]]) -> Self {
        self.vec3(kind::MORPH_POSITION, values)
    }

    pub fn vec3(self, kind: u16, values: &[[f32; 3]]) -> Self {
        let values = values.iter().map(|v| f32_bytes(v)).collect();
        self.attribute(kind, 12, values)
    }

    /// `channel` is 0 based.
    pub fn uvs(self, channel: u16, values: &[[f32; 2]]) -> Self {
        let values = values.iter().map(|v| f32_bytes(v)).collect();
        self.attribute(kind::UV1 + channel, 8, values)
    }

    pub fn colors(self, values: &[[u8; 4]]) -> Self {
        let values = values.iter().map(|v| v.to_vec()).collect();
        self.attribute(kind::VERTEX_COLOR, 4, values)
    }

    pub fn morph_normals(self, values: &[[u8; 4]]) -> Self {
        let values = values.iter().map(|v| v.to_vec()).collect();
        self.attribute(kind::MORPH_NORMAL, 4, values)
    }

    pub fn weight_ids(self, values: &[u16]) -> Self {
        let values = values
            .iter()
            .map(|v| {
                let mut bytes = v.to_le_bytes().to_vec();
                bytes.extend([0, 0]);
                bytes
            })
            .collect();
        self.attribute(kind::WEIGHT_ID, 4, values)
    }

    pub fn morph_vertex_ids(self, values: &[u32]) -> Self {
        let values = values.iter().map(|v| v.to_le_bytes().to_vec()).collect();
        self.attribute(kind::MORPH_VERTEX_ID, 4, values)
    }

    fn vertex_count(&self) -> usize {
        self.columns.first().map_or(0, |(_, _, values)| values.len())
    }

    fn stride(&self) -> u32 {
        self.columns.iter().map(|(_, size, _)| u32::from(*size)).sum()
    }

    fn interleaved(&self) -> Vec<u8> {
        let mut data = Vec::new();
        for vertex in 0..self.vertex_count() {
            for (_, size, values) in &self.columns {
                let mut value = values[vertex].clone();
                value.resize(usize::from(*size), 0);
                data.extend(value);
            }
        }
        data
    }

    /// Writes the 20 byte header, returns the positions of its two offset fields.
    fn write_header(&self, w: &mut Writer) -> (usize, usize) {
        let data = w.offset_placeholder();
        w.u32(self.vertex_count() as u32);
        w.u32(self.stride());
        let descriptors = w.offset_placeholder();
        w.u32(self.columns.len() as u32);
        (data, descriptors)
    }

    fn write_payload(&self, w: &mut Writer, (data, descriptors): (usize, usize)) {
        w.patch_here(descriptors);
        for (kind, size, _) in &self.columns {
            w.u16(*kind);
            w.u16(*size);
        }
        w.patch_here(data);
        w.bytes(&self.interleaved());
        w.align(4);
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeightBufferSpec {
    pub key: u16,
    pub weights: Vec<([u16; 4], [u8; 4])>,
}

#[derive(Debug, Clone, Default)]
pub struct MorphSpec {
    pub source_buffer_id: u32,
    pub base: VertexBufferSpec,
    pub targets: Vec<(u32, VertexBufferSpec)>,
}

#[derive(Debug, Clone, Default)]
pub struct GeomSpec {
    pub vertex_buffers: Vec<VertexBufferSpec>,
    pub face_buffers: Vec<Vec<u16>>,
    pub weight_buffers: Vec<WeightBufferSpec>,
    pub morphs: Vec<MorphSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct MaterialSpec {
    pub name: String,
    pub textures: Vec<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct TextureSpec {
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub format: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub rows: [[f32; 4]; 4],
    pub groups: Vec<i32>,
}

/// Builds a model container.
#[derive(Debug, Clone)]
pub struct MxmdBuilder {
    pub version: u32,
    pub model: Option<ModelSpec>,
    pub materials: Option<Vec<MaterialSpec>>,
    pub geometry: Option<Vec<Option<GeomSpec>>>,
    pub textures: Option<Vec<TextureSpec>>,
    pub external_textures: Option<Vec<(i16, u16)>>,
    pub instances: Option<Vec<InstanceSpec>>,
}

impl Default for MxmdBuilder {
    fn default() -> Self {
        Self {
            version: 10112,
            model: None,
            materials: None,
            geometry: None,
            textures: None,
            external_textures: None,
            instances: None,
        }
    }
}

impl MxmdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut w = Writer::new();

        w.bytes(b"DMXM");
        w.u32(self.version);
        let model = w.placeholder();
        let materials = w.placeholder();
        let geometry = w.placeholder();
        let textures = w.placeholder();
        let external_textures = w.placeholder();
        let instances = w.placeholder();
        w.bytes(&[0; 16]);

        if let Some(spec) = &self.model {
            w.patch_here(model);
            write_model(&mut w, spec);
        }
        if let Some(spec) = &self.materials {
            w.patch_here(materials);
            write_materials(&mut w, spec);
        }
        if let Some(spec) = &self.geometry {
            w.patch_here(geometry);
            write_geometry(&mut w, spec);
        }
        if let Some(spec) = &self.textures {
            w.patch_here(textures);
            write_textures(&mut w, spec);
        }
        if let Some(spec) = &self.external_textures {
            w.patch_here(external_textures);
            w.u32(spec.len() as u32);
            let here = w.position() + 4;
            w.u32(here);
            for &(container, id) in spec {
                w.i16(container);
                w.u16(id);
            }
        }
        if let Some(spec) = &self.instances {
            w.patch_here(instances);
            write_instances(&mut w, spec);
        }

        w.into_bytes()
    }
}

fn write_model(w: &mut Writer, spec: &ModelSpec) {
    let groups = w.placeholder();
    w.u32(spec.mesh_groups.len() as u32);
    let bones = w.placeholder();
    w.u32(spec.bones.len() as u32);
    let skin_bones = w.placeholder();
    w.u32(spec.skin_bones.len() as u32);
    let morph_names = w.placeholder();
    w.u32(spec.morph_names.len() as u32);
    w.bytes(&[0; 8]);

    w.patch_here(groups);
    let group_offsets: Vec<usize> = spec
        .mesh_groups
        .iter()
        .map(|group| {
            let offset = w.placeholder();
            w.u32(group.len() as u32);
            offset
        })
        .collect();
    for (group, offset) in spec.mesh_groups.iter().zip(group_offsets) {
        w.patch_here(offset);
        for object in group {
            w.u16(object.buffer_id);
            w.u16(object.uv_faces_id);
            w.u16(object.material_id);
            w.u16(object.lod_id);
            w.u16(object.gib_id);
            w.u16(object.skin_desc);
            w.u32(0);
        }
    }

    w.patch_here(bones);
    for bone in &spec.bones {
        w.string_offset(&bone.name);
        w.i32(bone.parent);
        for row in &bone.rows {
            w.f32s(row);
        }
    }

    w.patch_here(skin_bones);
    for &bone in &spec.skin_bones {
        w.u16(bone);
    }
    w.align(4);

    w.patch_here(morph_names);
    for name in &spec.morph_names {
        w.string_offset(name);
    }

    w.flush_strings();
}

fn write_geometry(w: &mut Writer, groups: &[Option<GeomSpec>]) {
    w.u32(groups.len() as u32);
    let here = w.position() + 4;
    w.u32(here);
    let table: Vec<usize> = groups.iter().map(|_| w.placeholder()).collect();

    for (spec, entry) in groups.iter().zip(table) {
        let spec = match spec {
            Some(spec) => spec,
            None => continue,
        };
        w.patch_here(entry);

        let vertex_buffers = w.placeholder();
        w.u32(spec.vertex_buffers.len() as u32);
        let face_buffers = w.placeholder();
        w.u32(spec.face_buffers.len() as u32);
        let weight_buffers = w.placeholder();
        w.u32(spec.weight_buffers.len() as u32);
        let morphs = w.placeholder();
        w.u32(spec.morphs.len() as u32);

        w.patch_here(vertex_buffers);
        let headers: Vec<_> = spec
            .vertex_buffers
            .iter()
            .map(|buffer| buffer.write_header(w))
            .collect();
        for (buffer, header) in spec.vertex_buffers.iter().zip(headers) {
            buffer.write_payload(w, header);
        }

        w.patch_here(face_buffers);
        let headers: Vec<_> = spec
            .face_buffers
            .iter()
            .map(|indices| {
                let offset = w.placeholder();
                w.u32(indices.len() as u32);
                offset
            })
            .collect();
        for (indices, offset) in spec.face_buffers.iter().zip(headers) {
            w.patch_here(offset);
            for &index in indices {
                w.u16(index);
            }
            w.align(4);
        }

        w.patch_here(weight_buffers);
        let headers: Vec<_> = spec
            .weight_buffers
            .iter()
            .map(|buffer| {
                w.u16(buffer.key);
                w.u16(0);
                let offset = w.placeholder();
                w.u32(buffer.weights.len() as u32);
                offset
            })
            .collect();
        for (buffer, offset) in spec.weight_buffers.iter().zip(headers) {
            w.patch_here(offset);
            for (weights, bones) in &buffer.weights {
                for &weight in weights {
                    w.u16(weight);
                }
                w.bytes(bones);
            }
        }

        w.patch_here(morphs);
        let headers: Vec<_> = spec
            .morphs
            .iter()
            .map(|morph| {
                w.u32(morph.source_buffer_id);
                let base = morph.base.write_header(w);
                let targets = w.placeholder();
                w.u32(morph.targets.len() as u32);
                (base, targets)
            })
            .collect();
        for (morph, (base, targets)) in spec.morphs.iter().zip(headers) {
            morph.base.write_payload(w, base);
            w.patch_here(targets);
            let target_headers: Vec<_> = morph
                .targets
                .iter()
                .map(|(name_id, buffer)| {
                    w.u32(*name_id);
                    buffer.write_header(w)
                })
                .collect();
            for ((_, buffer), header) in morph.targets.iter().zip(target_headers) {
                buffer.write_payload(w, header);
            }
        }
    }
}

fn write_materials(w: &mut Writer, materials: &[MaterialSpec]) {
    w.u32(materials.len() as u32);
    let here = w.position() + 4;
    w.u32(here);
    let headers: Vec<usize> = materials
        .iter()
        .map(|material| {
            w.string_offset(&material.name);
            let textures = w.placeholder();
            w.u32(material.textures.len() as u32);
            textures
        })
        .collect();
    for (material, offset) in materials.iter().zip(headers) {
        w.patch_here(offset);
        for &texture in &material.textures {
            w.u16(texture);
        }
        w.align(4);
    }
    w.flush_strings();
}

fn write_textures(w: &mut Writer, textures: &[TextureSpec]) {
    w.u32(textures.len() as u32);
    let here = w.position() + 4;
    w.u32(here);
    let headers: Vec<usize> = textures
        .iter()
        .map(|texture| {
            w.string_offset(&texture.name);
            w.u16(texture.width);
            w.u16(texture.height);
            w.u16(texture.format);
            w.u16(0);
            let data = w.placeholder();
            w.u32(texture.data.len() as u32);
            data
        })
        .collect();
    for (texture, offset) in textures.iter().zip(headers) {
        if !texture.data.is_empty() {
            w.patch_here(offset);
            w.bytes(&texture.data);
            w.align(4);
        }
    }
    w.flush_strings();
}

fn write_instances(w: &mut Writer, instances: &[InstanceSpec]) {
    w.u32(instances.len() as u32);
    let offset = w.placeholder();
    let refs = w.placeholder();
    w.u32(instances.iter().map(|i| i.groups.len() as u32).sum());

    w.patch_here(offset);
    let mut start = 0;
    for instance in instances {
        for row in &instance.rows {
            w.f32s(row);
        }
        w.u32(start);
        w.u32(instance.groups.len() as u32);
        start += instance.groups.len() as u32;
    }

    w.patch_here(refs);
    for instance in instances {
        for &group in &instance.groups {
            w.i32(group);
        }
    }
}
