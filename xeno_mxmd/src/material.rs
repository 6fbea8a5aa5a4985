use byteorder::LE;
use zerocopy::{
    byteorder::{I16, U16, U32},
    FromBytes, Unaligned,
};

use crate::{
    binary_utils::{parse, parse_bytes, parse_str, parse_table},
    Result, Section,
};

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct TableHeader {
    count: U32<LE>,
    offset: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct MaterialEntry {
    name_offset: U32<LE>,
    textures_offset: U32<LE>,
    texture_count: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct TextureEntry {
    name_offset: U32<LE>,
    width: U16<LE>,
    height: U16<LE>,
    format: U16<LE>,
    reserved: U16<LE>,
    data_offset: U32<LE>,
    data_size: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct ExternalTextureEntry {
    container_id: I16<LE>,
    texture_id: U16<LE>,
}

fn table<'a, T: FromBytes + Unaligned>(
    bytes: &'a [u8],
    offset: usize,
    ty: Section,
) -> Result<&'a [T]> {
    let header: &TableHeader =
        parse(bytes, offset).ok_or_else(|| ty.corrupted("eof reading header"))?;
    parse_table(bytes, header.offset.get(), header.count.get())
    .ok_or_else(|| ty.corrupted("table out of bounds"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material<'a> {
    pub name: &'a str,
    /// Indices into the texture table.
    pub textures: Vec<usize>,
}

pub(crate) fn parse_materials(bytes: &[u8], offset: usize) -> Result<Vec<Material>> {
    let corrupted = |error| Section::Materials.corrupted(error);

    table::<MaterialEntry>(bytes, offset, Section::Materials)?
        .iter()
        .map(|entry| {
            let textures: &[U16<LE>] = parse_table(
                bytes,
                entry.textures_offset.get(),
                entry.texture_count.get(),
            )
            .ok_or_else(|| corrupted("texture indices out of bounds"))?;

            Ok(Material {
                name: parse_str(bytes, entry.name_offset.get())
                    .ok_or_else(|| corrupted("material name out of bounds"))?,
                textures: textures
                    .iter()
                    .map(|index| usize::from(index.get()))
                    .collect(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
    Rg8,
    /// Payload is a complete DDS file.
    Dds,
    Unknown(u16),
}

impl TextureFormat {
    fn from_code(code: u16) -> Self {
        match code {
            0 => Self::Rgba8,
            1 => Self::Rg8,
            2 => Self::Dds,
            code => Self::Unknown(code),
        }
    }
}

/// A texture embedded in the model container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture<'a> {
    pub name: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Empty if the texture carries no payload.
    pub data: &'a [u8],
}

pub(crate) fn parse_textures(bytes: &[u8], offset: usize) -> Result<Vec<Texture>> {
    let corrupted = |error| Section::Textures.corrupted(error);

    table::<TextureEntry>(bytes, offset, Section::Textures)?
        .iter()
        .map(|entry| {
            let data = parse_bytes(
                bytes,
                entry.data_offset.get(),
                entry.data_size.get() as usize,
            )
            .ok_or_else(|| corrupted("texture data out of bounds"))?;

            Ok(Texture {
                name: parse_str(bytes, entry.name_offset.get())
                    .ok_or_else(|| corrupted("texture name out of bounds"))?,
                width: u32::from(entry.width.get()),
                height: u32::from(entry.height.get()),
                format: TextureFormat::from_code(entry.format.get()),
                data,
            })
        })
        .collect()
}

/// A texture stored in a shared texture bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalTexture {
    /// Bank container, negative if the texture lives in the bank root.
    pub container_id: i16,
    pub texture_id: u16,
}

impl ExternalTexture {
    /// Relative name inside the bank, for example `3/0042`.
    #[must_use]
    pub fn name(&self) -> String {
        if self.container_id > -1 {
            format!("{}/{:04}", self.container_id, self.texture_id)
        } else {
            format!("{:04}", self.texture_id)
        }
    }
}

pub(crate) fn parse_external_textures(
    bytes: &[u8],
    offset: usize,
) -> Result<Vec<ExternalTexture>> {
    Ok(
        table::<ExternalTextureEntry>(bytes, offset, Section::Textures)?
            .iter()
            .map(|entry| ExternalTexture {
                container_id: entry.container_id.get(),
                texture_id: entry.texture_id.get(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use xeno_test_utils::{MaterialSpec, MxmdBuilder, TextureSpec};

    use crate::Mxmd;

    use super::*;

    #[test]
    fn materials_and_textures() {
        let mxmd = Mxmd::parse(
            MxmdBuilder {
                materials: Some(vec![
                    MaterialSpec {
                        name: "body".to_owned(),
                        textures: vec![1, 0],
                    },
                    MaterialSpec {
                        name: "empty".to_owned(),
                        textures: Vec::new(),
                    },
                ]),
                textures: Some(vec![
                    TextureSpec {
                        name: "body_COL".to_owned(),
                        width: 2,
                        height: 1,
                        format: 0,
                        data: vec![255; 8],
                    },
                    TextureSpec {
                        name: "body_NRM".to_owned(),
                        format: 9,
                        ..TextureSpec::default()
                    },
                ]),
                ..MxmdBuilder::new()
            }
            .build(),
        )
        .unwrap();

        let materials = mxmd.materials().unwrap().unwrap();
        assert_eq!(
            materials,
            [
                Material {
                    name: "body",
                    textures: vec![1, 0]
                },
                Material {
                    name: "empty",
                    textures: Vec::new()
                }
            ]
        );

        let textures = mxmd.textures().unwrap().unwrap();
        assert_eq!(textures[0].name, "body_COL");
        assert_eq!(textures[0].format, TextureFormat::Rgba8);
        assert_eq!((textures[0].width, textures[0].height), (2, 1));
        assert_eq!(textures[0].data.len(), 8);
        assert_eq!(textures[1].format, TextureFormat::Unknown(9));
        assert!(textures[1].data.is_empty());
        assert!(mxmd.external_textures().unwrap().is_none());
    }

    #[test]
    fn external_texture_names() {
        let mxmd = Mxmd::parse(
            MxmdBuilder {
                external_textures: Some(vec![(3, 42), (-1, 7), (0, 12345)]),
                ..MxmdBuilder::new()
            }
            .build(),
        )
        .unwrap();

        let names: Vec<_> = mxmd
            .external_textures()
            .unwrap()
            .unwrap()
            .iter()
            .map(ExternalTexture::name)
            .collect();
        assert_eq!(names, ["3/0042", "0007", "0/12345"]);
    }
}
