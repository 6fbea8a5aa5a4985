use byteorder::{ByteOrder, LE};
use glam::{Vec2, Vec3, Vec4};
use half::f16;

use crate::{Error, Result, Section};

/// Vertex attribute kind with its on-disk encoding.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum AttributeKind {
    /// 3 x f32
    Position,
    /// u16 + 2 bytes padding
    WeightId,
    /// 2 x f32
    Uv1,
    Uv2,
    Uv3,
    /// 4 x unorm8
    VertexColor,
    /// 3 x f32
    Normal,
    /// 4 x f16, w unused
    Normal2,
    /// 4 x snorm8, w unused
    Normal32,
    /// u32
    MorphVertexId,
    /// 3 x f32
    MorphPosition,
    /// 4 x unorm8 remapped to [-1, 1]
    MorphNormal,
    Unknown(u16),
}

impl AttributeKind {
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::Position,
            3 => Self::WeightId,
            5 => Self::Uv1,
            6 => Self::Uv2,
            7 => Self::Uv3,
            17 => Self::VertexColor,
            28 => Self::Normal,
            32 => Self::Normal2,
            33 => Self::Normal32,
            40 => Self::MorphVertexId,
            41 => Self::MorphPosition,
            42 => Self::MorphNormal,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Position => 0,
            Self::WeightId => 3,
            Self::Uv1 => 5,
            Self::Uv2 => 6,
            Self::Uv3 => 7,
            Self::VertexColor => 17,
            Self::Normal => 28,
            Self::Normal2 => 32,
            Self::Normal32 => 33,
            Self::MorphVertexId => 40,
            Self::MorphPosition => 41,
            Self::MorphNormal => 42,
            Self::Unknown(code) => code,
        }
    }

    /// Number of bytes a value of this kind occupies, `None` for unknown kinds.
    #[must_use]
    pub fn encoded_size(self) -> Option<usize> {
        match self {
            Self::Position | Self::Normal | Self::MorphPosition => Some(12),
            Self::Uv1 | Self::Uv2 | Self::Uv3 | Self::Normal2 => Some(8),
            Self::WeightId
            | Self::VertexColor
            | Self::Normal32
            | Self::MorphVertexId
            | Self::MorphNormal => Some(4),
            Self::Unknown(_) => None,
        }
    }

    #[must_use]
    pub fn is_normal(self) -> bool {
        matches!(self, Self::Normal | Self::Normal2 | Self::Normal32)
    }

    #[must_use]
    pub fn is_uv(self) -> bool {
        matches!(self, Self::Uv1 | Self::Uv2 | Self::Uv3)
    }
}

fn unorm8(value: u8) -> f32 {
    f32::from(value) / 255.0
}

fn to_unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn snorm8(value: u8) -> f32 {
    (f32::from(value as i8) / 127.0).max(-1.0)
}

fn to_snorm8(value: f32) -> u8 {
    (value.clamp(-1.0, 1.0) * 127.0).round() as i8 as u8
}

fn f32s<const N: usize>(bytes: &[u8]) -> [f32; N] {
    let mut values = [0.0; N];
    LE::read_f32_into(&bytes[..N * 4], &mut values);
    values
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = vec![0; values.len() * 4];
    LE::write_f32_into(values, &mut bytes);
    bytes
}

/// A value type vertex attributes can be decoded into.
pub trait Attribute: Sized {
    const NAME: &'static str;

    /// Decodes a value of `kind` from `bytes`, which holds at least
    /// [`AttributeKind::encoded_size`] bytes.
    /// Returns `None` if `kind` doesn't decode into this type.
    fn decode(kind: AttributeKind, bytes: &[u8]) -> Option<Self>;

    /// Inverse of [`Attribute::decode`].
    fn encode(&self, kind: AttributeKind) -> Option<Vec<u8>>;
}

impl Attribute for Vec2 {
    const NAME: &'static str = "Vec2";

    fn decode(kind: AttributeKind, bytes: &[u8]) -> Option<Self> {
        kind.is_uv().then(|| Vec2::from(f32s::<2>(bytes)))
    }

    fn encode(&self, kind: AttributeKind) -> Option<Vec<u8>> {
        kind.is_uv().then(|| f32_bytes(&self.to_array()))
    }
}

impl Attribute for Vec3 {
    const NAME: &'static str = "Vec3";

    fn decode(kind: AttributeKind, bytes: &[u8]) -> Option<Self> {
        match kind {
            AttributeKind::Position | AttributeKind::Normal | AttributeKind::MorphPosition => {
                Some(Vec3::from(f32s::<3>(bytes)))
            }
            AttributeKind::Normal2 => {
                let component = |i: usize| f16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
                Some(Vec3::new(
                    component(0).to_f32(),
                    component(1).to_f32(),
                    component(2).to_f32(),
                ))
            }
            AttributeKind::Normal32 => Some(Vec3::new(
                snorm8(bytes[0]),
                snorm8(bytes[1]),
                snorm8(bytes[2]),
            )),
            _ => None,
        }
    }

    fn encode(&self, kind: AttributeKind) -> Option<Vec<u8>> {
        match kind {
            AttributeKind::Position | AttributeKind::Normal | AttributeKind::MorphPosition => {
                Some(f32_bytes(&self.to_array()))
            }
            AttributeKind::Normal2 => Some(
                self.to_array()
                    .iter()
                    .chain(&[0.0])
                    .flat_map(|&v| f16::from_f32(v).to_le_bytes())
                    .collect(),
            ),
            AttributeKind::Normal32 => Some(vec![
                to_snorm8(self.x),
                to_snorm8(self.y),
                to_snorm8(self.z),
                0,
            ]),
            _ => None,
        }
    }
}

impl Attribute for Vec4 {
    const NAME: &'static str = "Vec4";

    fn decode(kind: AttributeKind, bytes: &[u8]) -> Option<Self> {
        match kind {
            AttributeKind::VertexColor => Some(Vec4::new(
                unorm8(bytes[0]),
                unorm8(bytes[1]),
                unorm8(bytes[2]),
                unorm8(bytes[3]),
            )),
            AttributeKind::MorphNormal => Some(Vec4::new(
                unorm8(bytes[0]),
                unorm8(bytes[1]),
                unorm8(bytes[2]),
                unorm8(bytes[3]),
            ) * 2.0
                - Vec4::ONE),
            _ => None,
        }
    }

    fn encode(&self, kind: AttributeKind) -> Option<Vec<u8>> {
        let value = match kind {
            AttributeKind::VertexColor => *self,
            AttributeKind::MorphNormal => (*self + Vec4::ONE) * 0.5,
            _ => return None,
        };
        Some(value.to_array().iter().map(|&v| to_unorm8(v)).collect())
    }
}

impl Attribute for u16 {
    const NAME: &'static str = "u16";

    fn decode(kind: AttributeKind, bytes: &[u8]) -> Option<Self> {
        (kind == AttributeKind::WeightId).then(|| LE::read_u16(bytes))
    }

    fn encode(&self, kind: AttributeKind) -> Option<Vec<u8>> {
        (kind == AttributeKind::WeightId).then(|| {
            let mut bytes = self.to_le_bytes().to_vec();
            bytes.extend([0, 0]);
            bytes
        })
    }
}

impl Attribute for u32 {
    const NAME: &'static str = "u32";

    fn decode(kind: AttributeKind, bytes: &[u8]) -> Option<Self> {
        (kind == AttributeKind::MorphVertexId).then(|| LE::read_u32(bytes))
    }

    fn encode(&self, kind: AttributeKind) -> Option<Vec<u8>> {
        (kind == AttributeKind::MorphVertexId).then(|| self.to_le_bytes().to_vec())
    }
}

/// Typed accessor for one attribute of an interleaved vertex buffer.
#[derive(Debug, Clone, Copy)]
pub struct VertexDescriptor<'a> {
    kind: AttributeKind,
    data: &'a [u8],
    stride: usize,
    offset: usize,
    size: usize,
    count: usize,
}

impl<'a> VertexDescriptor<'a> {
    pub(crate) fn new(
        kind: AttributeKind,
        data: &'a [u8],
        stride: usize,
        offset: usize,
        size: usize,
        count: usize,
    ) -> Self {
        Self {
            kind,
            data,
            stride,
            offset,
            size,
            count,
        }
    }

    #[must_use]
    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    /// Number of values this descriptor can evaluate.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Offset of the attribute inside one vertex.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Raw bytes of the value at `index`.
    #[must_use]
    pub fn raw(&self, index: usize) -> Option<&'a [u8]> {
        if index >= self.count {
            return None;
        }
        let start = index * self.stride + self.offset;
        self.data.get(start..start + self.size)
    }

    /// Decodes the value at `index`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `index` is out of range or the attribute kind doesn't decode into `T`.
    pub fn evaluate<T: Attribute>(&self, index: usize) -> Result<T> {
        let bytes = self
            .raw(index)
            .ok_or_else(|| Section::VertexBuffer.corrupted("vertex index out of range"))?;
        T::decode(self.kind, bytes).ok_or(Error::AttributeMismatch {
            kind: self.kind,
            expected: T::NAME,
        })
    }

    /// Decodes every value.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the attribute kind doesn't decode into `T`.
    pub fn values<T: Attribute>(&self) -> Result<Vec<T>> {
        (0..self.count).map(|index| self.evaluate(index)).collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn descriptor(kind: AttributeKind, data: &[u8], stride: usize, offset: usize) -> VertexDescriptor {
        let size = kind.encoded_size().unwrap();
        VertexDescriptor::new(kind, data, stride, offset, size, data.len() / stride)
    }

    #[test]
    fn interleaved_attributes_use_their_own_encoding() {
        // position (12 bytes) + packed normal (4 bytes) per vertex
        let mut data = Vec::new();
        for (position, normal) in [([1.0_f32, 2.0, 3.0], [127_u8, 0, 129, 0]), ([4.0, 5.0, 6.0], [0, 127, 0, 0])] {
            data.extend(f32_bytes(&position));
            data.extend(normal);
        }

        let positions = descriptor(AttributeKind::Position, &data, 16, 0);
        let normals = descriptor(AttributeKind::Normal32, &data, 16, 12);

        assert_eq!(positions.len(), 2);
        assert_relative_eq!(positions.evaluate::<Vec3>(1).unwrap(), Vec3::new(4.0, 5.0, 6.0));
        assert_relative_eq!(normals.evaluate::<Vec3>(0).unwrap(), Vec3::new(1.0, 0.0, -1.0));
        assert_relative_eq!(normals.evaluate::<Vec3>(1).unwrap(), Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn out_of_range_and_mismatched_types() {
        let data = f32_bytes(&[0.5, 0.25]);
        let uvs = descriptor(AttributeKind::Uv2, &data, 8, 0);

        assert_relative_eq!(uvs.evaluate::<Vec2>(0).unwrap(), Vec2::new(0.5, 0.25));
        assert_eq!(
            uvs.evaluate::<Vec3>(0).unwrap_err(),
            Error::AttributeMismatch {
                kind: AttributeKind::Uv2,
                expected: "Vec3"
            }
        );
        assert!(matches!(
            uvs.evaluate::<Vec2>(1),
            Err(Error::Corrupted {
                ty: Section::VertexBuffer,
                ..
            })
        ));
    }

    #[test]
    fn reencoding_reproduces_bytes() {
        let cases: &[(AttributeKind, Vec<u8>)] = &[
            (AttributeKind::Position, f32_bytes(&[1.5, -2.0, 1e-3])),
            (AttributeKind::Uv1, f32_bytes(&[0.125, 0.875])),
            (AttributeKind::VertexColor, vec![0, 64, 128, 255]),
            (AttributeKind::Normal32, vec![127, 200, 3, 0]),
            (AttributeKind::MorphNormal, vec![0, 128, 255, 17]),
            (AttributeKind::WeightId, vec![0x34, 0x12, 0, 0]),
            (AttributeKind::MorphVertexId, vec![1, 2, 3, 4]),
        ];

        fn reencode<T: Attribute>(kind: AttributeKind, bytes: &[u8]) -> Vec<u8> {
            T::decode(kind, bytes).unwrap().encode(kind).unwrap()
        }

        for (kind, bytes) in cases {
            let kind = *kind;
            let encoded = match kind {
                AttributeKind::Uv1 => reencode::<Vec2>(kind, bytes),
                AttributeKind::VertexColor | AttributeKind::MorphNormal => {
                    reencode::<Vec4>(kind, bytes)
                }
                AttributeKind::WeightId => reencode::<u16>(kind, bytes),
                AttributeKind::MorphVertexId => reencode::<u32>(kind, bytes),
                _ => reencode::<Vec3>(kind, bytes),
            };
            assert_eq!(&encoded, bytes, "{:?}", kind);
        }
    }

    #[test]
    fn half_float_normals() {
        let bytes = Vec3::new(0.0, -1.0, 0.5)
            .encode(AttributeKind::Normal2)
            .unwrap();

        assert_eq!(bytes.len(), 8);
        assert_relative_eq!(
            Vec3::decode(AttributeKind::Normal2, &bytes).unwrap(),
            Vec3::new(0.0, -1.0, 0.5)
        );
    }

    #[test]
    fn kind_codes_round_trip() {
        for code in 0..64 {
            assert_eq!(AttributeKind::from_code(code).code(), code);
        }
    }
}
