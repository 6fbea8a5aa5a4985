use byteorder::LE;
use glam::{Quat, Vec3, Vec4};
use itertools::Itertools;
use zerocopy::{
    byteorder::{F32, I16, U16, U32},
    FromBytes, Unaligned,
};

use crate::{
    binary_utils::{parse, parse_slice},
    Class, Error, Record, Result, Section,
};

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct AnimationHeader {
    frame_time: F32<LE>,
    frame_count: U32<LE>,
    track_type: U16<LE>,
    reserved: U16<LE>,
    bone_count: U32<LE>,
    bone_table_offset: U32<LE>,
    track_count: U32<LE>,
    tracks_offset: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct ChannelEntry {
    keys_offset: U32<LE>,
    key_count: U32<LE>,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct TrackEntry {
    position: ChannelEntry,
    rotation: ChannelEntry,
    scale: ChannelEntry,
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct UniformKey {
    value: [F32<LE>; 4],
}

impl UniformKey {
    fn get(&self) -> Vec4 {
        Vec4::new(
            self.value[0].get(),
            self.value[1].get(),
            self.value[2].get(),
            self.value[3].get(),
        )
    }
}

#[derive(Debug, FromBytes, Unaligned)]
#[repr(C)]
struct CubicKey {
    frame: F32<LE>,
    coefficients: [[F32<LE>; 4]; 4],
}

impl CubicKey {
    fn evaluate(&self, t: f32) -> Vec4 {
        let component = |c: &[F32<LE>; 4]| {
            ((c[0].get() * t + c[1].get()) * t + c[2].get()) * t + c[3].get()
        };
        Vec4::new(
            component(&self.coefficients[0]),
            component(&self.coefficients[1]),
            component(&self.coefficients[2]),
            component(&self.coefficients[3]),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    /// One key per frame, linearly interpolated.
    Uniform,
    /// Cubic polynomial segments starting at key frames.
    Cubic,
}

#[derive(Debug, Clone, Copy)]
enum Channel<'a> {
    Uniform(&'a [UniformKey]),
    Cubic(&'a [CubicKey]),
}

impl<'a> Channel<'a> {
    fn parse(bytes: &'a [u8], entry: &ChannelEntry, track_type: TrackType) -> Option<Self> {
        let offset = entry.keys_offset.get() as usize;
        let count = entry.key_count.get() as usize;
        Some(match track_type {
            TrackType::Uniform => Channel::Uniform(parse_slice(bytes, offset, count)?),
            TrackType::Cubic => Channel::Cubic(parse_slice(bytes, offset, count)?),
        })
    }

    fn sample(&self, frame: f32, spherical: bool) -> Option<Vec4> {
        match self {
            Channel::Uniform(keys) => {
                let last = keys.len().checked_sub(1)?;
                let frame = frame.max(0.0);
                let index = (frame.floor() as usize).min(last);
                let next = (index + 1).min(last);
                let t = (frame - index as f32).clamp(0.0, 1.0);

                let from = keys[index].get();
                let to = keys[next].get();
                Some(if spherical {
                    Quat::from_vec4(from)
                        .slerp(Quat::from_vec4(to), t)
                        .into()
                } else {
                    from.lerp(to, t)
                })
            }
            Channel::Cubic(keys) => {
                let key = keys
                    .iter()
                    .rev()
                    .find(|key| key.frame.get() <= frame)
                    .or_else(|| keys.first())?;
                Some(key.evaluate(frame - key.frame.get()))
            }
        }
    }
}

/// Transform of a bone at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformFrame {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for TransformFrame {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Track<'a> {
    position: Channel<'a>,
    rotation: Channel<'a>,
    scale: Channel<'a>,
}

impl<'a> Track<'a> {
    /// Evaluates the track at a (possibly fractional) frame.
    /// Channels without keys keep their identity value.
    #[must_use]
    pub fn evaluate(&self, frame: f32) -> TransformFrame {
        let mut result = TransformFrame::default();

        if let Some(position) = self.position.sample(frame, false) {
            result.translation = position.truncate();
        }
        if let Some(rotation) = self.rotation.sample(frame, true) {
            result.rotation = Quat::from_vec4(rotation).normalize();
        }
        if let Some(scale) = self.scale.sample(frame, false) {
            result.scale = scale.truncate();
        }

        result
    }
}

/// Keyframed bone animation of an `ANIM` record.
#[derive(Debug, Clone)]
pub struct Animation<'a> {
    frame_time: f32,
    frame_count: u32,
    track_type: TrackType,
    bone_table: Vec<i16>,
    tracks: Vec<Track<'a>>,
}

impl<'a> Animation<'a> {
    /// Seconds per frame.
    #[must_use]
    pub fn frame_time(&self) -> f32 {
        self.frame_time
    }

    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Total length in seconds.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.frame_time * self.frame_count as f32
    }

    #[must_use]
    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    /// Track index per bone. Negative entries mark bones this animation doesn't move.
    #[must_use]
    pub fn bone_table(&self) -> &[i16] {
        &self.bone_table
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track<'a>] {
        &self.tracks
    }

    /// Samples the track at `track_index` at `seconds` from the start.
    #[must_use]
    pub fn sample(&self, track_index: usize, seconds: f32) -> Option<TransformFrame> {
        let frame = if self.frame_time > 0.0 {
            seconds / self.frame_time
        } else {
            0.0
        };
        self.tracks
            .get(track_index)
            .map(|track| track.evaluate(frame))
    }
}

impl<'a> Class<'a> for Animation<'a> {
    const KIND: [u8; 4] = *b"ANIM";
    const VERSION: u32 = 1;
    const SECTION: Section = Section::Animation;

    fn parse(bytes: &'a [u8], record: &Record) -> Result<Self> {
        let corrupted = |error| Error::Corrupted {
            ty: Section::Animation,
            error,
        };

        let header: &AnimationHeader =
            parse(bytes, record.offset()).ok_or_else(|| corrupted("eof reading header"))?;

        let frame_time = header.frame_time.get();
        if !frame_time.is_finite() || frame_time < 0.0 {
            return Err(corrupted("invalid frame time"));
        }

        let track_type = match header.track_type.get() {
            1 => TrackType::Uniform,
            2 => TrackType::Cubic,
            _ => return Err(corrupted("unknown track type")),
        };

        let bone_table: &[I16<LE>] = parse_slice(
            bytes,
            header.bone_table_offset.get() as usize,
            header.bone_count.get() as usize,
        )
        .ok_or_else(|| corrupted("bone table out of bounds"))?;

        let entries: &[TrackEntry] = parse_slice(
            bytes,
            header.tracks_offset.get() as usize,
            header.track_count.get() as usize,
        )
        .ok_or_else(|| corrupted("tracks out of bounds"))?;

        let tracks = entries
            .iter()
            .map(|entry| {
                Some(Track {
                    position: Channel::parse(bytes, &entry.position, track_type)?,
                    rotation: Channel::parse(bytes, &entry.rotation, track_type)?,
                    scale: Channel::parse(bytes, &entry.scale, track_type)?,
                })
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| corrupted("track keys out of bounds"))?;

        let bone_table = bone_table.iter().map(|index| index.get()).collect_vec();

        if bone_table
            .iter()
            .any(|&index| index >= 0 && index as usize >= tracks.len())
        {
            return Err(corrupted("bone table references a missing track"));
        }

        Ok(Self {
            frame_time,
            frame_count: header.frame_count.get(),
            track_type,
            bone_table,
            tracks,
        })
    }
}
