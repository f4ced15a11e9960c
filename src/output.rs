//! Frame stream handed to renderers and exporters.
//!
//! The simulation core only produces `(position, velocity)` pairs. How
//! they become geometry (instanced meshes, point caches, plots) is the job
//! of an [`InstanceRenderer`].
//!
//! # Built-in renderers
//!
//! | Renderer | Output |
//! |----------|--------|
//! | [`FrameRecorder`] | Keeps every frame in memory |
//! | [`JsonLinesWriter`] | One JSON object per frame per line |
//! | [`FrameCacheWriter`] | Compact binary cache, read back with [`read_frame_cache`] |

use crate::error::RenderError;
use crate::particle::Particle;
use bytemuck::{Pod, Zeroable};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// State of one active particle at the end of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleState {
    pub position: DVec3,
    pub velocity: DVec3,
}

impl From<&Particle> for ParticleState {
    fn from(p: &Particle) -> Self {
        Self {
            position: p.position,
            velocity: p.velocity,
        }
    }
}

/// All active particle states of one fully simulated frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Scene frame number.
    pub number: u32,
    /// One entry per active particle, in particle order.
    pub states: Vec<ParticleState>,
}

impl Frame {
    /// Capture the active particles of a collection.
    pub fn capture(number: u32, particles: &[Particle]) -> Self {
        Self {
            number,
            states: particles
                .iter()
                .filter(|p| p.active)
                .map(ParticleState::from)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Consumer of the per-frame particle stream.
///
/// Frames arrive in order and only after every particle in them has been
/// updated.
pub trait InstanceRenderer {
    /// Consume one frame.
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError>;

    /// Called once after the last frame.
    fn finish(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

impl<R: InstanceRenderer + ?Sized> InstanceRenderer for &mut R {
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        (**self).render(frame)
    }

    fn finish(&mut self) -> Result<(), RenderError> {
        (**self).finish()
    }
}

impl<R: InstanceRenderer + ?Sized> InstanceRenderer for Box<R> {
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        (**self).render(frame)
    }

    fn finish(&mut self) -> Result<(), RenderError> {
        (**self).finish()
    }
}

/// Keeps every frame in memory.
#[derive(Clone, Debug, Default)]
pub struct FrameRecorder {
    frames: Vec<Frame>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

impl InstanceRenderer for FrameRecorder {
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

/// Writes each frame as one line of JSON.
#[derive(Debug)]
pub struct JsonLinesWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> InstanceRenderer for JsonLinesWriter<W> {
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RenderError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Magic bytes at the start of a frame cache.
pub const CACHE_MAGIC: [u8; 4] = *b"ANTC";
/// Current frame cache layout version.
pub const CACHE_VERSION: u32 = 1;

/// One particle in a frame cache. 24 bytes, no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CacheRecord {
    pub position: [f32; 3],
    pub velocity: [f32; 3],
}

impl From<&ParticleState> for CacheRecord {
    fn from(s: &ParticleState) -> Self {
        Self {
            position: s.position.as_vec3().to_array(),
            velocity: s.velocity.as_vec3().to_array(),
        }
    }
}

impl From<CacheRecord> for ParticleState {
    fn from(r: CacheRecord) -> Self {
        Self {
            position: DVec3::from_array(r.position.map(f64::from)),
            velocity: DVec3::from_array(r.velocity.map(f64::from)),
        }
    }
}

/// Binary frame cache.
///
/// Layout: `CACHE_MAGIC`, `CACHE_VERSION` (u32 LE), then per frame the
/// frame number and record count (u32 LE each) followed by that many
/// [`CacheRecord`]s in native byte order.
#[derive(Debug)]
pub struct FrameCacheWriter<W: Write> {
    writer: W,
    records: Vec<CacheRecord>,
}

impl<W: Write> FrameCacheWriter<W> {
    /// Write the cache header and return the writer.
    pub fn new(mut writer: W) -> Result<Self, RenderError> {
        writer.write_all(&CACHE_MAGIC)?;
        writer.write_all(&CACHE_VERSION.to_le_bytes())?;
        Ok(Self {
            writer,
            records: Vec::new(),
        })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> InstanceRenderer for FrameCacheWriter<W> {
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        let count = u32::try_from(frame.states.len())
            .map_err(|_| RenderError::InvalidCache("too many particles in one frame".into()))?;

        self.records.clear();
        self.records.extend(frame.states.iter().map(CacheRecord::from));

        self.writer.write_all(&frame.number.to_le_bytes())?;
        self.writer.write_all(&count.to_le_bytes())?;
        self.writer.write_all(bytemuck::cast_slice(&self.records))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RenderError> {
        self.writer.flush()?;
        Ok(())
    }
}

fn read_u32(bytes: &[u8], offset: &mut usize) -> Result<u32, RenderError> {
    let end = *offset + 4;
    let chunk = bytes
        .get(*offset..end)
        .ok_or_else(|| RenderError::InvalidCache(format!("truncated at byte {}", offset)))?;
    *offset = end;
    Ok(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

/// Parse a frame cache written by [`FrameCacheWriter`].
pub fn read_frame_cache(bytes: &[u8]) -> Result<Vec<Frame>, RenderError> {
    if bytes.len() < 8 || bytes[..4] != CACHE_MAGIC {
        return Err(RenderError::InvalidCache("missing header".into()));
    }
    let mut offset = 4;
    let version = read_u32(bytes, &mut offset)?;
    if version != CACHE_VERSION {
        return Err(RenderError::InvalidCache(format!("unsupported version {}", version)));
    }

    let record_size = std::mem::size_of::<CacheRecord>();
    let mut frames = Vec::new();
    while offset < bytes.len() {
        let number = read_u32(bytes, &mut offset)?;
        let count = read_u32(bytes, &mut offset)? as usize;
        let end = count
            .checked_mul(record_size)
            .and_then(|len| offset.checked_add(len))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| RenderError::InvalidCache(format!("frame {} is truncated", number)))?;

        let states = bytes[offset..end]
            .chunks_exact(record_size)
            .map(|chunk| ParticleState::from(bytemuck::pod_read_unaligned::<CacheRecord>(chunk)))
            .collect();
        offset = end;
        frames.push(Frame { number, states });
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame(number: u32) -> Frame {
        Frame {
            number,
            states: vec![
                ParticleState {
                    position: DVec3::new(1.0, 2.0, 0.0),
                    velocity: DVec3::new(0.005, 0.0, 0.0),
                },
                ParticleState {
                    position: DVec3::new(-0.5, 0.25, 0.0),
                    velocity: DVec3::new(0.0, -0.003, 0.0),
                },
            ],
        }
    }

    #[test]
    fn test_capture_skips_inactive() {
        let mut particles = vec![
            Particle::at(DVec3::ZERO, 1),
            Particle::at(DVec3::ONE, 1),
            Particle::at(DVec3::X, 1),
        ];
        particles[1].active = false;
        let frame = Frame::capture(3, &particles);
        assert_eq!(frame.number, 3);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.states[1].position, DVec3::X);
    }

    #[test]
    fn test_record_layout() {
        assert_eq!(std::mem::size_of::<CacheRecord>(), 24);
    }

    #[test]
    fn test_frame_cache_round_trip() {
        let mut writer = FrameCacheWriter::new(Vec::new()).unwrap();
        writer.render(&sample_frame(1)).unwrap();
        writer.render(&Frame { number: 2, states: Vec::new() }).unwrap();
        writer.finish().unwrap();
        let bytes = writer.into_inner();

        let frames = read_frame_cache(&bytes).unwrap();
        assert_eq!(frames.len(), 2);
        // Values are exactly representable in f32
        assert_eq!(frames[0], sample_frame(1));
        assert!(frames[1].is_empty());
    }

    #[test]
    fn test_frame_cache_rejects_truncation() {
        let mut writer = FrameCacheWriter::new(Vec::new()).unwrap();
        writer.render(&sample_frame(1)).unwrap();
        let mut bytes = writer.into_inner();
        bytes.truncate(bytes.len() - 5);
        assert!(matches!(read_frame_cache(&bytes), Err(RenderError::InvalidCache(_))));
        assert!(read_frame_cache(b"nope").is_err());
    }

    #[test]
    fn test_json_lines() {
        let mut writer = JsonLinesWriter::new(Vec::new());
        writer.render(&sample_frame(4)).unwrap();
        writer.render(&sample_frame(5)).unwrap();
        writer.finish().unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: Frame = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, sample_frame(5));
    }

    #[test]
    fn test_recorder_via_mut_ref() {
        fn feed<R: InstanceRenderer>(mut renderer: R) {
            renderer.render(&sample_frame(1)).unwrap();
            renderer.finish().unwrap();
        }

        let mut recorder = FrameRecorder::new();
        feed(&mut recorder);
        assert_eq!(recorder.frames().len(), 1);
    }
}
