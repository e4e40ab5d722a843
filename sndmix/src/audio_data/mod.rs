mod archive;
mod wave;

pub use archive::{ARCHIVE_MAGIC, SndArchive, SoundKey, SoundLookup};
pub use wave::read_wave;

use crate::error::Result;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Decoded PCM sound effect with reference-counted sharing.
///
/// Cloning is cheap: voices hold clones of the handle while the owning
/// [`SndArchive`] keeps the table entry alive. The sample bytes are never
/// mutated after decoding.
///
/// # Data Format
/// Samples are stored exactly as they appear in the container's `data` chunk:
/// - 8-bit: unsigned bytes, silence at 128
/// - 16-bit: signed little-endian pairs
/// - Stereo is interleaved `[L0, R0, L1, R1, ...]`
#[derive(Debug, Clone)]
pub struct PcmAsset {
    inner: Arc<PcmAssetInner>,
}

#[derive(Debug)]
pub(crate) struct PcmAssetInner {
    /// Sample rate in Hz, within `1..0xFFFFF`
    pub sample_rate: u32,
    /// 1 = mono, 2 = stereo
    pub channels: u16,
    /// 1 = 8-bit unsigned, 2 = 16-bit signed
    pub bytes_per_sample: u16,
    /// Raw PCM payload
    pub data: Vec<u8>,
}

impl PcmAsset {
    pub(crate) fn new(sample_rate: u32, channels: u16, bytes_per_sample: u16, data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(PcmAssetInner {
                sample_rate,
                channels,
                bytes_per_sample,
                data,
            }),
        }
    }

    /// Decodes a standalone container from a file.
    ///
    /// Returns `Ok(None)` when the container holds neither a `fmt ` nor a `data` chunk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Decodes a standalone container held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Option<Self>> {
        read_wave(&mut Cursor::new(bytes))
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn bytes_per_sample(&self) -> u16 {
        self.inner.bytes_per_sample
    }

    pub fn data(&self) -> &[u8] {
        &self.inner.data
    }

    /// Bytes per frame (one sample for every channel)
    pub fn frame_bytes(&self) -> usize {
        self.inner.channels as usize * self.inner.bytes_per_sample as usize
    }

    /// Total number of whole frames in the payload
    pub fn frame_count(&self) -> usize {
        self.inner.data.len() / self.frame_bytes()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / self.inner.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    /// True when both handles point at the same decoded payload
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
