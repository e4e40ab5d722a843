//! Voice state and allocation.
//!
//! This module provides the playback side of the mixer:
//! - [`Voice`]: one playback channel with its own volume, loop flag, pitch and cursor
//! - [`VoicePool`]: the fixed set of voices, allocated first-fit by index
//!
//! Most hosts will go through [`SoundEngine`](crate::SoundEngine), which owns
//! the pool and advances it once per output frame.

use crate::audio_data::{PcmAsset, SoundKey, SoundLookup};
use crate::mixer::Mixer;

/// Highest volume a voice accepts; 256 is unity gain
pub const MAX_VOLUME: i32 = 512;

/// Volume of a freshly created voice
pub const UNITY_VOLUME: i16 = 256;

/// A single playback channel.
///
/// A voice is busy while it holds an asset. The asset handle shares the
/// decoded bytes with the archive that owns them; the voice never mutates it.
#[derive(Debug, Clone)]
pub struct Voice {
    asset: Option<PcmAsset>,
    volume: i16,
    looping: bool,
    pitch: f32,
    /// Fractional read position in source frames
    position: f64,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            asset: None,
            volume: UNITY_VOLUME,
            looping: false,
            pitch: 1.0,
            position: 0.0,
        }
    }
}

impl Voice {
    /// Starts `asset` from the beginning; `None` leaves the voice idle.
    ///
    /// Volume, loop and pitch settings are kept.
    pub fn assign(&mut self, asset: Option<PcmAsset>) {
        self.asset = asset;
        self.position = 0.0;
    }

    /// Stops playback and resets the cursor
    pub fn stop(&mut self) {
        self.asset = None;
        self.position = 0.0;
    }

    pub fn is_playing(&self) -> bool {
        self.asset.is_some()
    }

    pub fn asset(&self) -> Option<&PcmAsset> {
        self.asset.as_ref()
    }

    /// Sets the volume, clamped to `0..=512`
    pub fn set_volume(&mut self, volume: i32) {
        self.volume = volume.clamp(0, MAX_VOLUME) as i16;
    }

    pub fn volume(&self) -> i16 {
        self.volume
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Playback rate multiplier, 1.0 plays at the asset's native rate
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Stereo placement. Not implemented: voices always play centered.
    pub fn set_pan(&mut self, _pan: f32) {}

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Mixes this voice into the current frame.
    ///
    /// Returns true when the voice finished and was released.
    pub(crate) fn advance(&mut self, mixer: &mut Mixer) -> bool {
        let Some(asset) = &self.asset else {
            return false;
        };

        let frame_count = asset.frame_count();
        let rate = f64::from(asset.sample_rate()) * f64::from(self.pitch);
        self.position = mixer.mix_asset(
            asset,
            self.position,
            self.pitch,
            self.looping,
            f32::from(self.volume) / 256.0,
        );

        // looping voices are wrapped by the mixer; they only end when they cannot advance
        let exhausted = !(self.position < frame_count as f64);
        let stalled = !(rate > 0.0) || !rate.is_finite() || frame_count == 0;
        if exhausted && (!self.looping || stalled) {
            self.stop();
            return true;
        }
        false
    }
}

/// Fixed-size pool of voices
#[derive(Debug, Clone)]
pub struct VoicePool {
    voices: Vec<Voice>,
}

impl VoicePool {
    pub fn new(count: usize) -> Self {
        Self {
            voices: vec![Voice::default(); count],
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Voice> {
        self.voices.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Number of voices currently holding an asset
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|voice| voice.is_playing()).count()
    }

    /// Index of the lowest-numbered idle voice
    pub fn allocate_index(&self) -> Option<usize> {
        self.voices.iter().position(|voice| !voice.is_playing())
    }

    /// Returns the lowest-numbered idle voice, or `None` if every voice is busy
    pub fn allocate(&mut self) -> Option<&mut Voice> {
        self.voices.iter_mut().find(|voice| !voice.is_playing())
    }

    /// Looks up `key` and starts it on the first idle voice.
    ///
    /// Returns the voice index, or `None` if no voice is free or the key is unknown.
    pub fn play(&mut self, lookup: &impl SoundLookup, key: SoundKey) -> Option<usize> {
        let Some(index) = self.allocate_index() else {
            log::debug!("No free voice for {}", key);
            return None;
        };
        let Some(asset) = lookup.sound(key) else {
            log::debug!("No sound stored under {}", key);
            return None;
        };

        log::debug!(
            "Voice {} playing {} ({} frames at {} Hz)",
            index,
            key,
            asset.frame_count(),
            asset.sample_rate()
        );
        self.voices[index].assign(Some(asset));
        Some(index)
    }

    /// Mixes every busy voice into `mixer` and releases the finished ones.
    ///
    /// Returns the number of voices released during this frame.
    pub fn advance_all(&mut self, mixer: &mut Mixer) -> usize {
        let mut released = 0;
        for (index, voice) in self.voices.iter_mut().enumerate() {
            if voice.advance(mixer) {
                log::trace!("Voice {} finished", index);
                released += 1;
            }
        }
        released
    }

    pub fn stop_all(&mut self) {
        for voice in &mut self.voices {
            voice.stop();
        }
    }
}
