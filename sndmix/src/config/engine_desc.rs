use crate::error::{Result, SndMixError};
use std::time::Duration;

/// Fixed output sample rate of the mixer in Hz
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;

/// Output is always interleaved stereo
pub const OUTPUT_CHANNELS: u16 = 2;

/// Default number of stereo frames produced per mix frame
pub const AUDIO_OUT_LEN: usize = 2048;

/// Configuration descriptor for a sound engine
#[derive(Debug, Clone)]
pub struct SoundEngineDesc {
    /// Number of playback voices in the pool
    pub voice_count: usize,
    /// Stereo frames produced per call to `render_frame`
    pub frame_len: usize,
    /// Adaptive loudness normalization; when off the normalizer runs at a static gain
    pub audio_ducking: bool,
    /// Sound effect volume in percent (0..=100)
    pub wav_volume: u32,
    /// Master volume in percent (0..=100)
    pub master_volume: u32,
    /// Background music volume in percent (0..=100)
    pub bgm_volume: u32,
}

impl Default for SoundEngineDesc {
    fn default() -> Self {
        Self {
            voice_count: 16,
            frame_len: AUDIO_OUT_LEN,
            audio_ducking: true,
            wav_volume: 80,
            master_volume: 80,
            bgm_volume: 80,
        }
    }
}

impl SoundEngineDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voice_count(mut self, count: usize) -> Self {
        self.voice_count = count;
        self
    }

    pub fn frame_len(mut self, len: usize) -> Self {
        self.frame_len = len;
        self
    }

    pub fn audio_ducking(mut self, enable: bool) -> Self {
        self.audio_ducking = enable;
        self
    }

    pub fn wav_volume(mut self, volume: u32) -> Self {
        self.wav_volume = volume;
        self
    }

    pub fn master_volume(mut self, volume: u32) -> Self {
        self.master_volume = volume;
        self
    }

    pub fn bgm_volume(mut self, volume: u32) -> Self {
        self.bgm_volume = volume;
        self
    }

    /// Wall-clock length of one mix frame at the output rate
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_len as f64 / OUTPUT_SAMPLE_RATE as f64)
    }

    /// Validates the descriptor, returning a configuration error for unusable values
    pub fn validate(&self) -> Result<()> {
        if self.voice_count == 0 {
            return Err(SndMixError::Configuration(
                "voice_count must be at least 1".into(),
            ));
        }
        if self.frame_len == 0 {
            return Err(SndMixError::Configuration(
                "frame_len must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("wav_volume", self.wav_volume),
            ("master_volume", self.master_volume),
            ("bgm_volume", self.bgm_volume),
        ] {
            if value > 100 {
                return Err(SndMixError::Configuration(format!(
                    "{} must be within 0..=100, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_desc_is_valid() {
        let desc = SoundEngineDesc::default();
        assert!(desc.validate().is_ok());
        assert_eq!(desc.frame_len, AUDIO_OUT_LEN);
        assert!(desc.audio_ducking);
    }

    #[test]
    fn test_invalid_desc() {
        assert!(SoundEngineDesc::new().voice_count(0).validate().is_err());
        assert!(SoundEngineDesc::new().frame_len(0).validate().is_err());
        assert!(SoundEngineDesc::new().wav_volume(101).validate().is_err());
        assert!(SoundEngineDesc::new().master_volume(250).validate().is_err());
    }

    #[test]
    fn test_frame_duration() {
        let desc = SoundEngineDesc::new().frame_len(480);
        assert_eq!(desc.frame_duration(), Duration::from_millis(10));
    }
}
