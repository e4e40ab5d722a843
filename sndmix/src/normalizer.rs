//! Adaptive stereo loudness normalizer.
//!
//! Each channel runs a small feedback loop: the signal is DC-corrected by
//! subtracting a slow running average from a fast one, scaled by the current
//! gain, hard-limited to ±1 when it would clip, and the gain is pulled down on
//! clipping or slowly raised when the mean level drops below 1/32 of full scale.
//! The gains proposed by the two channels are combined into the gain used for
//! the *next* sample, so the control signal lags the output by one sample.
//!
//! The constants below are part of the sound character and are kept as-is.

use crate::config::OUTPUT_SAMPLE_RATE;

const RATE: f64 = OUTPUT_SAMPLE_RATE as f64;

/// Upper bound for the adaptive gain
pub const MAX_GAIN: f64 = 16.0;

/// Gain applied to the first sample after construction
pub const INITIAL_GAIN: f64 = 4.0;

/// Per-channel compressor state
#[derive(Debug, Clone)]
struct ChannelNormalizer {
    /// Exponent applied to the gain reduction on clipping; stays at 0 or 1
    hardness: f64,
    /// Accumulated change applied to `hardness` every sample
    hardness_drift: f64,
    /// Adaptation rate of the gain recovery
    rate: f64,
    /// Running mean of the absolute output level
    mean_level: f64,
    /// Slow running average of the input (DC estimate)
    bias_slow: f64,
    /// Fast running average of the input
    bias_fast: f64,
}

impl Default for ChannelNormalizer {
    fn default() -> Self {
        Self {
            hardness: 1.0,
            hardness_drift: 0.0,
            rate: 1.0,
            mean_level: 1.0 / 32.0,
            bias_slow: 0.0,
            bias_fast: 0.0,
        }
    }
}

impl ChannelNormalizer {
    /// Processes one sample in place and returns the gain this channel proposes
    fn process(&mut self, gain: f64, sample: &mut f32) -> f64 {
        let input = f64::from(*sample);
        self.bias_slow = (self.bias_slow * RATE / 110.0 + input) / (RATE / 110.0 + 1.0);
        self.bias_fast = (self.bias_fast * RATE / 112640.0 + input) / (RATE / 112640.0 + 1.0);

        let mut gain = gain;
        let mut level = (self.bias_fast - self.bias_slow) * gain;

        if level.abs() > 1.0 {
            gain *= (1.0 / level.abs()).powf(self.hardness);
            self.hardness_drift += 32.0 * (1.0 - self.hardness) / (RATE + 32.0);
            level = if level < 0.0 { -1.0 } else { 1.0 };
        } else {
            let recovery =
                (1.0 - (1.0 - level.abs()).powf(64.0)) * (0.5 - level.abs()).powf(3.0);
            gain += gain
                * (self.hardness * (1.0 / 32.0 - self.mean_level) / self.rate
                    + recovery * self.rate * (1.0 - self.hardness) / 32.0)
                / (RATE * 2.0 / 8.0 + 1.0);
            self.hardness_drift -= (0.5 - self.mean_level) * self.hardness / (RATE * 2.0);
        }

        self.rate += (32.0 * self.rate * (1.0 / self.rate - level.abs()) - self.rate)
            / (32.0 * RATE * 2.0);
        self.mean_level += (level.abs() - self.mean_level) / (RATE * 2.0);

        self.hardness += self.hardness_drift;
        if self.hardness < 0.0 {
            self.hardness = 0.0;
        } else if self.hardness > 0.0 {
            self.hardness = 1.0;
        }

        *sample = level as f32;
        gain
    }
}

/// Two-channel loudness normalizer with an optional static-gain mode
#[derive(Debug, Clone)]
pub struct Normalizer {
    gain: f64,
    left: ChannelNormalizer,
    right: ChannelNormalizer,
    ducking: bool,
    static_gain: f64,
}

impl Normalizer {
    /// Creates a normalizer.
    ///
    /// `wav_volume` and `master_volume` are percentages and only matter when
    /// `ducking` is disabled.
    pub fn new(ducking: bool, wav_volume: u32, master_volume: u32) -> Self {
        Self {
            gain: INITIAL_GAIN,
            left: ChannelNormalizer::default(),
            right: ChannelNormalizer::default(),
            ducking,
            static_gain: Self::static_gain_for(wav_volume, master_volume),
        }
    }

    /// Gain used while ducking is disabled
    pub fn static_gain_for(wav_volume: u32, master_volume: u32) -> f64 {
        0.5 * (f64::from(wav_volume) * f64::from(master_volume) * 0.0001)
    }

    pub fn set_ducking(&mut self, enable: bool) {
        self.ducking = enable;
    }

    pub fn ducking(&self) -> bool {
        self.ducking
    }

    pub fn set_volumes(&mut self, wav_volume: u32, master_volume: u32) {
        self.static_gain = Self::static_gain_for(wav_volume, master_volume);
    }

    /// Gain that will be applied to the next sample
    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Normalizes one stereo sample pair into the range [-1, 1]
    pub fn process(&mut self, mut left: f32, mut right: f32) -> (f32, f32) {
        let left_gain = self.left.process(self.gain, &mut left);
        let right_gain = self.right.process(self.gain, &mut right);

        self.gain = if self.ducking {
            left_gain.min(right_gain).min(MAX_GAIN)
        } else {
            self.static_gain
        };

        (left, right)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(true, 100, 100)
    }
}
