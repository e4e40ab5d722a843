// Mixer module - blends voices into a float accumulator and hands finished
// frames to the output side

use crate::audio_data::PcmAsset;
use crate::config::OUTPUT_SAMPLE_RATE;
use crate::normalizer::Normalizer;
use byteorder::{ByteOrder, LittleEndian};
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// One quantized output frame: interleaved 16-bit stereo samples
pub type Frame = Vec<i16>;

/// Producer side of the single-slot frame handoff
pub type FrameSender = Sender<Frame>;

/// Consumer side of the single-slot frame handoff
pub type FrameReceiver = Receiver<Frame>;

/// Creates the single-slot handoff between the mixing thread and the output consumer
pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    crossbeam_channel::bounded(1)
}

/// Converts a normalized sample to 16-bit, truncating toward zero
#[inline]
pub fn quantize(sample: f32) -> i16 {
    (32767.0 * sample) as i16
}

#[inline]
fn decode_sample(bytes: &[u8], bytes_per_sample: usize) -> f32 {
    if bytes_per_sample == 1 {
        (f32::from(bytes[0]) - 128.0) / 128.0
    } else {
        f32::from(LittleEndian::read_i16(bytes)) / 32768.0
    }
}

/// Stereo float accumulator for one output frame.
///
/// Every voice adds into the same buffer; [`Mixer::render`] then runs the
/// normalizer over it and quantizes to 16-bit.
#[derive(Debug)]
pub struct Mixer {
    /// Interleaved `[L0, R0, L1, R1, ...]`, `frame_len * 2` samples
    buffer: Vec<f32>,
    normalizer: Normalizer,
}

impl Mixer {
    pub fn new(frame_len: usize, normalizer: Normalizer) -> Self {
        Self {
            buffer: vec![0.0; frame_len * 2],
            normalizer,
        }
    }

    /// Number of stereo frames per mix
    pub fn frame_len(&self) -> usize {
        self.buffer.len() / 2
    }

    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn normalizer_mut(&mut self) -> &mut Normalizer {
        &mut self.normalizer
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
    }

    /// Resamples `wav` with nearest-neighbour stepping and adds it into the accumulator.
    ///
    /// # Arguments
    /// * `wav` - raw PCM bytes (8-bit unsigned or 16-bit signed little-endian)
    /// * `cursor` - fractional read position in source frames
    /// * `bytes_per_sample` - 1 or 2
    /// * `channels` - 1 (duplicated to both outputs) or 2
    /// * `sample_rate` - effective source rate, already multiplied by the pitch
    /// * `looping` - restart at frame 0 instead of stopping at the end
    /// * `volume` - linear gain, 1.0 is unity
    ///
    /// Returns the cursor to resume from on the next frame. When the source runs
    /// out without looping the remaining slots are left untouched. A looping
    /// source always returns a cursor inside the source. A non-positive or
    /// non-finite rate, or an unsupported layout, returns `wav.len()`, which the
    /// caller treats as exhausted.
    #[allow(clippy::too_many_arguments)]
    pub fn mix(
        &mut self,
        wav: &[u8],
        mut cursor: f64,
        bytes_per_sample: usize,
        channels: usize,
        sample_rate: f64,
        looping: bool,
        volume: f32,
    ) -> f64 {
        let step = sample_rate / f64::from(OUTPUT_SAMPLE_RATE);
        let supported = matches!(bytes_per_sample, 1 | 2) && matches!(channels, 1 | 2);
        let frame_bytes = bytes_per_sample * channels;
        if !(step > 0.0) || !step.is_finite() || !supported || wav.len() < frame_bytes {
            return wav.len() as f64;
        }

        // whole frames in the source; the cursor is compared before any integer cast
        let frames = (wav.len() / frame_bytes) as f64;
        for slot in self.buffer.chunks_exact_mut(2) {
            if !(cursor < frames) {
                if !looping {
                    break;
                }
                cursor = 0.0;
            }
            let index = cursor as usize * frame_bytes;

            let frame = &wav[index..index + frame_bytes];
            let left = decode_sample(frame, bytes_per_sample);
            let right = if channels == 2 {
                decode_sample(&frame[bytes_per_sample..], bytes_per_sample)
            } else {
                left
            };

            slot[0] += volume * left;
            slot[1] += volume * right;
            cursor += step;
        }

        if looping && !(cursor < frames) {
            cursor = 0.0;
        }
        cursor
    }

    /// Mixes a decoded asset at the given pitch multiplier, see [`Mixer::mix`]
    pub fn mix_asset(
        &mut self,
        asset: &PcmAsset,
        cursor: f64,
        pitch: f32,
        looping: bool,
        volume: f32,
    ) -> f64 {
        self.mix(
            asset.data(),
            cursor,
            asset.bytes_per_sample() as usize,
            asset.channels() as usize,
            f64::from(asset.sample_rate()) * f64::from(pitch),
            looping,
            volume,
        )
    }

    /// Normalizes and quantizes the accumulator into an output frame
    pub fn render(&mut self) -> Frame {
        let mut frame = Vec::with_capacity(self.buffer.len());
        for pair in self.buffer.chunks_exact(2) {
            let (left, right) = self.normalizer.process(pair[0], pair[1]);
            frame.push(quantize(left));
            frame.push(quantize(right));
        }
        frame
    }

    /// Renders the accumulator and offers it to the output without blocking.
    ///
    /// Returns false when the consumer still holds the previous frame (the new
    /// frame is dropped) or has gone away.
    pub fn write(&mut self, sender: &FrameSender) -> bool {
        let frame = self.render();
        match sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::trace!("Mixer: output slot still occupied, dropping frame");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Mixer: output consumer disconnected, dropping frame");
                false
            }
        }
    }
}
