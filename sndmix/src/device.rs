//! Audio output through cpal.
//!
//! [`OutputDevice`] opens the default output device at the mixer's fixed
//! format (48 kHz, interleaved stereo) and plays the frames handed off by a
//! [`SoundEngine`](crate::SoundEngine). The device callback never blocks: it
//! takes whatever frame is waiting in the handoff slot and plays silence when
//! the slot is empty.

use crate::config::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::error::{Result, SndMixError};
use crate::mixer::{Frame, FrameReceiver};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Playback stream fed from the frame handoff
pub struct OutputDevice {
    stream: Option<cpal::Stream>,
    is_running: Arc<AtomicBool>,
    frames_played: Arc<AtomicUsize>,
    underruns: Arc<AtomicUsize>,
}

impl OutputDevice {
    pub fn new() -> Self {
        Self {
            stream: None,
            is_running: Arc::new(AtomicBool::new(false)),
            frames_played: Arc::new(AtomicUsize::new(0)),
            underruns: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Opens the default output device and starts pulling frames from `receiver`
    pub fn start(&mut self, receiver: FrameReceiver) -> Result<()> {
        if self.is_running.load(Ordering::Relaxed) {
            return Err(SndMixError::Engine("Output device already started".into()));
        }

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            SndMixError::AudioDevice("No default output device available".into())
        })?;

        let config = cpal::StreamConfig {
            channels: OUTPUT_CHANNELS,
            sample_rate: cpal::SampleRate(OUTPUT_SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let default_config = device.default_output_config().map_err(|e| {
            SndMixError::AudioDevice(format!("Failed to get default config: {}", e))
        })?;

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => self.create_stream::<f32>(&device, &config, receiver)?,
            cpal::SampleFormat::I16 => self.create_stream::<i16>(&device, &config, receiver)?,
            cpal::SampleFormat::U16 => self.create_stream::<u16>(&device, &config, receiver)?,
            format => {
                return Err(SndMixError::AudioDevice(format!(
                    "Unsupported sample format {:?}",
                    format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| SndMixError::AudioDevice(format!("Failed to start stream: {}", e)))?;

        log::info!(
            "Output device started: {} Hz, {} channels, {:?}",
            OUTPUT_SAMPLE_RATE,
            OUTPUT_CHANNELS,
            default_config.sample_format()
        );

        self.stream = Some(stream);
        self.is_running.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.is_running.store(false, Ordering::Relaxed);
            drop(stream);
            log::info!(
                "Output device stopped after {} frames ({} underruns)",
                self.frames_played(),
                self.underruns()
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Stereo frames written to the device since start
    pub fn frames_played(&self) -> usize {
        self.frames_played.load(Ordering::Relaxed)
    }

    /// Number of callbacks that ran out of mixed audio and padded with silence
    pub fn underruns(&self) -> usize {
        self.underruns.load(Ordering::Relaxed)
    }

    fn create_stream<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        receiver: FrameReceiver,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<i16>,
    {
        let is_running = self.is_running.clone();
        let frames_played = self.frames_played.clone();
        let underruns = self.underruns.clone();
        let mut pending = FrameCursor::default();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if !is_running.load(Ordering::Relaxed) {
                        data.fill(T::from_sample(0i16));
                        return;
                    }

                    let written = pending.fill(data, &receiver);
                    if written < data.len() {
                        data[written..].fill(T::from_sample(0i16));
                        underruns.fetch_add(1, Ordering::Relaxed);
                    }
                    frames_played.fetch_add(written / OUTPUT_CHANNELS as usize, Ordering::Relaxed);
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| SndMixError::AudioDevice(format!("Failed to build stream: {}", e)))
    }
}

impl Default for OutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OutputDevice {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Partially consumed frame carried between device callbacks
#[derive(Default)]
struct FrameCursor {
    frame: Frame,
    offset: usize,
}

impl FrameCursor {
    /// Copies as many samples into `out` as are available without blocking
    fn fill<T>(&mut self, out: &mut [T], receiver: &FrameReceiver) -> usize
    where
        T: SizedSample + FromSample<i16>,
    {
        let mut written = 0;
        while written < out.len() {
            if self.offset >= self.frame.len() {
                match receiver.try_recv() {
                    Ok(frame) => {
                        self.frame = frame;
                        self.offset = 0;
                    }
                    Err(_) => break,
                }
                continue;
            }

            let count = (self.frame.len() - self.offset).min(out.len() - written);
            for (dst, &src) in out[written..written + count]
                .iter_mut()
                .zip(&self.frame[self.offset..self.offset + count])
            {
                *dst = T::from_sample(src);
            }
            written += count;
            self.offset += count;
        }
        written
    }
}
