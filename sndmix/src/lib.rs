//! # sndmix
//!
//! A sound-effect mixer for games that ship their effects in `ElecbyteSnd`
//! archives of RIFF/WAVE containers.
//!
//! The host owns a [`SoundEngine`], starts sounds on its voices, and calls
//! [`SoundEngine::render_frame`] once per frame. Each call blends the active
//! voices at 48 kHz with nearest-neighbour resampling, runs the adaptive stereo
//! normalizer, quantizes to 16-bit and offers the frame to the output through a
//! single-slot handoff that drops the frame rather than blocking.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sndmix::*;
//!
//! let archive = SndArchive::from_path("common.snd")?;
//!
//! let mut engine = SoundEngine::new(SoundEngineDesc::default())?;
//! let output = engine.frame_receiver();
//!
//! if let Some(voice) = engine.play(&archive, SoundKey::new(5, 0)) {
//!     engine.voices_mut().get_mut(voice).unwrap().set_volume(384);
//! }
//!
//! loop {
//!     engine.render_frame();
//!     if let Ok(frame) = output.try_recv() {
//!         // interleaved stereo i16 at 48 kHz
//!         let _ = frame;
//!     }
//!     if engine.voices().active_count() == 0 {
//!         break;
//!     }
//! }
//! # Ok::<(), SndMixError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`SndArchive`]**: decoded archive, a table of sounds keyed by [`SoundKey`]
//! - **[`PcmAsset`]**: one decoded sound, shared between the archive and voices
//! - **[`VoicePool`]** / **[`Voice`]**: fixed set of playback channels
//! - **[`Mixer`]** and **[`Normalizer`]**: accumulation and loudness control
//! - **[`Bgm`]**: background music control over a host [`MusicBackend`]
//! - **`OutputDevice`**: cpal playback of handed-off frames (feature `device`)

pub mod audio_data;
pub mod config;
#[cfg(feature = "device")]
pub mod device;
pub mod engine;
pub mod error;
pub mod mixer;
pub mod music;
pub mod normalizer;
pub mod playback;

pub use audio_data::{PcmAsset, SndArchive, SoundKey, SoundLookup, read_wave};
pub use config::{AUDIO_OUT_LEN, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE, SoundEngineDesc};
#[cfg(feature = "device")]
pub use device::OutputDevice;
pub use engine::SoundEngine;
pub use error::SndMixError;
pub use mixer::{Frame, FrameReceiver, FrameSender, Mixer, frame_channel};
pub use music::{Bgm, MusicBackend, MusicFormat, MusicVolume};
pub use normalizer::Normalizer;
pub use playback::{Voice, VoicePool};
