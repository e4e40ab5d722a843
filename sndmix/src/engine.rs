use crate::audio_data::{SoundKey, SoundLookup};
use crate::config::SoundEngineDesc;
use crate::error::Result;
use crate::mixer::{FrameReceiver, FrameSender, Mixer, frame_channel};
use crate::normalizer::Normalizer;
use crate::playback::VoicePool;

/// Mixing context owned by the host's frame loop.
///
/// Holds the voice pool, the mixer with its normalizer, and the producer side
/// of the single-slot frame handoff. The host calls [`SoundEngine::render_frame`]
/// once per frame; the consumer side obtained from
/// [`SoundEngine::frame_receiver`] is drained by an output device.
pub struct SoundEngine {
    desc: SoundEngineDesc,
    mixer: Mixer,
    voices: VoicePool,
    frame_sender: FrameSender,
    frame_receiver: FrameReceiver,
    frames_rendered: u64,
    frames_dropped: u64,
}

impl SoundEngine {
    /// Create a new engine with the given configuration
    pub fn new(desc: SoundEngineDesc) -> Result<Self> {
        desc.validate()?;

        let normalizer = Normalizer::new(desc.audio_ducking, desc.wav_volume, desc.master_volume);
        let (frame_sender, frame_receiver) = frame_channel();

        log::debug!(
            "SoundEngine: {} voices, {} frames per mix, ducking {}",
            desc.voice_count,
            desc.frame_len,
            desc.audio_ducking
        );

        Ok(Self {
            mixer: Mixer::new(desc.frame_len, normalizer),
            voices: VoicePool::new(desc.voice_count),
            frame_sender,
            frame_receiver,
            frames_rendered: 0,
            frames_dropped: 0,
            desc,
        })
    }

    /// Consumer side of the frame handoff; may be cloned and moved to another thread
    pub fn frame_receiver(&self) -> FrameReceiver {
        self.frame_receiver.clone()
    }

    /// True while the previous frame has not been taken by the consumer
    pub fn handoff_pending(&self) -> bool {
        self.frame_sender.is_full()
    }

    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut VoicePool {
        &mut self.voices
    }

    /// Starts `key` on the first idle voice and returns its index
    pub fn play(&mut self, lookup: &impl SoundLookup, key: SoundKey) -> Option<usize> {
        self.voices.play(lookup, key)
    }

    /// Mixes every active voice into one output frame and offers it to the consumer.
    ///
    /// Returns false when the frame was dropped because the consumer had not yet
    /// taken the previous one.
    pub fn render_frame(&mut self) -> bool {
        self.mixer.clear();
        let released = self.voices.advance_all(&mut self.mixer);
        if released > 0 {
            log::trace!("SoundEngine: {} voices released", released);
        }

        let accepted = self.mixer.write(&self.frame_sender);
        self.frames_rendered += 1;
        if !accepted {
            self.frames_dropped += 1;
        }
        accepted
    }

    pub fn set_audio_ducking(&mut self, enable: bool) {
        self.desc.audio_ducking = enable;
        self.mixer.normalizer_mut().set_ducking(enable);
    }

    /// Updates the volumes used by the static gain when ducking is off
    pub fn set_volumes(&mut self, wav_volume: u32, master_volume: u32) {
        self.desc.wav_volume = wav_volume.min(100);
        self.desc.master_volume = master_volume.min(100);
        self.mixer
            .normalizer_mut()
            .set_volumes(self.desc.wav_volume, self.desc.master_volume);
    }

    /// Frames produced since creation, including dropped ones
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn desc(&self) -> &SoundEngineDesc {
        &self.desc
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }
}
