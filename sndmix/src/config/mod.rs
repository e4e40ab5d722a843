mod engine_desc;

pub use engine_desc::{AUDIO_OUT_LEN, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE, SoundEngineDesc};
