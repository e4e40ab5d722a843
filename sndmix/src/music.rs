//! Background music control.
//!
//! Music decoding lives outside this crate. [`Bgm`] tracks which file is
//! playing, picks the format from the file extension and the volume from the
//! engine settings, and drives a host-supplied [`MusicBackend`].

use crate::config::SoundEngineDesc;
use crate::error::Result;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Music container formats recognized by file extension
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MusicFormat {
    Vorbis,
    Mp3,
    Flac,
    Midi,
}

impl MusicFormat {
    /// Detects the format from the extension; matching is case-sensitive
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(OsStr::to_str)? {
            "ogg" => Some(Self::Vorbis),
            "mp3" => Some(Self::Mp3),
            "flac" => Some(Self::Flac),
            "mid" => Some(Self::Midi),
            _ => None,
        }
    }
}

/// Exponential music volume derived from the bgm and master percentages.
///
/// The level is `2^exponent` with `exponent = -5 + bgm * 0.06 * master / 100`,
/// which spans roughly -30 dB to +6 dB over the percentage range.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MusicVolume {
    exponent: f64,
}

impl MusicVolume {
    pub fn new(bgm_volume: u32, master_volume: u32) -> Self {
        Self {
            exponent: -5.0 + f64::from(bgm_volume) * 0.06 * (f64::from(master_volume) / 100.0),
        }
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    pub fn is_silent(&self) -> bool {
        self.exponent <= -5.0
    }

    /// Linear gain to apply to decoded music samples
    pub fn gain(&self) -> f64 {
        if self.is_silent() {
            0.0
        } else {
            self.exponent.exp2()
        }
    }
}

/// Decoder and speaker integration for background music
pub trait MusicBackend {
    /// Starts looping playback of `path`
    fn open(&mut self, path: &Path, format: MusicFormat, volume: MusicVolume) -> Result<()>;

    fn pause(&mut self);

    /// Stops and discards whatever is currently playing
    fn clear(&mut self);
}

/// Background music controller
pub struct Bgm<B: MusicBackend> {
    backend: B,
    filename: Option<PathBuf>,
    bgm_volume: u32,
    master_volume: u32,
}

impl<B: MusicBackend> Bgm<B> {
    pub fn new(backend: B, bgm_volume: u32, master_volume: u32) -> Self {
        Self {
            backend,
            filename: None,
            bgm_volume,
            master_volume,
        }
    }

    /// Controller using the bgm and master volumes of an engine descriptor
    pub fn from_desc(backend: B, desc: &SoundEngineDesc) -> Self {
        Self::new(backend, desc.bgm_volume, desc.master_volume)
    }

    /// Switches to `path` unless a file with the same name is already open.
    ///
    /// Open failures are logged; the previous track is cleared either way.
    pub fn open(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let same_name = self
            .filename
            .as_deref()
            .is_some_and(|current| current.file_name() == path.file_name());
        if same_name {
            return;
        }

        self.filename = Some(path.to_path_buf());
        self.backend.clear();

        let Some(format) = MusicFormat::from_path(path) else {
            log::debug!("Bgm: no music format for {}", path.display());
            return;
        };

        let volume = self.volume();
        if let Err(err) = self.backend.open(path, format, volume) {
            log::warn!("Bgm: failed to open {}: {}", path.display(), err);
        }
    }

    pub fn pause(&mut self) {
        self.backend.pause();
    }

    /// Volumes used by the next `open`
    pub fn set_volumes(&mut self, bgm_volume: u32, master_volume: u32) {
        self.bgm_volume = bgm_volume;
        self.master_volume = master_volume;
    }

    pub fn volume(&self) -> MusicVolume {
        MusicVolume::new(self.bgm_volume, self.master_volume)
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SndMixError;
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct RecordingBackend {
        opened: Vec<(PathBuf, MusicFormat, MusicVolume)>,
        clears: usize,
        pauses: usize,
        fail: bool,
    }

    impl MusicBackend for RecordingBackend {
        fn open(&mut self, path: &Path, format: MusicFormat, volume: MusicVolume) -> Result<()> {
            if self.fail {
                return Err(SndMixError::Format("not a vorbis stream".into()));
            }
            self.opened.push((path.to_path_buf(), format, volume));
            Ok(())
        }

        fn pause(&mut self) {
            self.pauses += 1;
        }

        fn clear(&mut self) {
            self.clears += 1;
        }
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(MusicFormat::from_path(Path::new("a/title.ogg")), Some(MusicFormat::Vorbis));
        assert_eq!(MusicFormat::from_path(Path::new("stage.mp3")), Some(MusicFormat::Mp3));
        assert_eq!(MusicFormat::from_path(Path::new("x.flac")), Some(MusicFormat::Flac));
        assert_eq!(MusicFormat::from_path(Path::new("x.mid")), Some(MusicFormat::Midi));
        assert_eq!(MusicFormat::from_path(Path::new("x.MP3")), None);
        assert_eq!(MusicFormat::from_path(Path::new("x.wav")), None);
        assert_eq!(MusicFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_volume_law() {
        let volume = MusicVolume::new(100, 100);
        assert_relative_eq!(volume.exponent(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(volume.gain(), 2.0, epsilon = 1e-12);

        let volume = MusicVolume::new(50, 50);
        assert_relative_eq!(volume.exponent(), -3.5, epsilon = 1e-12);

        assert!(MusicVolume::new(0, 100).is_silent());
        assert!(MusicVolume::new(100, 0).is_silent());
        assert_eq!(MusicVolume::new(0, 0).gain(), 0.0);
    }

    #[test]
    fn test_from_desc_uses_bgm_and_master_volume() {
        let desc = SoundEngineDesc::new().bgm_volume(50).master_volume(50).wav_volume(0);
        let mut bgm = Bgm::from_desc(RecordingBackend::default(), &desc);
        assert_relative_eq!(bgm.volume().exponent(), -3.5, epsilon = 1e-12);

        bgm.open("title.flac");
        assert_eq!(bgm.backend().opened[0].2, MusicVolume::new(50, 50));
    }

    #[test]
    fn test_open_same_name_is_a_no_op() {
        let mut bgm = Bgm::new(RecordingBackend::default(), 80, 80);
        bgm.open("sound/stage1.ogg");
        bgm.open("other/dir/stage1.ogg");

        assert_eq!(bgm.backend().opened.len(), 1);
        assert_eq!(bgm.backend().clears, 1);
        assert_eq!(bgm.filename(), Some(Path::new("sound/stage1.ogg")));
    }

    #[test]
    fn test_open_switches_track() {
        let mut bgm = Bgm::new(RecordingBackend::default(), 100, 100);
        bgm.open("stage1.ogg");
        bgm.set_volumes(50, 50);
        bgm.open("stage2.mid");

        let opened = &bgm.backend().opened;
        assert_eq!(opened.len(), 2);
        assert_eq!(opened[1].1, MusicFormat::Midi);
        assert_relative_eq!(opened[1].2.exponent(), -3.5, epsilon = 1e-12);
        assert_eq!(bgm.backend().clears, 2);
    }

    #[test]
    fn test_unknown_format_clears_without_opening() {
        let mut bgm = Bgm::new(RecordingBackend::default(), 80, 80);
        bgm.open("stage1.ogg");
        bgm.open("readme.txt");
        assert_eq!(bgm.backend().opened.len(), 1);
        assert_eq!(bgm.backend().clears, 2);
        assert_eq!(bgm.filename(), Some(Path::new("readme.txt")));
    }

    #[test]
    fn test_backend_failure_is_swallowed() {
        let backend = RecordingBackend {
            fail: true,
            ..Default::default()
        };
        let mut bgm = Bgm::new(backend, 80, 80);
        bgm.open("broken.ogg");
        bgm.pause();
        assert!(bgm.backend().opened.is_empty());
        assert_eq!(bgm.backend().pauses, 1);
    }
}
