use anyhow::{Context, Result, anyhow, bail};
use sndmix::{OutputDevice, SndArchive, SoundEngine, SoundEngineDesc, SoundKey};
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub const USAGE: &str =
    "usage: sndmix-demo <archive.snd> <group> <index> [--loop] [--pitch F] [--volume N]";

/// How long a looping sound is played before the demo exits
const LOOP_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub archive: PathBuf,
    pub key: SoundKey,
    pub looping: bool,
    pub pitch: f32,
    pub volume: i32,
}

impl Options {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut positional = Vec::new();
        let mut looping = false;
        let mut pitch = 1.0;
        let mut volume = 256;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--loop" => looping = true,
                "--pitch" => {
                    let value = iter.next().ok_or_else(|| anyhow!("--pitch needs a value"))?;
                    pitch = value
                        .parse()
                        .with_context(|| format!("invalid pitch {:?}", value))?;
                }
                "--volume" => {
                    let value = iter.next().ok_or_else(|| anyhow!("--volume needs a value"))?;
                    volume = value
                        .parse()
                        .with_context(|| format!("invalid volume {:?}", value))?;
                }
                flag if flag.starts_with("--") => bail!("unknown option {}", flag),
                _ => positional.push(arg.as_str()),
            }
        }

        let [archive, group, index] = positional[..] else {
            bail!("expected <archive.snd> <group> <index>");
        };

        Ok(Self {
            archive: PathBuf::from(archive),
            key: SoundKey::new(
                group.parse().with_context(|| format!("invalid group {:?}", group))?,
                index.parse().with_context(|| format!("invalid index {:?}", index))?,
            ),
            looping,
            pitch,
            volume,
        })
    }
}

pub fn run(options: &Options) -> Result<()> {
    log::info!("Loading archive {}", options.archive.display());
    let archive = SndArchive::from_path(&options.archive)
        .with_context(|| format!("failed to load {}", options.archive.display()))?;
    let (major, minor) = archive.version();
    log::info!("Archive version {}.{}, {} sounds", major, minor, archive.len());

    let desc = SoundEngineDesc::default();
    let frame_duration = desc.frame_duration();
    let mut engine = SoundEngine::new(desc)?;

    let mut device = OutputDevice::new();
    device.start(engine.frame_receiver())?;

    let voice_index = engine
        .play(&archive, options.key)
        .ok_or_else(|| anyhow!("no sound stored under {}", options.key))?;
    if let Some(voice) = engine.voices_mut().get_mut(voice_index) {
        voice.set_loop(options.looping);
        voice.set_pitch(options.pitch);
        voice.set_volume(options.volume);
    }
    log::info!(
        "Playing {} on voice {} (loop {}, pitch {}, volume {})",
        options.key,
        voice_index,
        options.looping,
        options.pitch,
        options.volume
    );

    let started = Instant::now();
    loop {
        // pace the frame loop by the consumer so the slot is free on each write
        while engine.handoff_pending() {
            std::thread::sleep(frame_duration / 8);
        }
        engine.render_frame();

        if engine.voices().active_count() == 0 {
            break;
        }
        if options.looping && started.elapsed() >= LOOP_DURATION {
            engine.voices_mut().stop_all();
            break;
        }
    }

    // let the last frame drain
    std::thread::sleep(frame_duration * 2);
    device.stop();

    log::info!(
        "Rendered {} frames, {} dropped, {} played",
        engine.frames_rendered(),
        engine.frames_dropped(),
        device.frames_played()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_defaults() {
        let options = Options::parse(&args(&["fight.snd", "5", "0"])).unwrap();
        assert_eq!(options.archive, PathBuf::from("fight.snd"));
        assert_eq!(options.key, SoundKey::new(5, 0));
        assert!(!options.looping);
        assert_eq!(options.pitch, 1.0);
        assert_eq!(options.volume, 256);
    }

    #[test]
    fn test_parse_flags() {
        let options = Options::parse(&args(&[
            "--loop", "common.snd", "--pitch", "1.5", "7", "--volume", "400", "2",
        ]))
        .unwrap();
        assert!(options.looping);
        assert_eq!(options.pitch, 1.5);
        assert_eq!(options.volume, 400);
        assert_eq!(options.key, SoundKey::new(7, 2));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Options::parse(&args(&["a.snd", "1"])).is_err());
        assert!(Options::parse(&args(&["a.snd", "x", "0"])).is_err());
        assert!(Options::parse(&args(&["a.snd", "1", "0", "--pitch"])).is_err());
        assert!(Options::parse(&args(&["a.snd", "1", "0", "--fast"])).is_err());
    }
}
