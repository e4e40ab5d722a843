use super::PcmAsset;
use super::wave::{read_magic, read_wave};
use crate::error::{Result, SndMixError};
use crate::playback::VoicePool;
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Signature at the start of every SND archive
pub const ARCHIVE_MAGIC: &[u8; 12] = b"ElecbyteSnd\0";

/// Composite key addressing one sound inside an archive.
///
/// Archives written by common authoring tools use `group` for the sound
/// category and `index` for the variant within it. Both components of a
/// stored key are non-negative.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundKey {
    pub group: i32,
    pub index: i32,
}

impl SoundKey {
    pub const fn new(group: i32, index: i32) -> Self {
        Self { group, index }
    }

    /// Keys with a negative component are never stored
    pub fn is_valid(&self) -> bool {
        self.group >= 0 && self.index >= 0
    }
}

impl From<(i32, i32)> for SoundKey {
    fn from((group, index): (i32, i32)) -> Self {
        Self::new(group, index)
    }
}

impl std::fmt::Display for SoundKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoundKey({}, {})", self.group, self.index)
    }
}

/// Read-only lookup of decoded sounds by key.
///
/// Implemented by [`SndArchive`]; voice assignment goes through this trait so
/// hosts can plug in their own tables.
pub trait SoundLookup {
    /// Returns the sound stored under `key`, or `None` if there is no such sound
    fn sound(&self, key: SoundKey) -> Option<PcmAsset>;
}

/// Decoded SND archive: a table of PCM sounds keyed by [`SoundKey`].
///
/// Loading is all-or-nothing. Either every sub-header in the chain is read and
/// decoded, or the load fails and no table is produced. Once loaded the table
/// is immutable and may be shared between threads freely.
///
/// # Layout
///
/// ```text
/// 0   "ElecbyteSnd\0"
/// 12  u16 format version, u16 sub-format version
/// 16  u32 entry count
/// 20  u32 offset of the first sub-header
///
/// sub-header (at its offset):
///     u32 next sub-header offset
///     u32 sub-file length
///     i32 group, i32 index
///     RIFF/WAVE container
/// ```
///
/// All offsets are absolute positions in the stream.
#[derive(Debug, Default)]
pub struct SndArchive {
    table: HashMap<SoundKey, PcmAsset>,
    version: u16,
    sub_version: u16,
}

impl SndArchive {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        log::debug!("Loading SND archive {}", path.display());
        Self::from_reader(&mut BufReader::new(file))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(&mut Cursor::new(bytes))
    }

    /// Decodes an archive whose signature starts at stream position 0
    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        if read_magic(reader, ARCHIVE_MAGIC.len())? != ARCHIVE_MAGIC {
            return Err(SndMixError::Format("missing ElecbyteSnd signature".into()));
        }

        let version = reader.read_u16::<LittleEndian>()?;
        let sub_version = reader.read_u16::<LittleEndian>()?;
        let entry_count = reader.read_u32::<LittleEndian>()?;
        let mut sub_header_offset = reader.read_u32::<LittleEndian>()?;

        let mut table = HashMap::new();

        for entry in 0..entry_count {
            reader.seek(SeekFrom::Start(u64::from(sub_header_offset)))?;

            let next_offset = reader.read_u32::<LittleEndian>()?;
            let sub_file_len = reader.read_u32::<LittleEndian>()?;
            let group = reader.read_i32::<LittleEndian>()?;
            let index = reader.read_i32::<LittleEndian>()?;
            let key = SoundKey::new(group, index);

            if !key.is_valid() {
                log::debug!("Entry {} has negative key {}, skipped", entry, key);
            } else if table.contains_key(&key) {
                log::debug!("Entry {} repeats {}, keeping the first", entry, key);
            } else {
                let decoded = read_wave(reader).map_err(|e| {
                    e.with_context(format_args!(
                        "entry {} {} at offset {}",
                        entry, key, sub_header_offset
                    ))
                })?;
                match decoded {
                    Some(asset) => {
                        log::debug!(
                            "Entry {} {}: {} Hz, {} ch, {}-bit, {} bytes (sub-file {} bytes)",
                            entry,
                            key,
                            asset.sample_rate(),
                            asset.channels(),
                            asset.bytes_per_sample() * 8,
                            asset.data().len(),
                            sub_file_len
                        );
                        table.insert(key, asset);
                    }
                    // an empty entry leaves the key free, so a later entry with the
                    // same key can still supply it
                    None => log::debug!("Entry {} {} holds no sound data", entry, key),
                }
            }

            sub_header_offset = next_offset;
        }

        log::info!(
            "Loaded SND archive v{}.{}: {} sounds from {} entries",
            version,
            sub_version,
            table.len(),
            entry_count
        );

        Ok(Self {
            table,
            version,
            sub_version,
        })
    }

    /// Returns the sound stored under `key`
    pub fn get(&self, key: SoundKey) -> Option<&PcmAsset> {
        self.table.get(&key)
    }

    /// Format and sub-format version fields from the header
    pub fn version(&self) -> (u16, u16) {
        (self.version, self.sub_version)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = SoundKey> + '_ {
        self.table.keys().copied()
    }

    /// Starts `key` on the first free voice of `pool`.
    ///
    /// Returns false when every voice is busy or the key is unknown.
    pub fn play(&self, pool: &mut VoicePool, key: SoundKey) -> bool {
        pool.play(self, key).is_some()
    }
}

impl SoundLookup for SndArchive {
    fn sound(&self, key: SoundKey) -> Option<PcmAsset> {
        self.get(key).cloned()
    }
}
