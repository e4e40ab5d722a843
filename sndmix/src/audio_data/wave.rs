use super::PcmAsset;
use crate::error::{Result, SndMixError};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

const RIFF_TAG: &[u8] = b"RIFF";
const WAVE_TAG: &[u8] = b"WAVE";
const FMT_TAG: [u8; 4] = *b"fmt ";
const DATA_TAG: [u8; 4] = *b"data";

/// Codec id of uncompressed linear PCM in the `fmt ` chunk
const WAVE_FORMAT_PCM: u16 = 1;

/// Exclusive upper bound for the declared sample rate
const MAX_SAMPLE_RATE: u32 = 0xFFFFF;

/// Parameters returned when the container has a `RIFF` header but no `WAVE` form type
const FALLBACK_SAMPLE_RATE: u32 = 11025;

#[derive(Debug, Clone, Copy)]
struct FormatChunk {
    channels: u16,
    sample_rate: u32,
    bytes_per_sample: u16,
}

/// Reads up to `len` bytes for a magic comparison.
///
/// A short read is not an error here: it simply fails to match, so a stream
/// that is too small to hold the tag is reported as a format error by the caller.
pub(crate) fn read_magic<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut magic = Vec::with_capacity(len);
    reader.by_ref().take(len as u64).read_to_end(&mut magic)?;
    Ok(magic)
}

fn read_tag<R: Read>(reader: &mut R) -> Result<[u8; 4]> {
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag)?;
    Ok(tag)
}

fn read_format_chunk<R: Read>(reader: &mut R) -> Result<FormatChunk> {
    let codec = reader.read_u16::<LittleEndian>()?;
    if codec != WAVE_FORMAT_PCM {
        return Err(SndMixError::Format(format!(
            "not linear PCM (codec id {})",
            codec
        )));
    }

    let channels = reader.read_u16::<LittleEndian>()?;
    if !(1..=2).contains(&channels) {
        return Err(SndMixError::Format(format!(
            "invalid channel count {}",
            channels
        )));
    }

    let sample_rate = reader.read_u32::<LittleEndian>()?;
    if !(1..MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(SndMixError::Format(format!(
            "invalid sample rate {}",
            sample_rate
        )));
    }

    // byte rate and block align are derived values; the decoder ignores them
    let _byte_rate = reader.read_u32::<LittleEndian>()?;
    let _block_align = reader.read_u16::<LittleEndian>()?;

    let bits_per_sample = reader.read_u16::<LittleEndian>()?;
    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(SndMixError::Format(format!(
            "unsupported bit depth {}",
            bits_per_sample
        )));
    }

    Ok(FormatChunk {
        channels,
        sample_rate,
        bytes_per_sample: bits_per_sample >> 3,
    })
}

fn read_data_chunk<R: Read>(reader: &mut R, size: u32) -> Result<Vec<u8>> {
    let mut pcm = Vec::new();
    reader.by_ref().take(u64::from(size)).read_to_end(&mut pcm)?;
    if pcm.len() != size as usize {
        return Err(SndMixError::TruncatedInput(format!(
            "data chunk declares {} bytes but only {} are present",
            size,
            pcm.len()
        )));
    }
    Ok(pcm)
}

/// Decodes a RIFF/WAVE container starting at the reader's current position.
///
/// Chunks are scanned until both `fmt ` and `data` have been seen or the
/// declared RIFF extent runs out; unknown chunks are skipped.
///
/// # Returns
///
/// - `Ok(Some(asset))` for a valid container
/// - `Ok(Some(asset))` with 8-bit mono 11025 Hz and no samples when the
///   `RIFF` header is not followed by a `WAVE` form type
/// - `Ok(None)` when neither a `fmt ` nor a non-empty `data` chunk was found
///
/// # Errors
///
/// [`SndMixError::Format`] for a missing `RIFF` tag, a non-PCM codec, an
/// invalid channel count, sample rate or bit depth, a `data` chunk without a
/// `fmt ` chunk, or a payload that is not a whole number of frames.
/// [`SndMixError::TruncatedInput`] when the stream ends early.
pub fn read_wave<R: Read + Seek>(reader: &mut R) -> Result<Option<PcmAsset>> {
    let start = reader.stream_position()?;

    if read_magic(reader, RIFF_TAG.len())? != RIFF_TAG {
        return Err(SndMixError::Format(format!(
            "missing RIFF tag at offset {}",
            start
        )));
    }

    let riff_size = reader.read_u32::<LittleEndian>()?;
    let riff_end = start + 8 + u64::from(riff_size);

    if read_magic(reader, WAVE_TAG.len())? != WAVE_TAG {
        log::debug!(
            "RIFF at offset {} has no WAVE form type, using empty fallback sound",
            start
        );
        return Ok(Some(PcmAsset::new(FALLBACK_SAMPLE_RATE, 1, 1, Vec::new())));
    }

    let mut format: Option<FormatChunk> = None;
    let mut data: Option<Vec<u8>> = None;
    let mut chunk_pos = start + 12;

    while (format.is_none() || data.is_none()) && chunk_pos < riff_end {
        let tag = read_tag(reader)?;
        let size = reader.read_u32::<LittleEndian>()?;

        match tag {
            FMT_TAG => format = Some(read_format_chunk(reader)?),
            DATA_TAG => {
                // an empty data chunk does not end the scan
                let pcm = read_data_chunk(reader, size)?;
                if !pcm.is_empty() {
                    data = Some(pcm);
                }
            }
            _ => log::trace!(
                "Skipping '{}' chunk ({} bytes) at offset {}",
                String::from_utf8_lossy(&tag),
                size,
                chunk_pos
            ),
        }

        chunk_pos += 8 + u64::from(size);
        reader.seek(SeekFrom::Start(chunk_pos))?;
    }

    let Some(format) = format else {
        if data.is_some() {
            return Err(SndMixError::Format("data chunk without fmt chunk".into()));
        }
        return Ok(None);
    };

    let data = data.unwrap_or_default();
    let frame_bytes = format.channels as usize * format.bytes_per_sample as usize;
    if data.len() % frame_bytes != 0 {
        return Err(SndMixError::Format(format!(
            "data length {} is not a multiple of the {}-byte frame",
            data.len(),
            frame_bytes
        )));
    }

    Ok(Some(PcmAsset::new(
        format.sample_rate,
        format.channels,
        format.bytes_per_sample,
        data,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_data::test_support::{fmt_payload, riff_bytes, wav_bytes, wav_bytes_with_codec};
    use std::io::Cursor;

    fn decode(bytes: &[u8]) -> Result<Option<PcmAsset>> {
        read_wave(&mut Cursor::new(bytes))
    }

    #[test]
    fn test_decode_8bit_mono() {
        let asset = decode(&wav_bytes(11025, 1, 8, &[64, 192, 0, 255]))
            .unwrap()
            .unwrap();
        assert_eq!(asset.sample_rate(), 11025);
        assert_eq!(asset.channels(), 1);
        assert_eq!(asset.bytes_per_sample(), 1);
        assert_eq!(asset.data(), &[64, 192, 0, 255]);
    }

    #[test]
    fn test_decode_16bit_stereo() {
        let pcm: Vec<u8> = (0..32).collect();
        let asset = decode(&wav_bytes(44100, 2, 16, &pcm)).unwrap().unwrap();
        assert_eq!(asset.sample_rate(), 44100);
        assert_eq!(asset.channels(), 2);
        assert_eq!(asset.bytes_per_sample(), 2);
        assert_eq!(asset.data(), pcm.as_slice());
        assert_eq!(asset.frame_count(), 8);
    }

    #[test]
    fn test_decode_at_nonzero_offset() {
        let mut bytes = vec![0xAA; 37];
        bytes.extend(wav_bytes(8000, 1, 16, &[0, 1, 2, 3]));
        let mut cursor = Cursor::new(bytes);
        cursor.seek(SeekFrom::Start(37)).unwrap();
        let asset = read_wave(&mut cursor).unwrap().unwrap();
        assert_eq!(asset.sample_rate(), 8000);
        assert_eq!(asset.data(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_rejects_non_pcm_codec() {
        let err = decode(&wav_bytes_with_codec(3, 44100, 1, 16, &[0, 0])).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_rejects_bad_channel_count() {
        for channels in [0u16, 3, 6] {
            let bytes = riff_bytes(&[
                (b"fmt ", fmt_payload(1, channels, 22050, 8)),
                (b"data", vec![128; 12]),
            ]);
            assert!(decode(&bytes).unwrap_err().is_format(), "channels = {}", channels);
        }
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        for rate in [0u32, 0xFFFFF, u32::MAX] {
            let bytes = wav_bytes(rate, 1, 8, &[128]);
            assert!(decode(&bytes).unwrap_err().is_format(), "rate = {}", rate);
        }
        assert!(decode(&wav_bytes(0xFFFFE, 1, 8, &[128])).unwrap().is_some());
    }

    #[test]
    fn test_rejects_bad_bit_depth() {
        for bits in [4u16, 12, 24, 32] {
            let bytes = riff_bytes(&[
                (b"fmt ", fmt_payload(1, 1, 22050, bits)),
                (b"data", vec![0; 12]),
            ]);
            assert!(decode(&bytes).unwrap_err().is_format(), "bits = {}", bits);
        }
    }

    #[test]
    fn test_missing_riff_tag_is_format_error() {
        let mut bytes = wav_bytes(11025, 1, 8, &[128]);
        bytes[0..4].copy_from_slice(b"RIFX");
        assert!(decode(&bytes).unwrap_err().is_format());
        assert!(decode(b"RI").unwrap_err().is_format());
    }

    #[test]
    fn test_missing_wave_tag_yields_fallback() {
        let mut bytes = wav_bytes(44100, 2, 16, &[0; 8]);
        bytes[8..12].copy_from_slice(b"AVI ");
        let asset = decode(&bytes).unwrap().unwrap();
        assert_eq!(asset.sample_rate(), 11025);
        assert_eq!(asset.channels(), 1);
        assert_eq!(asset.bytes_per_sample(), 1);
        assert!(asset.is_empty());
    }

    #[test]
    fn test_data_without_fmt_is_format_error() {
        let bytes = riff_bytes(&[(b"data", vec![1, 2, 3, 4])]);
        assert!(decode(&bytes).unwrap_err().is_format());
    }

    #[test]
    fn test_no_recognized_chunks_yields_none() {
        assert!(decode(&riff_bytes(&[])).unwrap().is_none());
        assert!(
            decode(&riff_bytes(&[(b"LIST", vec![0; 6])]))
                .unwrap()
                .is_none()
        );
        assert!(decode(&riff_bytes(&[(b"data", Vec::new())])).unwrap().is_none());
    }

    #[test]
    fn test_chunks_in_any_order_with_unknown_chunks() {
        let bytes = riff_bytes(&[
            (b"LIST", b"INFOjunk".to_vec()),
            (b"data", vec![10, 0, 20, 0]),
            (b"fact", vec![0; 4]),
            (b"fmt ", fmt_payload(1, 1, 32000, 16)),
        ]);
        let asset = decode(&bytes).unwrap().unwrap();
        assert_eq!(asset.sample_rate(), 32000);
        assert_eq!(asset.bytes_per_sample(), 2);
        assert_eq!(asset.data(), &[10, 0, 20, 0]);
    }

    #[test]
    fn test_empty_data_chunk_keeps_scanning() {
        let bytes = riff_bytes(&[
            (b"fmt ", fmt_payload(1, 1, 11025, 8)),
            (b"data", Vec::new()),
            (b"data", vec![7, 8, 9]),
        ]);
        let asset = decode(&bytes).unwrap().unwrap();
        assert_eq!(asset.data(), &[7, 8, 9]);

        let bytes = riff_bytes(&[(b"data", Vec::new()), (b"data", vec![1, 2])]);
        assert!(decode(&bytes).unwrap_err().is_format());
    }

    #[test]
    fn test_fmt_without_data_yields_empty_asset() {
        let bytes = riff_bytes(&[(b"fmt ", fmt_payload(1, 2, 22050, 16))]);
        let asset = decode(&bytes).unwrap().unwrap();
        assert!(asset.is_empty());
        assert_eq!(asset.channels(), 2);
    }

    #[test]
    fn test_truncated_data_chunk() {
        let mut bytes = wav_bytes(11025, 1, 8, &[1, 2, 3, 4, 5, 6]);
        bytes.truncate(bytes.len() - 3);
        assert!(decode(&bytes).unwrap_err().is_truncated());
    }

    #[test]
    fn test_truncated_header() {
        let bytes = wav_bytes(11025, 1, 8, &[1, 2]);
        assert!(decode(&bytes[..6]).unwrap_err().is_truncated());
        assert!(decode(&bytes[..30]).unwrap_err().is_truncated());
    }

    #[test]
    fn test_partial_frame_is_format_error() {
        let bytes = wav_bytes(22050, 2, 16, &[0; 6]);
        assert!(decode(&bytes).unwrap_err().is_format());
    }
}
