//! PCM sample conversion and WAV container framing.
//!
//! Pure functions shared by the capture and playback pipelines. The wire
//! format for outbound audio is raw little-endian 16-bit mono PCM; inbound
//! payloads may additionally arrive wrapped in a minimal WAV container so
//! that generic decoders can infer the format without external metadata.

use std::io::Cursor;

use crate::error::{Result, VoicelinkError};

/// Size of the fixed WAV descriptor prepended by [`wrap_as_container`].
pub const CONTAINER_HEADER_LEN: usize = 44;

/// Convert normalized float samples to 16-bit fixed point.
///
/// Samples are clamped to [-1, 1]. Negative values scale by 32768 and
/// non-negative values by 32767 so that +1.0 cannot overflow; conversion
/// truncates toward zero.
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let s = s.clamp(-1.0, 1.0);
            if s < 0.0 {
                (s * 32768.0) as i16
            } else {
                (s * 32767.0) as i16
            }
        })
        .collect()
}

/// Inverse of [`float_to_pcm16`], dividing by 32768.
pub fn pcm16_to_float(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Serialize samples as little-endian bytes, the Audio Channel wire shape.
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Parse little-endian bytes back into samples.
///
/// Rejects buffers with odd length before they can reach a decoder.
pub fn bytes_to_pcm16(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(VoicelinkError::Codec {
            message: format!("buffer length {} is not sample-aligned", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect())
}

/// Prefix raw PCM bytes with a fixed 44-byte WAV descriptor.
///
/// Little-endian throughout: RIFF chunk, PCM format tag, channel count,
/// sample rate, byte rate, block alignment, bit depth, payload length.
/// The Audio Channel's explicit metadata message remains authoritative
/// whenever it is available; this wrapping only exists for decode paths
/// that require self-describing input.
pub fn wrap_as_container(
    pcm: &[u8],
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> Vec<u8> {
    let block_align = channels * bits_per_sample / 8;
    let byte_rate = sample_rate * block_align as u32;
    let data_len = pcm.len() as u32;

    let mut out = Vec::with_capacity(CONTAINER_HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM format tag
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

/// A payload decoded from a self-describing container.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedContainer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// Decode a container-wrapped payload into 16-bit samples.
///
/// Fails with [`VoicelinkError::Decode`] on anything that is not a valid
/// 16-bit integer WAV stream; the playback pipeline then falls back to
/// treating the payload as raw PCM.
pub fn parse_container(bytes: &[u8]) -> Result<DecodedContainer> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| VoicelinkError::Decode {
            message: e.to_string(),
        })?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(VoicelinkError::Decode {
            message: format!(
                "unsupported container format: {:?}/{} bits",
                spec.sample_format, spec.bits_per_sample
            ),
        });
    }
    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| VoicelinkError::Decode {
            message: e.to_string(),
        })?;
    Ok(DecodedContainer {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
    })
}
