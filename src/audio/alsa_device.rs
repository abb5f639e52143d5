//! ALSA implementation of the audio capability traits.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};

use super::device::{AudioDevice, AudioInput, AudioOutput, InputConfig};
use super::pcm::{float_to_pcm16, pcm16_to_float};
use crate::error::{Result, VoicelinkError};

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
struct AlsaParams {
    sample_rate: u32,
    period_size: usize,
}

pub struct AlsaDevice {
    capture_device: String,
    playback_device: String,
    playback_sample_rate: u32,
}

impl AlsaDevice {
    pub fn new(capture_device: &str, playback_device: &str, playback_sample_rate: u32) -> Self {
        Self {
            capture_device: capture_device.to_string(),
            playback_device: playback_device.to_string(),
            playback_sample_rate,
        }
    }
}

impl AudioDevice for AlsaDevice {
    fn acquire_input(&self, config: &InputConfig) -> Result<Box<dyn AudioInput>> {
        let (pcm, params) = open_pcm(
            &self.capture_device,
            Direction::Capture,
            config.sample_rate,
            "Capture",
        )?;
        Ok(Box::new(AlsaInput {
            pcm,
            scratch: vec![0i16; params.period_size],
        }))
    }

    fn acquire_output(&self, _sample_rate: u32) -> Result<Box<dyn AudioOutput>> {
        let (pcm, params) = open_pcm(
            &self.playback_device,
            Direction::Playback,
            self.playback_sample_rate,
            "Playback",
        )?;
        Ok(Box::new(AlsaOutput {
            pcm,
            device_rate: params.sample_rate,
        }))
    }
}

struct AlsaInput {
    pcm: PCM,
    scratch: Vec<i16>,
}

impl AudioInput for AlsaInput {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        let want = buf.len().min(self.scratch.len());
        let io = self.pcm.io_i16().map_err(alsa_err)?;
        loop {
            match io.readi(&mut self.scratch[..want]) {
                Ok(frames) => {
                    let floats = pcm16_to_float(&self.scratch[..frames]);
                    buf[..frames].copy_from_slice(&floats);
                    return Ok(frames);
                }
                Err(e) => {
                    log::warn!("ALSA capture error: {}, recovering...", e);
                    self.pcm.prepare().map_err(alsa_err)?;
                }
            }
        }
    }
}

struct AlsaOutput {
    pcm: PCM,
    device_rate: u32,
}

impl AudioOutput for AlsaOutput {
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()> {
        // The device runs at one negotiated rate; frames declaring a
        // different rate are resampled before the write.
        let resampled;
        let samples = if sample_rate != self.device_rate {
            resampled = resample(samples, sample_rate, self.device_rate);
            &resampled[..]
        } else {
            samples
        };
        let pcm_data = float_to_pcm16(samples);

        let io = self.pcm.io_i16().map_err(alsa_err)?;
        let mut written = 0;
        while written < pcm_data.len() {
            match io.writei(&pcm_data[written..]) {
                Ok(n) => written += n,
                Err(e) => {
                    log::warn!("ALSA playback error: {}, recovering...", e);
                    self.pcm.prepare().map_err(alsa_err)?;
                }
            }
        }
        Ok(())
    }
}

fn open_pcm(
    device: &str,
    direction: Direction,
    sample_rate: u32,
    dir_name: &str,
) -> Result<(PCM, AlsaParams)> {
    let pcm = PCM::new(device, direction, false).map_err(|e| VoicelinkError::DeviceUnavailable {
        message: format!("failed to open PCM device '{}' for {}: {}", device, dir_name, e),
    })?;

    {
        let hwp = HwParams::any(&pcm).map_err(alsa_err)?;
        hwp.set_access(Access::RWInterleaved).map_err(alsa_err)?;
        hwp.set_format(Format::S16LE).map_err(alsa_err)?;
        hwp.set_channels(1).map_err(alsa_err)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)
            .map_err(alsa_err)?;
        pcm.hw_params(&hwp).map_err(alsa_err)?;
    }

    let (actual_rate, period_size) = {
        let hwp = pcm.hw_params_current().map_err(alsa_err)?;
        (
            hwp.get_rate().map_err(alsa_err)?,
            hwp.get_period_size().map_err(alsa_err)? as usize,
        )
    };

    log::info!(
        "ALSA {}: device={}, rate={}, period_size={}",
        dir_name,
        device,
        actual_rate,
        period_size,
    );

    Ok((
        pcm,
        AlsaParams {
            sample_rate: actual_rate,
            period_size,
        },
    ))
}

fn alsa_err(e: alsa::Error) -> VoicelinkError {
    VoicelinkError::DeviceUnavailable {
        message: e.to_string(),
    }
}

/// Linear-interpolation resampling between a frame's declared rate and the
/// device rate.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    // A zero rate on either side has no meaningful ratio; pass the samples
    // through unchanged rather than dividing by zero.
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[samples.len() - 1]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::resample;

    #[test]
    fn resample_halves_and_doubles_sample_counts() {
        let samples = vec![0.0f32, 0.5, 1.0, 0.5];
        assert_eq!(resample(&samples, 16_000, 8_000).len(), 2);
        assert_eq!(resample(&samples, 8_000, 16_000).len(), 8);
        assert_eq!(resample(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn resample_passes_through_on_zero_rate() {
        let samples = vec![0.1f32, 0.2];
        assert_eq!(resample(&samples, 0, 16_000), samples);
        assert_eq!(resample(&samples, 16_000, 0), samples);
        assert_eq!(resample(&samples, 0, 0), samples);
    }
}
