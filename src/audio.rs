pub mod trim;
use anyhow::{anyhow, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::{fs::File, path::Path};
use symphonia::{
    core::{
        audio::{SampleBuffer, SignalSpec},
        io::MediaSourceStream,
        probe::Hint,
    },
    default::{get_codecs, get_probe},
};
const I16_MAX: f64 = i16::MAX as f64;
const I16_MIN: f64 = i16::MIN as f64;
fn resample_audio(audio: &[f64], in_fs: u32, out_fs: u32) -> Result<Vec<f64>> {
    if audio.is_empty() || in_fs == out_fs {
        return Ok(audio.to_vec());
    }
    let ratio = out_fs as f64 / in_fs as f64;
    let chunk_size = 256.max(audio.len());
    let expected_len = (audio.len() as f64 * ratio).ceil() as usize;
    let mut resampler = SincFixedIn::<f64>::new(
        ratio,
        2.0,
        SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            oversampling_factor: 64,
            interpolation: SincInterpolationType::Cubic,
            window: WindowFunction::Hann,
        },
        chunk_size,
        1,
    )?;
    let mut resampled = Vec::with_capacity(expected_len);
    let mut padded = vec![0.0; chunk_size];
    for chunk in audio.chunks(chunk_size) {
        let input = if chunk.len() == chunk_size {
            chunk
        } else {
            padded[..chunk.len()].copy_from_slice(chunk);
            &padded[..]
        };
        if let Some(output) = resampler.process(&[input], None)?.first() {
            resampled.extend_from_slice(&output[..(output.len() * chunk.len()).div_ceil(chunk_size)]);
        }
    }
    if let Some(final_output) = resampler.process_partial::<&[f64]>(None, None)?.first() {
        resampled.extend_from_slice(final_output);
    }
    resampled.truncate(expected_len);
    Ok(resampled)
}
/// Decodes any supported file to mono f64 at `sample_rate`.
pub fn read_audio<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Vec<f64>> {
    let path = path.as_ref();
    let source = File::open(path).map_err(|_| anyhow!("Failed to open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(source), Default::default());
    let mut probed = get_probe()
        .format(&Hint::new(), mss, &Default::default(), &Default::default())
        .map_err(|_| anyhow!("Unsupported audio format: {}", path.display()))?;
    let track = probed
        .format
        .default_track()
        .ok_or_else(|| anyhow!("No audio track found"))?;
    let spec = SignalSpec {
        channels: track.codec_params.channels.ok_or_else(|| anyhow!("Missing channel info"))?,
        rate: track.codec_params.sample_rate.ok_or_else(|| anyhow!("Missing sample rate"))?,
    };
    let mut decoder = get_codecs()
        .make(&track.codec_params, &Default::default())
        .map_err(|_| anyhow!("Failed to decode audio file"))?;
    let mut audio = Vec::new();
    let mut packet_buffer = SampleBuffer::<f64>::new(4096, spec);
    let track_id = track.id;
    while let Ok(packet) = probed.format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }
        if let Ok(decoded) = decoder.decode(&packet) {
            packet_buffer.copy_interleaved_ref(decoded);
            let samples = packet_buffer.samples();
            if spec.channels.count() == 1 {
                audio.extend_from_slice(samples);
            } else {
                audio.extend(
                    samples
                        .chunks(spec.channels.count())
                        .map(|frame| frame.iter().sum::<f64>() / spec.channels.count() as f64),
                );
            }
        }
    }
    if audio.is_empty() {
        return Err(anyhow!("Empty audio after decoding: {}", path.display()));
    }
    if spec.rate == sample_rate {
        Ok(audio)
    } else {
        resample_audio(&audio, spec.rate, sample_rate)
            .map_err(|e| anyhow!("Resample failed ({} → {}): {}", spec.rate, sample_rate, e))
    }
}
/// Writes 16-bit mono PCM.
pub fn write_audio<P: AsRef<Path>>(path: P, audio: &[f64], sample_rate: u32) -> Result<()> {
    let path = path.as_ref();
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let file = File::create(path)
        .map_err(|_| anyhow!("Failed to create file: {}", path.display()))?;
    let mut writer = WavWriter::new(file, spec)
        .map_err(|_| anyhow!("Failed to init WAV writer: {}", path.display()))?;
    audio.iter()
        .map(|&s| (s * I16_MAX).clamp(I16_MIN, I16_MAX) as i16)
        .try_for_each(|sample| writer.write_sample(sample))
        .map_err(|_| anyhow!("Failed to write audio samples: {}", path.display()))?;
    writer.finalize()
        .map_err(|_| anyhow!("Failed to finalize WAV: {}", path.display()))?;
    Ok(())
}
