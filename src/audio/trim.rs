use crate::{
    config::{TRIM_FRAME_LENGTH, TRIM_HOP_LENGTH},
    utils::reflect_pad_1d,
};
const AMIN: f64 = 1e-10;
/// Mean square energy of centered frames (reflect padded by half a frame).
fn frame_energy(wave: &[f64], frame_length: usize, hop_length: usize) -> Vec<f64> {
    let half = frame_length / 2;
    let padded = reflect_pad_1d(wave, half, half);
    if padded.len() < frame_length {
        return vec![padded.iter().map(|x| x * x).sum::<f64>() / frame_length as f64];
    }
    let n_frames = 1 + (padded.len() - frame_length) / hop_length;
    (0..n_frames)
        .map(|i| {
            let frame = &padded[i * hop_length..i * hop_length + frame_length];
            frame.iter().map(|x| x * x).sum::<f64>() / frame_length as f64
        })
        .collect()
}
/// Sample ranges whose frame energy is within `top_db` of the loudest frame.
pub fn nonsilent_intervals(
    wave: &[f64],
    top_db: f64,
    frame_length: usize,
    hop_length: usize,
) -> Vec<(usize, usize)> {
    if wave.is_empty() {
        return Vec::new();
    }
    let mse = frame_energy(wave, frame_length, hop_length);
    let reference = mse.iter().copied().fold(0.0, f64::max).max(AMIN);
    let nonsilent: Vec<bool> = mse
        .iter()
        .map(|&e| 10.0 * (e.max(AMIN) / reference).log10() > -top_db)
        .collect();
    let mut intervals = Vec::new();
    let mut start = None;
    for (i, &loud) in nonsilent.iter().chain(std::iter::once(&false)).enumerate() {
        match (loud, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                let begin = (s * hop_length).min(wave.len());
                let end = (i * hop_length).min(wave.len());
                if end > begin {
                    intervals.push((begin, end));
                }
                start = None;
            }
            _ => {}
        }
    }
    intervals
}
/// Concatenates the non-silent spans of `wave`.
pub fn trim_silence(wave: &[f64], top_db: f64) -> Vec<f64> {
    nonsilent_intervals(wave, top_db, TRIM_FRAME_LENGTH, TRIM_HOP_LENGTH)
        .into_iter()
        .flat_map(|(begin, end)| wave[begin..end].iter().copied())
        .collect()
}
