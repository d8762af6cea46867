//! Waveform exporter: renders a message as a modulated carrier and saves the raw 32-bit float
//! samples (`waveform.32fl`) through the delivery bridge, the way a native caller would.

use std::f64::consts::PI;

use serde::Deserialize;
use tracing::info;

use crate::bridge::DeliverySink;
use crate::memory::{MemoryImage, TransferRequest};

/// Name the exported samples are saved under.
pub const WAVEFORM_FILENAME: &str = "waveform.32fl";

/// Half-width of the pulse-shaping window, in symbols.
const SHAPING_SPAN: i64 = 4;

const EPS: f64 = 1e-9;

/// Largest export, in samples: the byte length must fit the boundary's `c_int` size argument.
pub const MAX_SAMPLES: usize = i32::MAX as usize / std::mem::size_of::<f32>();

/// Synthesis parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaveformParams {
    /// Peak amplitude.
    pub amplitude: f64,
    /// Carrier frequency (Hz).
    pub frequency: f64,
    /// Samples per symbol at `sampling_rate` (the on-screen pixels per bit).
    pub pixels_per_bit: u32,
    /// Raised-cosine roll-off factor (0..=1).
    pub rolloff: f64,
    pub bits_per_symbol: u32,
    /// Samples per second.
    pub sampling_rate: f64,
}

impl Default for WaveformParams {
    fn default() -> Self {
        Self {
            amplitude: 100.0,
            frequency: 300.0,
            pixels_per_bit: 50,
            rolloff: 0.35,
            bits_per_symbol: 1,
            sampling_rate: 4000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    Ask,
    Fsk,
    Psk,
}

impl std::str::FromStr for Modulation {
    type Err = WaveformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ask" => Ok(Modulation::Ask),
            "fsk" => Ok(Modulation::Fsk),
            "psk" => Ok(Modulation::Psk),
            _ => Err(WaveformError::InvalidParams("modulation must be ask, fsk or psk")),
        }
    }
}

/// Error synthesizing a waveform.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WaveformError {
    #[error("no active message to export")]
    EmptyMessage,
    #[error("no samples to export")]
    NoSamples,
    #[error("invalid waveform parameter: {0}")]
    InvalidParams(&'static str),
}

/// sin(πx)/(πx), 1 at the origin.
pub fn sinc(x: f64) -> f64 {
    if x.abs() < EPS {
        return 1.0;
    }
    (PI * x).sin() / (PI * x)
}

/// Raised-cosine pulse at offset `t` from the symbol center, symbol period `ts`, roll-off `beta`.
pub fn raised_cosine(t: f64, ts: f64, beta: f64) -> f64 {
    if t.abs() > SHAPING_SPAN as f64 * ts {
        return 0.0;
    }
    if t.abs() < EPS {
        return 1.0;
    }
    let x = t / ts;
    if beta > EPS && ((2.0 * beta * x).abs() - 1.0).abs() < EPS {
        return PI / 4.0 * sinc(1.0 / (2.0 * beta));
    }
    let term1 = (PI * x).sin() / (PI * x);
    let term2 = (PI * beta * x).cos() / (1.0 - (2.0 * beta * x).powi(2));
    term1 * term2
}

/// Value of symbol `index` when `message` is read MSB-first in groups of `bits`.
/// Bits past the end of the message read as 0.
pub fn symbol_at(index: usize, message: &[u8], bits: u32) -> u32 {
    let start = index * bits as usize;
    if start / 8 >= message.len() {
        return 0;
    }
    let mut value = 0u32;
    for i in 0..bits as usize {
        let bit_index = start + i;
        let bit = match message.get(bit_index / 8) {
            Some(byte) => (byte >> (7 - bit_index % 8)) & 1,
            None => continue,
        };
        value = (value << 1) | u32::from(bit);
    }
    value
}

/// Render `message` as samples.
pub fn synthesize(
    message: &[u8],
    modulation: Modulation,
    params: &WaveformParams,
) -> Result<Vec<f32>, WaveformError> {
    if message.is_empty() {
        return Err(WaveformError::EmptyMessage);
    }
    if !(1..=16).contains(&params.bits_per_symbol) {
        return Err(WaveformError::InvalidParams("bits_per_symbol must be 1..=16"));
    }
    if !(params.sampling_rate.is_finite() && params.sampling_rate > 0.0) {
        return Err(WaveformError::InvalidParams("sampling_rate must be finite and positive"));
    }
    if !(0.0..=1.0).contains(&params.rolloff) {
        return Err(WaveformError::InvalidParams("rolloff must be within 0..=1"));
    }
    if !params.amplitude.is_finite() || !params.frequency.is_finite() {
        return Err(WaveformError::InvalidParams("amplitude and frequency must be finite"));
    }
    let bits = params.bits_per_symbol;
    let total_symbols = ((message.len() * 8) / bits as usize).max(1);
    let total_samples = total_symbols
        .checked_mul(params.pixels_per_bit as usize)
        .filter(|&n| n <= MAX_SAMPLES)
        .ok_or(WaveformError::InvalidParams("pixels_per_bit too large for message"))?;
    if total_samples == 0 {
        return Err(WaveformError::NoSamples);
    }

    let rate = params.sampling_rate;
    let period = f64::from(params.pixels_per_bit) / rate;
    let levels = 1u32 << bits;
    let symbol = |i: i64| -> Option<u32> {
        if i < 0 || i as usize >= total_symbols {
            return None;
        }
        Some(symbol_at(i as usize, message, bits))
    };
    // Symbols within the shaping window around time t, with their offset from t.
    let neighbours = move |t: f64| {
        let current = (t / period) as i64;
        (-SHAPING_SPAN..=SHAPING_SPAN).filter_map(move |j| {
            let idx = current + j;
            symbol(idx).map(|s| (s, t - (idx as f64 + 0.5) * period))
        })
    };

    let mut phase = 0.0f64;
    let mut out = Vec::with_capacity(total_samples);
    for n in 0..total_samples {
        let t = n as f64 / rate;
        let y = match modulation {
            Modulation::Ask => {
                let envelope: f64 = neighbours(t)
                    .map(|(s, dt)| {
                        let impulse = if levels == 1 {
                            f64::from(s)
                        } else {
                            f64::from(s) / f64::from(levels - 1)
                        };
                        impulse * raised_cosine(dt, period, params.rolloff)
                    })
                    .sum();
                params.amplitude * envelope * (2.0 * PI * params.frequency * t).sin()
            }
            Modulation::Fsk => {
                let idx = ((t / period) as usize).min(total_symbols - 1);
                let s = symbol_at(idx, message, bits);
                let freq = params.frequency + f64::from(s) * (params.frequency / 2.0);
                phase += 2.0 * PI * freq / rate;
                params.amplitude * phase.sin()
            }
            Modulation::Psk => {
                let (i, q) = neighbours(t).fold((0.0, 0.0), |(i, q), (s, dt)| {
                    let mut angle = 2.0 * PI * f64::from(s) / f64::from(levels);
                    if levels == 4 {
                        angle += PI / 4.0;
                    }
                    let k = raised_cosine(dt, period, params.rolloff);
                    (i + angle.cos() * k, q + angle.sin() * k)
                });
                let carrier = 2.0 * PI * params.frequency * t;
                params.amplitude * (i * carrier.cos() - q * carrier.sin())
            }
        };
        out.push(y as f32);
    }
    Ok(out)
}

/// Little-endian f32 sample bytes, the `.32fl` layout.
pub fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Render `message` and deliver it as `waveform.32fl`. Returns the sample count.
pub fn export_waveform(
    sink: &dyn DeliverySink,
    message: &[u8],
    modulation: Modulation,
    params: &WaveformParams,
) -> Result<usize, WaveformError> {
    let samples = synthesize(message, modulation, params)?;
    let bytes = samples_to_bytes(&samples);
    let mut image = MemoryImage::new();
    let data = image.push_bytes(&bytes);
    let name = image.push_c_str(WAVEFORM_FILENAME);
    info!(?modulation, samples = samples.len(), "exporting waveform");
    sink.deliver(&image, TransferRequest::new(data, bytes.len(), name));
    Ok(samples.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::DeliveryBridge;
    use crate::config::BridgeConfig;
    use crate::fake::FakeHost;

    #[test]
    fn symbol_extraction_msb_first() {
        // 'A' = 0b0100_0001
        let msg = b"A";
        assert_eq!(symbol_at(0, msg, 1), 0);
        assert_eq!(symbol_at(1, msg, 1), 1);
        assert_eq!(symbol_at(7, msg, 1), 1);
        assert_eq!(symbol_at(0, msg, 2), 0b01);
        assert_eq!(symbol_at(3, msg, 2), 0b01);
        assert_eq!(symbol_at(8, msg, 1), 0);
    }

    #[test]
    fn modulation_from_str() {
        assert_eq!("ask".parse::<Modulation>(), Ok(Modulation::Ask));
        assert_eq!("FSK".parse::<Modulation>(), Ok(Modulation::Fsk));
        assert_eq!("Psk".parse::<Modulation>(), Ok(Modulation::Psk));
        assert!("qam".parse::<Modulation>().is_err());
    }

    #[test]
    fn raised_cosine_shape() {
        let ts = 0.01;
        assert_eq!(raised_cosine(0.0, ts, 0.35), 1.0);
        assert_eq!(raised_cosine(4.5 * ts, ts, 0.35), 0.0);
        // Zero crossings at whole symbol offsets.
        assert!(raised_cosine(ts, ts, 0.35).abs() < 1e-9);
        assert!(raised_cosine(2.0 * ts, ts, 0.35).abs() < 1e-9);
        // Removable singularity at |2βt/T| = 1 stays finite.
        let at_sing = raised_cosine(ts / (2.0 * 0.5), ts, 0.5);
        assert!((at_sing - PI / 4.0 * sinc(1.0)).abs() < 1e-12);
    }

    #[test]
    fn sample_count_follows_symbols() {
        let params = WaveformParams::default();
        let s = synthesize(b"A", Modulation::Fsk, &params).unwrap();
        assert_eq!(s.len(), 8 * 50);
        let two_bit = WaveformParams {
            bits_per_symbol: 2,
            ..WaveformParams::default()
        };
        let s = synthesize(b"AB", Modulation::Psk, &two_bit).unwrap();
        assert_eq!(s.len(), 8 * 50);
    }

    #[test]
    fn fsk_stays_within_amplitude() {
        let params = WaveformParams::default();
        let s = synthesize(b"hi", Modulation::Fsk, &params).unwrap();
        assert!(s.iter().all(|y| y.abs() <= params.amplitude as f32 + 1e-3));
        assert!(s.iter().any(|y| y.abs() > 1.0));
    }

    #[test]
    fn ask_of_zero_bits_is_silent() {
        let s = synthesize(&[0u8], Modulation::Ask, &WaveformParams::default()).unwrap();
        assert!(s.iter().all(|y| *y == 0.0));
    }

    #[test]
    fn rejects_empty_and_bad_params() {
        let p = WaveformParams::default();
        assert_eq!(
            synthesize(b"", Modulation::Ask, &p),
            Err(WaveformError::EmptyMessage)
        );
        let no_samples = WaveformParams {
            pixels_per_bit: 0,
            ..WaveformParams::default()
        };
        assert_eq!(
            synthesize(b"x", Modulation::Ask, &no_samples),
            Err(WaveformError::NoSamples)
        );
        let zero_bits = WaveformParams {
            bits_per_symbol: 0,
            ..WaveformParams::default()
        };
        assert!(matches!(
            synthesize(b"x", Modulation::Ask, &zero_bits),
            Err(WaveformError::InvalidParams(_))
        ));
    }

    fn invalid(params: WaveformParams) -> bool {
        matches!(
            synthesize(b"A", Modulation::Ask, &params),
            Err(WaveformError::InvalidParams(_))
        )
    }

    #[test]
    fn rejects_non_finite_rate() {
        for rate in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.0, -4000.0] {
            assert!(invalid(WaveformParams {
                sampling_rate: rate,
                ..WaveformParams::default()
            }));
        }
    }

    #[test]
    fn nan_rate_from_config_rejected() {
        let config =
            BridgeConfig::from_toml_str("[waveform]\nsampling_rate = nan\n").unwrap();
        assert!(config.waveform.sampling_rate.is_nan());
        assert!(invalid(config.waveform));
    }

    #[test]
    fn rejects_rolloff_out_of_range() {
        for rolloff in [-3.0, 1.5, f64::NAN] {
            assert!(invalid(WaveformParams {
                rolloff,
                ..WaveformParams::default()
            }));
        }
        for rolloff in [0.0, 1.0] {
            let p = WaveformParams {
                rolloff,
                ..WaveformParams::default()
            };
            assert!(synthesize(b"A", Modulation::Psk, &p).is_ok());
        }
    }

    #[test]
    fn rejects_non_finite_amplitude_and_frequency() {
        assert!(invalid(WaveformParams {
            amplitude: f64::NAN,
            ..WaveformParams::default()
        }));
        assert!(invalid(WaveformParams {
            frequency: f64::INFINITY,
            ..WaveformParams::default()
        }));
    }

    #[test]
    fn rejects_oversized_sample_count() {
        assert!(invalid(WaveformParams {
            pixels_per_bit: u32::MAX,
            ..WaveformParams::default()
        }));
        // 8 symbols * 2^28 samples exceeds the c_int byte length.
        assert!(invalid(WaveformParams {
            pixels_per_bit: 1 << 28,
            ..WaveformParams::default()
        }));
    }

    #[test]
    fn export_delivers_le_samples() {
        let bridge = DeliveryBridge::new(FakeHost::new());
        let params = WaveformParams::default();
        let n = export_waveform(&bridge, b"ok", Modulation::Psk, &params).unwrap();
        let saved = bridge.host().saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].filename, WAVEFORM_FILENAME);
        assert_eq!(saved[0].bytes.len(), n * 4);
        let decoded: Vec<f32> = saved[0]
            .bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(decoded, synthesize(b"ok", Modulation::Psk, &params).unwrap());
        assert_eq!(bridge.host().live_urls(), 0);
        assert_eq!(bridge.host().live_nodes(), 0);
    }

    #[test]
    fn export_of_empty_message_delivers_nothing() {
        let bridge = DeliveryBridge::new(FakeHost::new());
        let err = export_waveform(&bridge, b"", Modulation::Ask, &WaveformParams::default());
        assert_eq!(err, Err(WaveformError::EmptyMessage));
        assert!(bridge.host().saved().is_empty());
    }
}
