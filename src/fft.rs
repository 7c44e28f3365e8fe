//! Magnitude spectrum of a capture window.
//!
//! The half-spectrum is magnitude only, with the DC bin zeroed before any
//! further analysis so a large DC component cannot dominate the displayed
//! scale.

mod imp;

use crate::config;
use crate::math::isqrt;
use heapless::Vec;
use num_complex::Complex;

/// Samples are centered then amplified by this many bits before the
/// fixed-point transform. A centered 12-bit sample spans +/-4095, so three
/// bits of gain nearly fills `i16` without clipping.
const INPUT_GAIN_LOG2: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpectrumPeak {
    pub bin: usize,
    pub magnitude: u16,
}

pub struct Spectrum {
    pub bins: [u16; config::fft::HALF],
}

impl Spectrum {
    /// Transform up to `fft::LEN` samples of the window.
    ///
    /// `center` (normally the capture's raw average) is removed from every
    /// sample first; sentinel samples count as no deviation.
    pub fn compute(window: &[u16], center: u16) -> Self {
        let mut buf = [Complex::new(0i16, 0i16); config::fft::LEN];
        for (slot, &raw) in buf.iter_mut().zip(window) {
            if raw == config::adc::INVALID_SAMPLE {
                continue;
            }
            let centered = (i32::from(raw) - i32::from(center)) << INPUT_GAIN_LOG2;
            slot.re = centered.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        }

        imp::radix2(&mut buf);

        // bins[0] stays zero: DC is removed before analysis
        let mut bins = [0u16; config::fft::HALF];
        for (out, bin) in bins.iter_mut().zip(buf.iter()).skip(1) {
            *out = isqrt(amplitude_squared(*bin));
        }
        Spectrum { bins }
    }

    /// Loudest non-DC bin, if any energy is present. Ties go to the lower
    /// frequency.
    pub fn peak(&self) -> Option<SpectrumPeak> {
        let mut best = 0;
        for (i, &magnitude) in self.bins.iter().enumerate().skip(1) {
            if magnitude > self.bins[best] {
                best = i;
            }
        }
        if best == 0 {
            return None;
        }
        Some(SpectrumPeak {
            bin: best,
            magnitude: self.bins[best],
        })
    }

    /// Up to `MAX_PEAKS` distinct peaks, loudest first. Each reported peak
    /// claims its monotonically decreasing flanks so the shoulders of one
    /// tone are not reported again as separate peaks.
    pub fn peaks(&self, out: &mut Vec<SpectrumPeak, { config::fft::MAX_PEAKS }>) {
        out.clear();
        let mut claimed = [false; config::fft::HALF];
        claimed[0] = true;
        while !out.is_full() {
            let mut best: Option<usize> = None;
            for (i, &magnitude) in self.bins.iter().enumerate() {
                if claimed[i] || magnitude == 0 {
                    continue;
                }
                if best.map_or(true, |b| magnitude > self.bins[b]) {
                    best = Some(i);
                }
            }
            let Some(peak) = best else { break };
            // capacity checked by the loop condition
            let _ = out.push(SpectrumPeak {
                bin: peak,
                magnitude: self.bins[peak],
            });

            claimed[peak] = true;
            let mut prev = self.bins[peak];
            for i in peak + 1..self.bins.len() {
                if self.bins[i] >= prev {
                    break;
                }
                prev = self.bins[i];
                claimed[i] = true;
            }
            let mut prev = self.bins[peak];
            for i in (1..peak).rev() {
                if self.bins[i] >= prev {
                    break;
                }
                prev = self.bins[i];
                claimed[i] = true;
            }
        }
    }
}

fn amplitude_squared(c: Complex<i16>) -> u32 {
    let re = i32::from(c.re);
    let im = i32::from(c.im);
    (re * re) as u32 + (im * im) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(cycles: usize, amplitude: f64) -> [u16; config::fft::LEN] {
        let mut window = [0u16; config::fft::LEN];
        for (i, sample) in window.iter_mut().enumerate() {
            let phase =
                2.0 * core::f64::consts::PI * cycles as f64 * i as f64 / config::fft::LEN as f64;
            *sample = (2048.0 + amplitude * phase.sin()) as u16;
        }
        window
    }

    #[test]
    fn sine_peaks_at_its_own_bin() {
        let window = sine(8, 1000.0);
        let spectrum = Spectrum::compute(&window, 2048);
        let peak = spectrum.peak().unwrap();
        assert_eq!(peak.bin, 8);
        // amplitude 1000 raw = 8000 after input gain, half lands in the bin
        assert!(
            (3500..=4500).contains(&peak.magnitude),
            "magnitude {}",
            peak.magnitude
        );
    }

    #[test]
    fn louder_tone_wins_the_peak() {
        let loud = sine(5, 900.0);
        let quiet = sine(40, 300.0);
        let mut window = [0u16; config::fft::LEN];
        for i in 0..window.len() {
            window[i] = (u32::from(loud[i]) + u32::from(quiet[i])).saturating_sub(2048) as u16;
        }
        let spectrum = Spectrum::compute(&window, 2048);
        assert_eq!(spectrum.peak().unwrap().bin, 5);
        assert!(spectrum.bins[40] > 0);

        let mut peaks = Vec::new();
        spectrum.peaks(&mut peaks);
        assert_eq!(peaks[0].bin, 5);
        assert_eq!(peaks[1].bin, 40);
        assert!(peaks[0].magnitude > peaks[1].magnitude);
    }

    #[test]
    fn dc_bin_is_zeroed() {
        let window = [3000u16; config::fft::LEN];
        let spectrum = Spectrum::compute(&window, 2048);
        assert_eq!(spectrum.bins[0], 0);
        // only rounding residue may remain elsewhere
        if let Some(peak) = spectrum.peak() {
            assert!(peak.magnitude < 16, "magnitude {}", peak.magnitude);
        }
    }

    #[test]
    fn all_sentinel_window_has_no_peak() {
        let window = [config::adc::INVALID_SAMPLE; config::fft::LEN];
        let spectrum = Spectrum::compute(&window, 2048);
        assert!(spectrum.peak().is_none());
    }
}
