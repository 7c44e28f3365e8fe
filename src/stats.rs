//! Per-capture statistics: raw extremes, period and frequency estimation.
//!
//! Period estimation reuses the trigger automaton as a crossing counter over
//! the analyzed window. An unreliable cycle (no crossings, or an apparent
//! period too short to trust) leaves the previous period and frequency
//! estimates in place rather than publishing a confident-looking zero.

use crate::command::AcquisitionConfig;
use crate::config;
use crate::fft::{Spectrum, SpectrumPeak};
use crate::math::DivRound;
use crate::trigger::{Detector, TriggerStatus};

#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub raw_min: u16,
    pub raw_max: u16,
    pub raw_avg: u16,
    /// Estimated signal period in nanoseconds.
    pub period_ns: Option<u64>,
    /// Estimated signal frequency in millihertz.
    pub frequency_mhz: Option<u32>,
    pub spectrum_peak: Option<SpectrumPeak>,
}

impl Statistics {
    pub const fn new() -> Self {
        Self {
            raw_min: 0,
            raw_max: 0,
            raw_avg: 0,
            period_ns: None,
            frequency_mhz: None,
            spectrum_peak: None,
        }
    }

    /// Single pass over a completed capture window.
    pub fn analyze(&mut self, window: &[u16], cfg: &AcquisitionConfig) {
        self.scan_extremes(window);
        if let Some(period_ns) = estimate_period_ns(window, cfg) {
            self.period_ns = Some(period_ns);
            let freq = 1_000_000_000_000u64.div_round(period_ns);
            self.frequency_mhz = Some(freq.min(u64::from(u32::MAX)) as u32);
        }
    }

    /// Recompute the spectrum from the window, centered on the current raw
    /// average. Returns the full half-spectrum for rendering.
    pub fn update_spectrum(&mut self, window: &[u16]) -> Spectrum {
        let spectrum = Spectrum::compute(window, self.raw_avg);
        self.spectrum_peak = spectrum.peak();
        spectrum
    }

    fn scan_extremes(&mut self, window: &[u16]) {
        let mut min = config::adc::MAX_CONVERSION_VALUE;
        let mut max = 0;
        let mut sum = 0u32;
        let mut count = 0u32;
        for &raw in window {
            if raw == config::adc::INVALID_SAMPLE {
                continue;
            }
            min = min.min(raw);
            max = max.max(raw);
            sum += u32::from(raw);
            count += 1;
        }
        if count == 0 {
            self.raw_min = 0;
            self.raw_max = 0;
            self.raw_avg = 0;
        } else {
            self.raw_min = min;
            self.raw_max = max;
            self.raw_avg = sum.div_round(count) as u16;
        }
    }
}

/// Average distance between full trigger cycles, converted to time.
///
/// Prefers the timebase's exact picosecond sample interval over the rounded
/// nanosecond table value when the divider implies one.
fn estimate_period_ns(window: &[u16], cfg: &AcquisitionConfig) -> Option<u64> {
    let mut detector = Detector::new();
    let mut first = None;
    let mut last = 0;
    let mut cycles = 0u32;
    for (i, &raw) in window.iter().enumerate() {
        if raw == config::adc::INVALID_SAMPLE {
            continue;
        }
        let status = detector.evaluate(raw, cfg.trigger_level, cfg.trigger_hysteresis, cfg.slope);
        if status == TriggerStatus::Triggered {
            if first.is_none() {
                first = Some(i);
            } else {
                cycles += 1;
            }
            last = i;
            detector.reset();
        }
    }

    let first = first?;
    if cycles == 0 {
        return None;
    }
    let span = (last - first) as u32;
    // apparent period too fast to trust
    if span < cycles * config::stats::MIN_SAMPLES_PER_PERIOD {
        return None;
    }

    let timebase = &config::timebase::TABLE[cfg.timebase];
    let period_ns = match timebase.ps_per_sample_exact {
        Some(ps) => (u64::from(span) * ps).div_round(u64::from(cycles) * 1000),
        None => (u64::from(span) * u64::from(timebase.ns_per_sample)).div_round(u64::from(cycles)),
    };
    Some(period_ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(period: usize, len: usize) -> impl Iterator<Item = u16> {
        (0..len).map(move |i| if i % period < period / 2 { 1000 } else { 3000 })
    }

    #[test]
    fn extremes_skip_sentinels() {
        let window = [config::adc::INVALID_SAMPLE, 100, 200, 300];
        let mut stats = Statistics::new();
        stats.analyze(&window, &AcquisitionConfig::default());
        assert_eq!(stats.raw_min, 100);
        assert_eq!(stats.raw_max, 300);
        assert_eq!(stats.raw_avg, 200);
    }

    #[test]
    fn all_sentinel_window_yields_zeros() {
        let window = [config::adc::INVALID_SAMPLE; 16];
        let mut stats = Statistics::new();
        stats.analyze(&window, &AcquisitionConfig::default());
        assert_eq!((stats.raw_min, stats.raw_max, stats.raw_avg), (0, 0, 0));
    }

    #[test]
    fn square_wave_period_uses_exact_sample_interval() {
        // default timebase is 1ms/div: divider 2880, exactly 40us per sample
        let cfg = AcquisitionConfig::default();
        assert_eq!(
            config::timebase::TABLE[cfg.timebase].ps_per_sample_exact,
            Some(40_000_000)
        );

        let window: heapless::Vec<u16, 320> = square(40, 320).collect();
        let mut stats = Statistics::new();
        stats.analyze(&window, &cfg);
        // 40 samples of 40us each
        assert_eq!(stats.period_ns, Some(1_600_000));
        assert_eq!(stats.frequency_mhz, Some(625_000));
    }

    #[test]
    fn too_fast_period_keeps_previous_estimate() {
        let cfg = AcquisitionConfig::default();
        let mut stats = Statistics::new();
        stats.period_ns = Some(123);
        stats.frequency_mhz = Some(456);

        // alternates every sample, below the plausibility floor
        let window: heapless::Vec<u16, 64> = square(2, 64).collect();
        stats.analyze(&window, &cfg);
        assert_eq!(stats.period_ns, Some(123));
        assert_eq!(stats.frequency_mhz, Some(456));
    }

    #[test]
    fn constant_input_keeps_previous_estimate() {
        let cfg = AcquisitionConfig::default();
        let mut stats = Statistics::new();
        stats.period_ns = Some(123);
        stats.analyze(&[2048; 64], &cfg);
        assert_eq!(stats.period_ns, Some(123));
    }

    #[test]
    fn spectrum_peak_follows_dominant_tone() {
        let mut window = [0u16; config::fft::LEN];
        for (i, sample) in window.iter_mut().enumerate() {
            let phase = 2.0 * core::f64::consts::PI * 16.0 * i as f64 / config::fft::LEN as f64;
            *sample = (2048.0 + 800.0 * phase.sin()) as u16;
        }
        let mut stats = Statistics::new();
        stats.analyze(&window, &AcquisitionConfig::default());
        let spectrum = stats.update_spectrum(&window);
        assert_eq!(stats.spectrum_peak.unwrap().bin, 16);
        assert_eq!(spectrum.bins[0], 0);
    }
}
