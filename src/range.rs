//! Range attributes and the raw ↔ display-unit transform.
//!
//! Raw samples are fixed-width ADC counts; display units are pixel rows with
//! row 0 at the top (highest voltage). The pipeline, in order: AC-zero
//! correction, cross-range rescale, display offset, Q-format scale to a
//! pixel delta, clip + invert. The float path (`to_volts`/`from_volts`)
//! shares the same AC-zero and attenuation corrections so labels and trace
//! positions can never disagree.

use crate::command::AcquisitionConfig;
use crate::config;
use crate::math::DivRound;
use fixed::types::U16F16;

/// Calibration state, updated by the platform's calibration routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Raw value of 0 V in bipolar (AC) mode.
    pub ac_zero: u16,
    /// Gain trim, 1000 = nominal.
    pub trim_x1000: u32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            ac_zero: (config::adc::MAX_CONVERSION_VALUE + 1) / 2,
            trim_x1000: 1000,
        }
    }
}

/// Derived per-range constants; recomputed on calibration or range events,
/// read-only during acquisition.
#[derive(Debug, Clone)]
pub struct RangeTable {
    /// Raw counts per grid division, x1000.
    raw_per_div_x1000: [u32; config::range::COUNT],
    /// Pixel rows per raw count, Q16.16.
    scale: [U16F16; config::range::COUNT],
}

impl RangeTable {
    pub fn new(cal: &Calibration) -> Self {
        let mut table = Self {
            raw_per_div_x1000: [0; config::range::COUNT],
            scale: [U16F16::ZERO; config::range::COUNT],
        };
        table.recompute(cal);
        table
    }

    /// Re-derive the scale constants from the static table and calibration.
    pub fn recompute(&mut self, cal: &Calibration) {
        let full_scale = u64::from(config::adc::MAX_CONVERSION_VALUE) + 1;
        for (i, range) in config::range::TABLE.iter().enumerate() {
            let raw_per_div_x1000 = u64::from(range.mv_per_div)
                * full_scale
                * 1_000_000
                * u64::from(cal.trim_x1000)
                / (u64::from(config::adc::VREF_MV) * u64::from(range.att_x1000))
                / 1000;
            self.raw_per_div_x1000[i] = raw_per_div_x1000 as u32;
            let scale_bits = ((config::display::PIXELS_PER_DIV as u64 * 1000) << 16)
                .div_round(raw_per_div_x1000);
            self.scale[i] = U16F16::from_bits(scale_bits as u32);
        }
    }

    /// Raw counts per grid division in `range`, rounded.
    pub fn raw_per_div(&self, range: usize) -> u16 {
        (self.raw_per_div_x1000[range].div_round(1000)).max(1) as u16
    }

    /// Full-scale input capacity of `range` in millivolts.
    pub fn capacity_mv(&self, range: usize) -> u32 {
        config::adc::VREF_MV * config::range::TABLE[range].att_x1000 / 1_000
    }

    /// Attenuation-corrected millivolts for a raw delta measured in `range`.
    pub fn raw_delta_to_mv(&self, range: usize, delta: u16) -> u32 {
        (u64::from(delta) * u64::from(config::adc::VREF_MV)
            * u64::from(config::range::TABLE[range].att_x1000)
            / (u64::from(config::adc::MAX_CONVERSION_VALUE) + 1)
            / 1000) as u32
    }

    /// Build the transform for the current configuration.
    pub fn transform(&self, cfg: &AcquisitionConfig, cal: &Calibration) -> Transform {
        let att_in = config::range::TABLE[cfg.input_range].att_x1000;
        let att_disp = config::range::TABLE[cfg.display_range].att_x1000;
        Transform {
            scale: self.scale[cfg.display_range],
            rescale: if cfg.input_range == cfg.display_range {
                None
            } else {
                Some(Ratio {
                    num: att_in,
                    den: att_disp,
                })
            },
            offset: cfg.display_offset,
            ac_zero: if cfg.bipolar {
                i32::from(cal.ac_zero)
            } else {
                0
            },
            base_row: if cfg.bipolar {
                config::display::HEIGHT / 2
            } else {
                config::display::HEIGHT - 1
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Ratio {
    num: u32,
    den: u32,
}

/// Precomputed raw ↔ pixel-row mapping for one configuration.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    scale: U16F16,
    rescale: Option<Ratio>,
    offset: i16,
    ac_zero: i32,
    base_row: i16,
}

impl Transform {
    /// Map a raw sample to a pixel row. Returns the row and whether the
    /// value had to be clipped to stay visible.
    ///
    /// The raw "no data" sentinel maps to the display sentinel untouched.
    pub fn to_display(&self, raw: u16) -> (i16, bool) {
        if raw == config::adc::INVALID_SAMPLE {
            return (config::display::INVISIBLE, false);
        }
        let mut value = i32::from(raw) - self.ac_zero;
        if let Some(r) = self.rescale {
            value = ((i64::from(value) * i64::from(r.num)).div_round(i64::from(r.den))) as i32;
        }
        value -= i32::from(self.offset);
        let delta = ((i64::from(value) * i64::from(self.scale.to_bits())).div_round(1 << 16)) as i32;
        let row = i32::from(self.base_row) - delta;
        let clipped_row = row.clamp(0, i32::from(config::display::HEIGHT) - 1);
        (clipped_row as i16, clipped_row != row)
    }

    /// Inverse of [`to_display`](Self::to_display), up to integer rounding.
    pub fn to_raw(&self, row: i16) -> (u16, bool) {
        if row == config::display::INVISIBLE {
            return (config::adc::INVALID_SAMPLE, false);
        }
        let delta = i32::from(self.base_row) - i32::from(row);
        let mut value =
            ((i64::from(delta) << 16).div_round(i64::from(self.scale.to_bits()))) as i32;
        value += i32::from(self.offset);
        if let Some(r) = self.rescale {
            value = ((i64::from(value) * i64::from(r.den)).div_round(i64::from(r.num))) as i32;
        }
        value += self.ac_zero;
        let clamped = value.clamp(0, i32::from(config::adc::MAX_CONVERSION_VALUE));
        (clamped as u16, clamped != value)
    }
}

/// Physical volts for a raw sample, using the input range's attenuation and
/// the same AC-zero correction as the pixel path.
pub fn to_volts(cfg: &AcquisitionConfig, cal: &Calibration, raw: u16) -> f32 {
    let zero = if cfg.bipolar {
        f32::from(cal.ac_zero)
    } else {
        0.0
    };
    let att = config::range::TABLE[cfg.input_range].att_x1000 as f32 / 1000.0;
    let counts = f32::from(raw) - zero;
    counts * config::adc::VREF_MV as f32 * att
        / ((config::adc::MAX_CONVERSION_VALUE as f32 + 1.0) * 1000.0)
        * (cal.trim_x1000 as f32 / 1000.0)
}

/// Inverse of [`to_volts`]: the raw value a given voltage would convert to.
pub fn from_volts(cfg: &AcquisitionConfig, cal: &Calibration, volts: f32) -> u16 {
    let zero = if cfg.bipolar {
        f32::from(cal.ac_zero)
    } else {
        0.0
    };
    let att = config::range::TABLE[cfg.input_range].att_x1000 as f32 / 1000.0;
    let counts = volts * (config::adc::MAX_CONVERSION_VALUE as f32 + 1.0) * 1000.0
        / (config::adc::VREF_MV as f32 * att)
        / (cal.trim_x1000 as f32 / 1000.0);
    let raw = counts + zero;
    raw.clamp(0.0, config::adc::MAX_CONVERSION_VALUE as f32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::OffsetMode;

    fn setup(input_range: usize, display_range: usize) -> (AcquisitionConfig, Calibration, RangeTable) {
        let mut cfg = AcquisitionConfig::default();
        cfg.input_range = input_range;
        cfg.display_range = display_range;
        cfg.offset_mode = OffsetMode::Zero;
        cfg.display_offset = 0;
        let cal = Calibration::default();
        let table = RangeTable::new(&cal);
        (cfg, cal, table)
    }

    #[test]
    fn sentinel_maps_to_sentinel_both_ways() {
        let (cfg, cal, table) = setup(0, 0);
        let t = table.transform(&cfg, &cal);
        assert_eq!(
            t.to_display(config::adc::INVALID_SAMPLE),
            (config::display::INVISIBLE, false)
        );
        assert_eq!(
            t.to_raw(config::display::INVISIBLE),
            (config::adc::INVALID_SAMPLE, false)
        );
    }

    #[test]
    fn round_trip_within_one_lsu() {
        // finest range: more than one pixel per raw count, so the inverse
        // can recover the raw value up to rounding
        let (cfg, cal, table) = setup(0, 0);
        let t = table.transform(&cfg, &cal);
        for raw in 0u16..120 {
            let (row, clipped) = t.to_display(raw);
            if clipped {
                continue;
            }
            let (back, _) = t.to_raw(row);
            assert!(
                (i32::from(back) - i32::from(raw)).abs() <= 1,
                "raw {} -> row {} -> {}",
                raw,
                row,
                back
            );
        }
    }

    #[test]
    fn row_round_trip_within_one_pixel() {
        let (cfg, cal, table) = setup(6, 6);
        let t = table.transform(&cfg, &cal);
        for row in 0..config::display::HEIGHT {
            let (raw, clipped) = t.to_raw(row);
            if clipped {
                continue;
            }
            let (back, _) = t.to_display(raw);
            assert!((back - row).abs() <= 1, "row {} -> raw {} -> {}", row, raw, back);
        }
    }

    #[test]
    fn zero_maps_to_bottom_row_unipolar() {
        let (cfg, cal, table) = setup(3, 3);
        let t = table.transform(&cfg, &cal);
        assert_eq!(t.to_display(0), (config::display::HEIGHT - 1, false));
    }

    #[test]
    fn ac_zero_maps_to_center_row_bipolar() {
        let (mut cfg, cal, table) = setup(3, 3);
        cfg.bipolar = true;
        let t = table.transform(&cfg, &cal);
        assert_eq!(t.to_display(cal.ac_zero), (config::display::HEIGHT / 2, false));
    }

    #[test]
    fn out_of_window_clips_and_reports_it() {
        let (cfg, cal, table) = setup(0, 0);
        let t = table.transform(&cfg, &cal);
        // finest range: full-scale raw is far off the top of the display
        let (row, clipped) = t.to_display(config::adc::MAX_CONVERSION_VALUE);
        assert_eq!(row, 0);
        assert!(clipped);
    }

    #[test]
    fn finer_display_range_magnifies() {
        let (cfg_same, cal, table) = setup(6, 6);
        let (cfg_finer, _, _) = setup(6, 5);
        let t_same = table.transform(&cfg_same, &cal);
        let t_finer = table.transform(&cfg_finer, &cal);
        let raw = 100;
        let (row_same, _) = t_same.to_display(raw);
        let (row_finer, _) = t_finer.to_display(raw);
        let base = config::display::HEIGHT - 1;
        assert!(
            base - row_finer > base - row_same,
            "finer display range should move the same raw value further from base"
        );
    }

    #[test]
    fn volts_agree_with_pixel_path() {
        let (cfg, cal, table) = setup(6, 6);
        let t = table.transform(&cfg, &cal);
        // two raw values one division apart must be PIXELS_PER_DIV rows and
        // mv_per_div volts apart, within rounding
        let step = table.raw_per_div(6);
        let (row_a, _) = t.to_display(100);
        let (row_b, _) = t.to_display(100 + step);
        let dv = to_volts(&cfg, &cal, 100 + step) - to_volts(&cfg, &cal, 100);
        assert!((i32::from(row_a - row_b) - i32::from(config::display::PIXELS_PER_DIV)).abs() <= 1);
        let expect_v = config::range::TABLE[6].mv_per_div as f32 / 1000.0;
        assert!((dv - expect_v).abs() < expect_v * 0.02, "dv = {}", dv);
    }

    #[test]
    fn volts_round_trip() {
        let (mut cfg, cal, _) = setup(6, 6);
        cfg.bipolar = true;
        for raw in [0u16, 100, 2048, 4000] {
            let v = to_volts(&cfg, &cal, raw);
            let back = from_volts(&cfg, &cal, v);
            assert!((i32::from(back) - i32::from(raw)).abs() <= 1);
        }
    }

    #[test]
    fn recompute_applies_trim() {
        let cal = Calibration::default();
        let mut table = RangeTable::new(&cal);
        let nominal = table.raw_per_div(0);
        let trimmed = Calibration {
            trim_x1000: 1100,
            ..cal
        };
        table.recompute(&trimmed);
        let adjusted = table.raw_per_div(0);
        assert!(adjusted > nominal);
    }
}
