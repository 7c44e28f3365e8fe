//! Build-time configuration: acquisition geometry, timebase and range tables,
//! control-loop tuning.
//!
//! Everything here is a compile-time constant; derived values are computed in
//! `const` context and cross-checked with `const _: () = assert!(...)` guards.

#[cfg(feature = "defmt")]
pub fn dump_to_log() {
    defmt::info!(
        "\n\
        ADC:\n\
        - RESOLUTION_BITS: {}\n\
        - MAX_CONVERSION_VALUE: {}\n\
        - VREF_MV: {}\n\
        Buffer:\n\
        - LEN: {}\n\
        - PRETRIGGER_LEN: {}\n\
        - DEFAULT_END: {}\n\
        Display:\n\
        - WIDTH: {}\n\
        - HEIGHT: {}\n\
        - PIXELS_PER_DIV: {}\n\
        Trigger:\n\
        - TIMEOUT_MS: {}\n\
        - MIN_TIMEOUT_SAMPLES: {}\n\
        Tables:\n\
        - TIMEBASE_COUNT: {}\n\
        - RANGE_COUNT: {}\n\
        FFT:\n\
        - LEN: {}\n\
        ",
        adc::RESOLUTION_BITS,
        adc::MAX_CONVERSION_VALUE,
        adc::VREF_MV,
        buffer::LEN,
        buffer::PRETRIGGER_LEN,
        buffer::DEFAULT_END,
        display::WIDTH,
        display::HEIGHT,
        display::PIXELS_PER_DIV,
        trigger::TIMEOUT_MS,
        trigger::MIN_TIMEOUT_SAMPLES,
        timebase::COUNT,
        range::COUNT,
        fft::LEN,
    );
}

/// ADC geometry.
pub mod adc {
    /// Single-ended conversion width.
    pub const RESOLUTION_BITS: u32 = 12;

    /// Highest value a conversion can produce.
    pub const MAX_CONVERSION_VALUE: u16 = (1 << RESOLUTION_BITS) - 1;

    /// Reference voltage at full scale, in millivolts.
    pub const VREF_MV: u32 = 3300;

    /// Sentinel for a buffer slot that never held a conversion.
    ///
    /// Outside the 12-bit conversion range, so it can never be produced by
    /// the hardware. Rendering and statistics must skip it.
    pub const INVALID_SAMPLE: u16 = u16::MAX;

    const _: () = assert!(INVALID_SAMPLE > MAX_CONVERSION_VALUE);
}

/// Sample buffer geometry.
pub mod buffer {
    use crate::config;

    /// Physical sample buffer capacity.
    pub const LEN: usize = 2048;

    /// Ring-shaped region holding samples captured before the trigger point.
    pub const PRETRIGGER_LEN: usize = 320;

    /// End cursor of a normal acquisition: one pre-trigger region plus one
    /// display width of post-trigger samples. A stop request grows this to
    /// `LEN`, never past it.
    pub const DEFAULT_END: usize = PRETRIGGER_LEN + config::display::WIDTH;

    /// Where the block-strategy trigger scan runs: once the hardware block
    /// transfer has filled half the buffer.
    pub const BLOCK_SCAN_AT: usize = LEN / 2;

    const _: () = assert!(PRETRIGGER_LEN >= config::display::WIDTH);
    const _: () = assert!(DEFAULT_END <= LEN);
    const _: () = assert!(BLOCK_SCAN_AT >= DEFAULT_END);
    // block restart must leave room for a full display width after the scan point
    const _: () = assert!(LEN - BLOCK_SCAN_AT >= config::display::WIDTH);
}

/// Display window geometry, as seen by the transform pipeline.
///
/// The engine never draws; it only maps raw samples onto this coordinate
/// system for the display collaborator.
pub mod display {
    /// Visible trace width in samples/pixels.
    pub const WIDTH: usize = 320;

    /// Visible trace height in pixel rows. Row 0 is the top (highest voltage).
    pub const HEIGHT: i16 = 240;

    /// Pixel rows per grid division.
    pub const PIXELS_PER_DIV: i16 = 30;

    /// Vertical grid divisions.
    pub const DIVS: i16 = HEIGHT / PIXELS_PER_DIV;

    /// Sentinel pixel row for "no data here"; rendering skips it.
    pub const INVISIBLE: i16 = i16::MIN;

    const _: () = assert!(DIVS * PIXELS_PER_DIV == HEIGHT);
    const _: () = assert!(INVISIBLE < 0);
}

/// Trigger timeout tuning.
///
/// The timeout exists so a degenerate or absent trigger condition can never
/// hang an acquisition; the exact budget is a tunable, only the bounded
/// termination matters.
pub mod trigger {
    /// Wall-clock trigger search budget, independent of sample rate.
    pub const TIMEOUT_MS: u32 = 200;

    /// Floor on the per-sample search budget, so very slow timebases still
    /// get a usable number of samples to search.
    pub const MIN_TIMEOUT_SAMPLES: u32 = 1024;

    /// How many times the block strategy may restart the hardware transfer
    /// before giving up and accepting untriggered data.
    pub const BLOCK_RESTART_BUDGET: u32 = 8;
}

/// Timebase table.
pub mod timebase {
    /// Sample clock feeding the programmable divider.
    pub const CLK_HZ: u32 = 72_000_000;

    /// Samples captured per horizontal grid division.
    pub const SAMPLES_PER_DIV: u32 = 25;

    /// One timebase table entry.
    ///
    /// `ps_per_sample_exact` is the true sample interval implied by the
    /// divider, present only when it is a whole number of picoseconds;
    /// frequency read-outs prefer it over the rounded `ns_per_sample`.
    pub struct Timebase {
        pub label: &'static str,
        pub us_per_div: u32,
        /// Sample clock divider; 32 bits, since the slowest timebases count
        /// millions of clocks per sample.
        pub divider: u32,
        pub ns_per_sample: u32,
        pub ps_per_sample_exact: Option<u64>,
        /// Fast timebases capture via hardware block transfer; slow ones
        /// per-sample (which also enables draw-while-acquire).
        pub block_capture: bool,
    }

    const fn entry(label: &'static str, us_per_div: u32, block_capture: bool) -> Timebase {
        let ns_per_sample = us_per_div * 1000 / SAMPLES_PER_DIV;
        // divider = round(ns * CLK_HZ / 1e9), with CLK_HZ/1e9 = 9/125
        let divider = (ns_per_sample as u64 * 9 + 62) / 125;
        assert!(divider > 0 && divider <= u32::MAX as u64);
        // true interval is divider * 125000/9 ps; exact only if 9 divides evenly
        let ps = divider * 125_000;
        let ps_per_sample_exact = if ps % 9 == 0 { Some(ps / 9) } else { None };
        Timebase {
            label,
            us_per_div,
            divider: divider as u32,
            ns_per_sample,
            ps_per_sample_exact,
            block_capture,
        }
    }

    pub const TABLE: [Timebase; 16] = [
        entry("10us", 10, true),
        entry("20us", 20, true),
        entry("50us", 50, true),
        entry("100us", 100, true),
        entry("200us", 200, true),
        entry("500us", 500, true),
        entry("1ms", 1_000, false),
        entry("2ms", 2_000, false),
        entry("5ms", 5_000, false),
        entry("10ms", 10_000, false),
        entry("20ms", 20_000, false),
        entry("50ms", 50_000, false),
        entry("100ms", 100_000, false),
        entry("200ms", 200_000, false),
        entry("500ms", 500_000, false),
        entry("1s", 1_000_000, false),
    ];

    pub const COUNT: usize = TABLE.len();
    pub const DEFAULT_INDEX: usize = 6;

    const _: () = assert!(DEFAULT_INDEX < COUNT);
}

/// Input range (attenuator) table.
pub mod range {
    /// One attenuator/gain setting.
    ///
    /// `att_x1000` is the hardware attenuation factor scaled by 1000 (1000 =
    /// pass-through). `digits` is the decimal precision the display should
    /// use for voltage labels in this range.
    pub struct Range {
        pub label: &'static str,
        pub mv_per_div: u32,
        pub att_x1000: u32,
        pub digits: u8,
        pub hw_code: u8,
    }

    pub const TABLE: [Range; 10] = [
        Range { label: "10mV", mv_per_div: 10, att_x1000: 1_000, digits: 3, hw_code: 0 },
        Range { label: "20mV", mv_per_div: 20, att_x1000: 1_000, digits: 3, hw_code: 0 },
        Range { label: "50mV", mv_per_div: 50, att_x1000: 1_000, digits: 3, hw_code: 0 },
        Range { label: "0.1V", mv_per_div: 100, att_x1000: 1_000, digits: 2, hw_code: 0 },
        Range { label: "0.2V", mv_per_div: 200, att_x1000: 10_000, digits: 2, hw_code: 1 },
        Range { label: "0.5V", mv_per_div: 500, att_x1000: 10_000, digits: 2, hw_code: 1 },
        Range { label: "1V", mv_per_div: 1_000, att_x1000: 10_000, digits: 1, hw_code: 1 },
        Range { label: "2V", mv_per_div: 2_000, att_x1000: 100_000, digits: 1, hw_code: 2 },
        Range { label: "5V", mv_per_div: 5_000, att_x1000: 100_000, digits: 1, hw_code: 2 },
        Range { label: "10V", mv_per_div: 10_000, att_x1000: 100_000, digits: 0, hw_code: 2 },
    ];

    pub const COUNT: usize = TABLE.len();
    pub const DEFAULT_INDEX: usize = 6;

    const _: () = {
        // each range's full display span must fit the ADC input window
        let mut i = 0;
        while i < COUNT {
            let pin_mv_full =
                TABLE[i].mv_per_div * super::display::DIVS as u32 * 1000 / TABLE[i].att_x1000;
            assert!(pin_mv_full <= super::adc::VREF_MV);
            i += 1;
        }
    };
    const _: () = assert!(DEFAULT_INDEX < COUNT);
}

/// Auto-range / auto-trigger / auto-offset tuning.
pub mod autorange {
    use crate::math::ScalingFactor;

    /// De-escalating to a finer input range only happens after the signal
    /// has fit comfortably for this long.
    pub const DOWNSHIFT_COOLDOWN_MS: u32 = 2_000;

    /// A finer range is only selected if the signal fills at most this much
    /// of its capacity.
    pub const DOWNSHIFT_MAX_FILL: ScalingFactor = ScalingFactor::from_percent(80);

    /// Auto display range keeps this much headroom above the signal.
    pub const OFFSET_MARGIN: ScalingFactor = ScalingFactor::from_percent(75);

    /// Auto-trigger level updates smaller than `hysteresis / JITTER_DIV`
    /// are suppressed.
    pub const JITTER_DIV: u16 = 8;
}

/// Statistics tuning.
pub mod stats {
    /// Apparent periods shorter than this many samples are too fast to
    /// trust and are discarded.
    pub const MIN_SAMPLES_PER_PERIOD: u32 = 4;
}

/// Spectrum FFT size.
pub mod fft {
    /// Complex FFT length.
    pub const LEN: usize = 256;

    /// Usable half-spectrum length (DC..Nyquist).
    pub const HALF: usize = LEN / 2;

    /// At most this many distinct peaks are reported per spectrum.
    pub const MAX_PEAKS: usize = 4;

    const _: () = assert!(LEN.is_power_of_two());
    const _: () = assert!(LEN <= super::display::WIDTH.next_power_of_two());
}

/// Snapshot blob layout.
pub mod snapshot {
    use crate::config;

    pub const MAGIC: [u8; 4] = *b"DSO\x01";
    pub const VERSION: u16 = 1;

    /// Header + config + capture state + sample payload.
    pub const HEADER_LEN: usize = 6;
    pub const CONFIG_LEN: usize = 20;
    pub const STATE_LEN: usize = 14;
    pub const LEN: usize = HEADER_LEN + CONFIG_LEN + STATE_LEN + config::buffer::LEN * 2;
}
