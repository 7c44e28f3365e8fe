//! Fixed point radix-2 FFT, decimation in time.
//!
//! Inputs shrink by one bit per stage, so the output carries an overall 1/N
//! normalization and the butterflies cannot overflow `i16`.

use crate::config;
use num_complex::Complex;

const N: usize = config::fft::LEN;
const N_LOG2: usize = usize::BITS as usize - 1 - N.leading_zeros() as usize;

const _: () = assert!(N.is_power_of_two());

/// Twiddle factors for the first half turn, pre-scaled to Q14 so the
/// butterfly product plus one halved input stays within `i16`.
static TWIDDLE: [Complex<i16>; N / 2] = {
    const SIN: [i16; N] = include!(concat!(env!("OUT_DIR"), "/fft_sin_table.rs"));

    let mut w = [Complex::new(0, 0); N / 2];

    let mut i = 0;
    while i < w.len() {
        let cos = SIN[i + N / 4] >> 1;
        let sin = -SIN[i] >> 1;
        w[i] = Complex::new(cos, sin);

        i += 1;
    }

    w
};

pub fn radix2(buf: &mut [Complex<i16>; N]) {
    // bit-reversal reorder
    let mut rev = 0;
    for i in 1..N {
        let mut bit = N >> 1;
        while rev & bit != 0 {
            rev ^= bit;
            bit >>= 1;
        }
        rev |= bit;
        if i < rev {
            buf.swap(i, rev);
        }
    }

    for stage in 0..N_LOG2 {
        let half = 1 << stage;
        let step = half << 1;
        let twiddle_shift = N_LOG2 - 1 - stage;
        for start in (0..N).step_by(step) {
            for k in 0..half {
                let w = TWIDDLE[k << twiddle_shift];
                let i = start + k;
                let j = i + half;
                let t = cmul_q14(buf[j], w);
                let ar = buf[i].re >> 1;
                let ai = buf[i].im >> 1;
                buf[i] = Complex::new(ar + t.re, ai + t.im);
                buf[j] = Complex::new(ar - t.re, ai - t.im);
            }
        }
    }
}

/// `a * w / 2` with the twiddle in Q14, rounding on the bit shifted out.
fn cmul_q14(a: Complex<i16>, w: Complex<i16>) -> Complex<i16> {
    let round = 1 << 14;
    let re = (i32::from(a.re) * i32::from(w.re) - i32::from(a.im) * i32::from(w.im) + round) >> 15;
    let im = (i32::from(a.re) * i32::from(w.im) + i32::from(a.im) * i32::from(w.re) + round) >> 15;
    Complex::new(re as i16, im as i16)
}
