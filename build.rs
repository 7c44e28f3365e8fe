use std::env;
use std::f64;
use std::fmt::Write;
use std::fs;
use std::path::Path;

fn main() {
    let out_dir = env::var_os("OUT_DIR").unwrap();
    let out_dir = Path::new(&out_dir);

    gen_fft_sin_table(out_dir);

    println!("cargo:rerun-if-changed=build.rs");
}

/// One full cycle of sin() at the FFT length, in Q15.
///
/// Must stay in sync with `config::fft::LEN`.
fn gen_fft_sin_table(out_dir: &Path) {
    const LEN: usize = 256;

    let mut table = [0i16; LEN];
    for (i, x) in table.iter_mut().enumerate() {
        let sample = f64::sin(2.0 * f64::consts::PI * i as f64 / LEN as f64);
        *x = (i16::MAX as f64 * sample).round() as i16;
    }

    let mut out = String::new();
    out.push('[');
    let mut first = true;
    for x in table {
        write!(out, "{}", x).unwrap();
        if first {
            first = false;
            // add type suffix to first element to ensure we don't accidentally use the wrong type
            out.push_str("i16");
        }
        out.push_str(",\n");
    }
    out.push(']');

    fs::write(out_dir.join("fft_sin_table.rs"), out).unwrap();
}
