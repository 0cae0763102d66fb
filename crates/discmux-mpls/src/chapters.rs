//! Chapter export in the OGM text format accepted by `mkvmerge --chapters`.

use discmux_common::Timestamp;

/// Render chapter starts as OGM chapter text.
///
/// # Examples
///
/// ```
/// use discmux_common::Timestamp;
/// use discmux_mpls::chapters::to_ogm;
///
/// let text = to_ogm(&[Timestamp::ZERO, Timestamp::from_ticks(45_000 * 90)]);
/// assert!(text.starts_with("CHAPTER01=00:00:00.000\nCHAPTER01NAME=Chapter 01\n"));
/// assert!(text.contains("CHAPTER02=00:01:30.000\n"));
/// ```
pub fn to_ogm(chapters: &[Timestamp]) -> String {
    let mut out = String::new();
    for (i, ts) in chapters.iter().enumerate() {
        let n = i + 1;
        out.push_str(&format!("CHAPTER{:02}={}\n", n, ts));
        out.push_str(&format!("CHAPTER{:02}NAME=Chapter {:02}\n", n, n));
    }
    out
}
