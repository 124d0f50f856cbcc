//! Common small functions used throughout the crate
//!
//! These are left public for the convenience of the user, for example the
//! nicer scientific formatting used by the part summaries.

use std::fmt::LowerExp;
use std::ops::Range;

// Alias for the format! macro out of laziness
pub use std::format as f;

/// Extends primitives with more specific formatting options
pub trait NumberFmt {
    /// Better scientific number formatting
    ///
    /// Works for anything that can be represented as scientific using the
    /// LowerExp trait, and always signs and pads the exponent.
    ///
    /// ```rust
    /// # use d3parts::utils::NumberFmt;
    /// assert_eq!((-1.0).sci(5, 2), "-1.00000e+00".to_string());
    /// assert_eq!((1250.0).sci(3, 2), "1.250e+03".to_string());
    /// assert_eq!((0.001).sci(2, 3), "1.00e-003".to_string());
    /// ```
    fn sci(&self, precision: usize, exp_pad: usize) -> String;
}

impl<T: LowerExp> NumberFmt for T {
    fn sci(&self, precision: usize, exp_pad: usize) -> String {
        let mut num = f!("{:.precision$e}", &self, precision = precision);
        // `{:e}` always writes an 'e', so falling back to the end is never hit
        let split = num.find('e').unwrap_or(num.len());
        let exp = num.split_off(split);
        let (sign, exp) = match exp.strip_prefix("e-") {
            Some(exp) => ('-', exp),
            None => ('+', exp.get(1..).unwrap_or("0")),
        };
        num.push_str(&f!("e{}{:0>pad$}", sign, exp, pad = exp_pad));
        num
    }
}

/// Intersection of a cell block with a requested window
///
/// Both ranges are half-open global cell ranges. Returns the clipped range,
/// or `None` when they do not overlap.
///
/// ```rust
/// # use d3parts::utils::clip;
/// assert_eq!(clip(0..10, 5..15), Some(5..10));
/// assert_eq!(clip(10..30, 5..15), Some(10..15));
/// assert_eq!(clip(30..40, 5..15), None);
/// ```
pub fn clip(block: Range<usize>, window: Range<usize>) -> Option<Range<usize>> {
    let start = block.start.max(window.start);
    let end = block.end.min(window.end);
    (start < end).then_some(start..end)
}

/// Short human readable word count, e.g. `1.2M words`
///
/// Units are binary, so `k` is 1024 words and `M` is 1024k words.
///
/// ```rust
/// # use d3parts::utils::word_count;
/// assert_eq!(word_count(512), "512 words");
/// assert_eq!(word_count(10_000), "10000 words");
/// assert_eq!(word_count(10_240), "10.0k words");
/// assert_eq!(word_count(1_048_576), "1.0M words");
/// ```
pub fn word_count(words: u64) -> String {
    const KILO: u64 = 1 << 10;
    const MEGA: u64 = 1 << 20;
    match words {
        w if w >= MEGA => f!("{:.1}M words", w as f64 / MEGA as f64),
        w if w >= 10 * KILO => f!("{:.1}k words", w as f64 / KILO as f64),
        w => f!("{w} words"),
    }
}
