//! Bits of the `zwarn` quality mask.
//!
//! `0` means no warning. Bit positions are part of the persisted format and
//! must not be renumbered.

pub const SKY: u32 = 1 << 0;
pub const LITTLE_COVERAGE: u32 = 1 << 1;
/// The next-ranked candidate is within `DELTACHI2_THRESHOLD` in chi2.
pub const SMALL_DELTA_CHI2: u32 = 1 << 2;
pub const NEGATIVE_MODEL: u32 = 1 << 3;
pub const MANY_OUTLIERS: u32 = 1 << 4;
/// The chi2 minimum sits on the edge of the scanned redshift range.
pub const Z_FITLIMIT: u32 = 1 << 5;
pub const NEGATIVE_EMISSION: u32 = 1 << 6;
pub const UNPLUGGED: u32 = 1 << 7;
pub const BAD_TARGET: u32 = 1 << 8;
/// No candidate was produced for this target.
pub const NODATA: u32 = 1 << 9;
/// The parabolic refinement of a minimum failed.
pub const BAD_MINFIT: u32 = 1 << 10;

/// Candidates closer than this in chi2 to the next-ranked one are ambiguous.
pub const DELTACHI2_THRESHOLD: f64 = 9.0;

/// Names of the bits set in `mask`, lowest bit first.
pub fn names(mask: u32) -> Vec<&'static str> {
    const ALL: [(u32, &str); 11] = [
        (SKY, "SKY"),
        (LITTLE_COVERAGE, "LITTLE_COVERAGE"),
        (SMALL_DELTA_CHI2, "SMALL_DELTA_CHI2"),
        (NEGATIVE_MODEL, "NEGATIVE_MODEL"),
        (MANY_OUTLIERS, "MANY_OUTLIERS"),
        (Z_FITLIMIT, "Z_FITLIMIT"),
        (NEGATIVE_EMISSION, "NEGATIVE_EMISSION"),
        (UNPLUGGED, "UNPLUGGED"),
        (BAD_TARGET, "BAD_TARGET"),
        (NODATA, "NODATA"),
        (BAD_MINFIT, "BAD_MINFIT"),
    ];
    ALL.iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}
