//! Scheduling bands of the VFS worker.

pub const PRIORITY_LOW: u32 = 0x1000_0000;
pub const PRIORITY_NORMAL: u32 = 0x2000_0000;
pub const PRIORITY_HIGH: u32 = 0x3000_0000;

/// Widest offset a caller priority may add on top of the normal band.
const CALLER_PRIORITY_MASK: u32 = 0xfff;

pub const DEFAULT_PRIORITY: f32 = 128.0;

/// Map a caller priority into the worker's normal band.
///
/// The result always stays above [`PRIORITY_LOW`] and below
/// [`PRIORITY_HIGH`], whatever the caller asks for.
pub fn thread_priority(priority: f32) -> u32 {
    // float -> int casts saturate, NaN becomes 0
    PRIORITY_NORMAL + (priority as u32).min(CALLER_PRIORITY_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_into_normal_band() {
        assert_eq!(thread_priority(0.0), PRIORITY_NORMAL);
        assert_eq!(thread_priority(128.0), PRIORITY_NORMAL + 128);
        assert_eq!(thread_priority(1.0e9), PRIORITY_NORMAL + 0xfff);
        assert_eq!(thread_priority(-5.0), PRIORITY_NORMAL);
        assert_eq!(thread_priority(f32::NAN), PRIORITY_NORMAL);
        assert!(thread_priority(f32::MAX) < PRIORITY_HIGH);
    }
}
