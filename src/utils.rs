use color_eyre::{eyre::eyre, Result};
use tracing::info;

/// Count consecutive frames starting at index 1.
///
/// Assumes frames are numbered without gaps: gallops to the first missing
/// index, then binary-searches the boundary.
pub fn auto_detect_frame_count(label: &str, exists: impl Fn(u64) -> bool) -> Result<u64> {
    info!("Auto-detecting frame count in {}...", label);

    if !exists(1) {
        return Err(eyre!("No frames found in {}", label));
    }

    // Invariant: exists(lo) && !exists(hi)
    let mut lo = 1u64;
    let mut hi = 2u64;
    while exists(hi) {
        lo = hi;
        hi = hi
            .checked_mul(2)
            .ok_or_else(|| eyre!("Frame count overflow in {}", label))?;
    }
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if exists(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    info!("Found {} frames in {}", lo, label);
    Ok(lo)
}
