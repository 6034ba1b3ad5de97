use crate::HlsError;
use crate::hls::playlist::VariantInfo;

/// Pick the highest-bandwidth variant that does not exceed `max_bandwidth`.
///
/// Selection starts at the first listed variant and only moves to a later one
/// whose bandwidth is strictly higher and within the cap, so ties go to the
/// earlier entry. If every other variant is above the cap, the first one is
/// returned regardless of its own bandwidth. `None` means no cap.
pub fn select_variant(
    variants: &[VariantInfo],
    max_bandwidth: Option<u64>,
) -> Result<&VariantInfo, HlsError> {
    let (first, rest) = variants.split_first().ok_or(HlsError::NoVariants)?;
    let cap = max_bandwidth.unwrap_or(u64::MAX);

    Ok(rest.iter().fold(first, |selected, candidate| {
        if candidate.bandwidth > selected.bandwidth && candidate.bandwidth <= cap {
            candidate
        } else {
            selected
        }
    }))
}
