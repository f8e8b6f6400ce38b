use std::collections::HashSet;

use snaps_types::models::{Channel, UnreadCounts, UnreadSummary};

/// Splits the backend's unread summary into community and direct totals.
///
/// Direct unread is summed over channels known to be direct messages;
/// channels missing from `channels` (created or left since the list was
/// loaded) count as community. The direct sum is capped at the total so
/// the split always adds up.
pub fn aggregate(summary: &UnreadSummary, channels: &[Channel]) -> UnreadCounts {
    let total = summary
        .total_unread
        .unwrap_or_else(|| {
            summary
                .channels
                .iter()
                .map(|c| c.unread_count)
                .fold(0u64, u64::saturating_add)
        });

    let direct_ids: HashSet<&str> = channels
        .iter()
        .filter(|c| c.kind.is_direct())
        .map(|c| c.id.as_str())
        .collect();

    let direct = summary
        .channels
        .iter()
        .filter(|c| direct_ids.contains(c.channel_id.as_str()))
        .map(|c| c.unread_count)
        .fold(0u64, u64::saturating_add)
        .min(total);

    UnreadCounts {
        total,
        community: total - direct,
        direct,
    }
}
