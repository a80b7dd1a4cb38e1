use crate::models::ActivitySummary;

/// Summaries split by the attempt threshold
#[derive(Debug, Clone, Default)]
pub struct ThresholdSplit {
    /// Addresses with strictly more attempts than the threshold
    pub suspects: Vec<ActivitySummary>,
    pub below: Vec<ActivitySummary>,
}

/// Split summaries into suspects and addresses still under the limit.
///
/// An address with exactly `threshold` attempts is not a suspect yet.
pub fn partition_suspects(summaries: Vec<ActivitySummary>, threshold: usize) -> ThresholdSplit {
    let (suspects, below): (Vec<_>, Vec<_>) = summaries
        .into_iter()
        .partition(|s| s.attempt_count > threshold);

    for summary in &below {
        log::info!(
            "\t{} not reached limit with {} attempt(s) ({})",
            summary.address,
            summary.attempt_count,
            summary.users_display()
        );
    }

    ThresholdSplit { suspects, below }
}
