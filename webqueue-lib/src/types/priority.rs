use serde::{Deserialize, Serialize};

/// Priority tier of a queued request.
///
/// Tiers only decide which set of destination queues is serviced first.
/// Within one destination queue the order is FIFO, except for tasks
/// enqueued as `important`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Regular traffic
    #[default]
    Normal,
    /// Serviced before every `Normal` queue
    High,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_sorts_after_normal() {
        assert!(Priority::High > Priority::Normal);
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
