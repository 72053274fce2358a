use crate::model::record::{SubItem, WorkItemRecord};

/// Share of the progress value driven by sub-item completion. The rest is
/// reserved for explicitly marking the parent done.
const SUB_ITEM_WEIGHT: f64 = 90.0;
const COMPLETION_BONUS: u32 = 10;

/// Compute an item's completion percentage.
///
/// Without sub-items: 100 when completed, otherwise the manual value (or 0).
/// With sub-items: `round(done / total * 90)`, plus 10 when completed.
pub fn calculate_progress(sub_items: &[SubItem], is_completed: bool, manual: Option<u8>) -> u8 {
    if sub_items.is_empty() {
        return if is_completed {
            100
        } else {
            manual.unwrap_or(0).min(100)
        };
    }

    let total = sub_items.len() as f64;
    let done = sub_items.iter().filter(|s| s.is_completed).count() as f64;
    let base = (done / total * SUB_ITEM_WEIGHT).round() as u32;
    let bonus = if is_completed { COMPLETION_BONUS } else { 0 };
    (base + bonus).min(100) as u8
}

/// Re-derive a record's progress from its current state, keeping its stored
/// value as the manual fallback.
pub fn derive_progress(record: &WorkItemRecord) -> u8 {
    calculate_progress(&record.sub_items, record.is_completed, Some(record.progress))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subs(states: &[bool]) -> Vec<SubItem> {
        states
            .iter()
            .enumerate()
            .map(|(i, done)| SubItem {
                id: format!("s{}", i),
                content: format!("step {}", i),
                is_completed: *done,
            })
            .collect()
    }

    #[test]
    fn half_done_sub_items() {
        assert_eq!(calculate_progress(&subs(&[true, false]), false, None), 45);
    }

    #[test]
    fn no_sub_items_completed() {
        assert_eq!(calculate_progress(&[], true, None), 100);
        assert_eq!(calculate_progress(&[], true, Some(20)), 100);
    }

    #[test]
    fn no_sub_items_manual() {
        assert_eq!(calculate_progress(&[], false, Some(30)), 30);
        assert_eq!(calculate_progress(&[], false, None), 0);
    }

    #[test]
    fn manual_value_is_clamped() {
        assert_eq!(calculate_progress(&[], false, Some(250)), 100);
    }

    #[test]
    fn all_sub_items_done_but_parent_open_stays_below_100() {
        assert_eq!(calculate_progress(&subs(&[true, true, true]), false, None), 90);
        assert_eq!(calculate_progress(&subs(&[true, true, true]), true, None), 100);
    }

    #[test]
    fn rounding() {
        // 1/3 * 90 = 30, 2/3 * 90 = 60
        assert_eq!(calculate_progress(&subs(&[true, false, false]), false, None), 30);
        // 1/7 * 90 = 12.857...
        assert_eq!(
            calculate_progress(&subs(&[true, false, false, false, false, false, false]), false, None),
            13
        );
    }

    #[test]
    fn manual_ignored_when_sub_items_exist() {
        assert_eq!(calculate_progress(&subs(&[false, false]), false, Some(70)), 0);
    }
}
