//! Peak-period classification and per-document period slots.
//!
//! Markup and PDF surveys label periods by the start hour of their peak
//! window. Workbooks put each period at a fixed anchor row and only confirm
//! it by checking the window spans exactly one hour.

use chrono::TimeDelta;

use crate::model::{PeriodFilter, PeriodLabel, TimeWindow};

/// Classify a window by its start hour.
///
/// 06-08 is AM, 09-15 is midday, 16-19 is PM; anything else is unclassified.
pub fn classify_by_start_hour(window: &TimeWindow) -> PeriodLabel {
    match window.start_hour() {
        6..=8 => PeriodLabel::Am,
        9..=15 => PeriodLabel::Md,
        16..=19 => PeriodLabel::Pm,
        _ => PeriodLabel::Unclassified,
    }
}

/// Confirm a fixed-slot window: the slot's label if the window lasts exactly
/// one hour, otherwise unclassified.
pub fn classify_fixed_slot(slot: PeriodLabel, window: &TimeWindow) -> PeriodLabel {
    if window.duration() == TimeDelta::hours(1) {
        slot
    } else {
        PeriodLabel::Unclassified
    }
}

/// Detection and request state of one period within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodSlot {
    pub label: PeriodLabel,
    /// A matching window was found in the source.
    pub available: bool,
    /// The caller's filter asked for this period.
    pub scraped: bool,
    /// Format-specific anchor that re-locates this period's fields.
    pub position: Option<usize>,
}

impl PeriodSlot {
    fn empty(label: PeriodLabel, filter: &PeriodFilter) -> Self {
        Self {
            label,
            available: false,
            scraped: filter.contains(label),
            position: None,
        }
    }

    /// Fields for this period belong in the record.
    pub fn is_populated(&self) -> bool {
        self.available && self.scraped
    }
}

/// The three period slots of a document, computed once before any period
/// field is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodSlots {
    slots: [PeriodSlot; 3],
}

impl PeriodSlots {
    /// Build slots from `(anchor, label)` pairs in detection order.
    ///
    /// The first anchor classified under a label keeps it; later windows with
    /// the same label are ignored, as are unclassified ones.
    pub fn detect<I>(classified: I, filter: &PeriodFilter) -> Self
    where
        I: IntoIterator<Item = (usize, PeriodLabel)>,
    {
        let mut slots = PeriodLabel::PERIODS.map(|label| PeriodSlot::empty(label, filter));

        for (anchor, label) in classified {
            let Some(idx) = label.index() else {
                continue;
            };
            let slot = &mut slots[idx];
            if slot.available {
                tracing::debug!(%label, anchor, "period already assigned, keeping first window");
                continue;
            }
            slot.available = true;
            slot.position = Some(anchor);
        }

        Self { slots }
    }

    pub fn get(&self, label: PeriodLabel) -> Option<&PeriodSlot> {
        label.index().map(|i| &self.slots[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use proptest::prelude::*;

    fn window(h: u32, m: u32, minutes: i64) -> TimeWindow {
        let start = NaiveTime::from_hms_opt(h, m, 0).unwrap();
        TimeWindow::new(start, start + TimeDelta::minutes(minutes))
    }

    #[test]
    fn boundaries() {
        assert_eq!(classify_by_start_hour(&window(5, 59, 60)), PeriodLabel::Unclassified);
        assert_eq!(classify_by_start_hour(&window(6, 0, 60)), PeriodLabel::Am);
        assert_eq!(classify_by_start_hour(&window(8, 59, 60)), PeriodLabel::Am);
        assert_eq!(classify_by_start_hour(&window(9, 0, 60)), PeriodLabel::Md);
        assert_eq!(classify_by_start_hour(&window(15, 30, 60)), PeriodLabel::Md);
        assert_eq!(classify_by_start_hour(&window(16, 0, 60)), PeriodLabel::Pm);
        assert_eq!(classify_by_start_hour(&window(19, 45, 60)), PeriodLabel::Pm);
        assert_eq!(classify_by_start_hour(&window(20, 0, 60)), PeriodLabel::Unclassified);
    }

    #[test]
    fn fixed_slot_requires_one_hour() {
        assert_eq!(
            classify_fixed_slot(PeriodLabel::Am, &window(7, 30, 60)),
            PeriodLabel::Am
        );
        assert_eq!(
            classify_fixed_slot(PeriodLabel::Am, &window(7, 30, 45)),
            PeriodLabel::Unclassified
        );
        // The slot decides the label, not the clock.
        assert_eq!(
            classify_fixed_slot(PeriodLabel::Pm, &window(7, 30, 60)),
            PeriodLabel::Pm
        );
    }

    #[test]
    fn first_window_wins() {
        let slots = PeriodSlots::detect(
            [(2, PeriodLabel::Am), (3, PeriodLabel::Am), (4, PeriodLabel::Pm)],
            &PeriodFilter::all(),
        );
        assert_eq!(slots.get(PeriodLabel::Am).unwrap().position, Some(2));
        assert!(!slots.get(PeriodLabel::Md).unwrap().available);
        assert_eq!(slots.get(PeriodLabel::Pm).unwrap().position, Some(4));
    }

    #[test]
    fn filter_sets_scraped_independently() {
        let slots = PeriodSlots::detect(
            [(0, PeriodLabel::Am), (1, PeriodLabel::Md), (2, PeriodLabel::Unclassified)],
            &PeriodFilter::only(&[PeriodLabel::Am, PeriodLabel::Pm]),
        );
        let am = slots.get(PeriodLabel::Am).unwrap();
        let md = slots.get(PeriodLabel::Md).unwrap();
        let pm = slots.get(PeriodLabel::Pm).unwrap();
        assert!(am.available && am.scraped);
        assert!(md.available && !md.scraped);
        assert!(!pm.available && pm.scraped);

        let populated: Vec<_> = PeriodLabel::PERIODS
            .into_iter()
            .filter(|l| slots.get(*l).is_some_and(PeriodSlot::is_populated))
            .collect();
        assert_eq!(populated, vec![PeriodLabel::Am]);
    }

    proptest! {
        #[test]
        fn start_hour_rule(h in 0u32..24, m in 0u32..60) {
            let label = classify_by_start_hour(&window(h, m, 60));
            let expected = if (6..=8).contains(&h) {
                PeriodLabel::Am
            } else if (9..=15).contains(&h) {
                PeriodLabel::Md
            } else if (16..=19).contains(&h) {
                PeriodLabel::Pm
            } else {
                PeriodLabel::Unclassified
            };
            prop_assert_eq!(label, expected);
        }
    }
}
