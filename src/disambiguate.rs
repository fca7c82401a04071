//! Vehicle volume recovery for PDF surveys.
//!
//! The PDF text layer does not keep vehicle totals next to their direction
//! label, so they are recovered from numeric runs that sit between the
//! pedestrian and bicycle keywords of a period segment. This is best-effort:
//! the page layout does not always admit a unique parse, and a two-number
//! east/west run is surfaced as [`Volume::ManualReview`] instead of guessed.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::Volume;

// ── Scans ───────────────────────────────────────────────────────────────

/// `PEDs n` ... `Bikes`: the run after the first north pedestrian count.
static RE_NORTH_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)PEDs\s+\d+((?:\s+\d+)*).*?Bikes").unwrap());

/// `Peds n` ... `Peds`: the run between the west and east pedestrian labels.
static RE_EAST_WEST_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Peds\s+\d+((?:\s+\d+)*)\s+Peds").unwrap());

/// `Peds n` ... `Bikes n` ... `PEDs`: the run before the south pedestrian label.
static RE_SOUTH_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Peds\s+\d+.*?Bikes\s+\d+((?:\s+\d+)*)\s+PEDs").unwrap()
});

/// Vehicle totals recovered for one period segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VehicleVolumes {
    pub north: Option<Volume>,
    pub east: Option<Volume>,
    pub south: Option<Volume>,
    pub west: Option<Volume>,
}

/// Numbers captured by the first match of `re` in `segment`, empty when
/// the pattern does not match. Every number keeps its slot, so the run
/// length is the number of digit groups on the page.
fn scan(re: &Regex, segment: &str) -> Vec<u64> {
    re.captures(segment)
        .and_then(|caps| caps.get(1))
        .map(|run| {
            run.as_str()
                .split_whitespace()
                .map(|n| n.parse().unwrap_or(u64::MAX))
                .collect()
        })
        .unwrap_or_default()
}

/// Recover the four vehicle totals from one period's text segment.
pub fn disambiguate(segment: &str) -> VehicleVolumes {
    let north_run = scan(&RE_NORTH_RUN, segment);
    let east_west_run = scan(&RE_EAST_WEST_RUN, segment);
    let south_run = scan(&RE_SOUTH_RUN, segment);

    let (west, east) = resolve_east_west(&east_west_run);

    VehicleVolumes {
        north: north_run.first().copied().map(Volume::from_raw),
        east,
        south: south_run.iter().max().copied().map(Volume::from_raw),
        west,
    }
}

/// Split an east/west run into `(west, east)`.
///
/// | length | rule |
/// |--------|------|
/// | > 4    | first is west, last is east |
/// | 4      | paired `a a b b` gives west `a`, east `b`; otherwise the maximum goes to the end it sits at |
/// | 3      | the maximum goes to the end it sits at |
/// | 3, 4   | a maximum at both ends is not copied to both sides; both stay absent |
/// | 2      | both sides need manual review |
/// | < 2    | both absent |
///
/// "The end it sits at" must be unique: a maximum equal to neither end, or
/// to both, leaves both sides absent.
pub fn resolve_east_west(run: &[u64]) -> (Option<Volume>, Option<Volume>) {
    match run {
        [first, .., last] if run.len() > 4 => {
            (Some(Volume::from_raw(*first)), Some(Volume::from_raw(*last)))
        }
        [a, b, c, d] if a == b && c == d => {
            (Some(Volume::from_raw(*a)), Some(Volume::from_raw(*d)))
        }
        [_, _, _, _] | [_, _, _] => max_at_end(run),
        [_, _] => (Some(Volume::ManualReview), Some(Volume::ManualReview)),
        _ => (None, None),
    }
}

fn max_at_end(run: &[u64]) -> (Option<Volume>, Option<Volume>) {
    let (Some(&first), Some(&last), Some(&max)) = (run.first(), run.last(), run.iter().max())
    else {
        return (None, None);
    };
    match (max == first, max == last) {
        (true, false) => (Some(Volume::from_raw(max)), None),
        (false, true) => (None, Some(Volume::from_raw(max))),
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn count(n: u64) -> Option<Volume> {
        Some(Volume::from_raw(n))
    }

    #[test]
    fn symmetric_pairs() {
        assert_eq!(resolve_east_west(&[10, 10, 20, 20]), (count(10), count(20)));
    }

    #[test]
    fn four_without_pairs_uses_max() {
        assert_eq!(resolve_east_west(&[10, 12, 15, 30]), (None, count(30)));
        assert_eq!(resolve_east_west(&[30, 12, 15, 10]), (count(30), None));
        assert_eq!(resolve_east_west(&[10, 40, 15, 10]), (None, None));
    }

    #[test]
    fn three_uses_max() {
        assert_eq!(resolve_east_west(&[10, 15, 20]), (None, count(20)));
        assert_eq!(resolve_east_west(&[25, 15, 20]), (count(25), None));
        assert_eq!(resolve_east_west(&[10, 25, 20]), (None, None));
    }

    #[test]
    fn max_at_both_ends_is_ambiguous() {
        assert_eq!(resolve_east_west(&[20, 5, 20]), (None, None));
    }

    #[test]
    fn long_run_takes_ends() {
        assert_eq!(resolve_east_west(&[3, 9, 9, 9, 7]), (count(3), count(7)));
    }

    #[test]
    fn two_needs_manual_review() {
        assert_eq!(
            resolve_east_west(&[5, 9]),
            (Some(Volume::ManualReview), Some(Volume::ManualReview))
        );
    }

    #[test]
    fn short_runs_are_absent() {
        assert_eq!(resolve_east_west(&[]), (None, None));
        assert_eq!(resolve_east_west(&[7]), (None, None));
    }

    #[test]
    fn segment_scans() {
        let segment = "07:30 - 08:30\nPEDs 4 120 35\nBikes 2\nPeds 6 210 210 95 95 Peds 3\n\
                       Bikes 1 Bikes 5 300 280 PEDs 7";
        let v = disambiguate(segment);
        assert_eq!(v.north, count(120));
        assert_eq!(v.west, count(210));
        assert_eq!(v.east, count(95));
        assert_eq!(v.south, count(300));
    }

    #[test]
    fn oversize_numbers_keep_the_run_length() {
        let v = disambiguate("Peds 1 5 99999999999 Peds");
        assert_eq!(v.west, Some(Volume::ManualReview));
        assert_eq!(v.east, Some(Volume::ManualReview));

        let v = disambiguate("Peds 1 40 99999999999 7 Peds");
        assert_eq!(v.west, None);
        assert_eq!(v.east, None);
    }

    #[test]
    fn oversize_total_needs_review() {
        assert_eq!(
            resolve_east_west(&[12, 30, 4, 6, 5_000_000_000]),
            (count(12), Some(Volume::ManualReview))
        );
    }

    #[test]
    fn segment_without_runs() {
        let v = disambiguate("nothing to see");
        assert_eq!(v, VehicleVolumes::default());
    }

    proptest! {
        #[test]
        fn total_and_idempotent(run in proptest::collection::vec(0u64..5000, 0..12)) {
            let once = resolve_east_west(&run);
            prop_assert_eq!(once, resolve_east_west(&run));
            match run.len() {
                0 | 1 => prop_assert_eq!(once, (None, None)),
                2 => prop_assert_eq!(once, (Some(Volume::ManualReview), Some(Volume::ManualReview))),
                n if n > 4 => prop_assert_eq!(once, (count(run[0]), count(run[n - 1]))),
                _ => {
                    prop_assert!(once.0 != Some(Volume::ManualReview));
                    prop_assert!(once.1 != Some(Volume::ManualReview));
                }
            }
        }
    }
}
