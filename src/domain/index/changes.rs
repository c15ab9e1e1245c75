use crate::domain::entities::composition::{Composition, CompositionChange};
use crate::domain::values::change_action::ChangeAction;

pub struct ChangeDetector;

impl ChangeDetector {
    /// Entries and exits between two adjacent compositions, dated `curr.date`.
    ///
    /// With no predecessor every member of `curr` is reported as entered.
    /// Members present on both sides are never reported, even if their rank
    /// moved. Entries come first in new-rank order, then exits in
    /// previous-rank order.
    pub fn diff(prev: Option<&Composition>, curr: &Composition) -> Vec<CompositionChange> {
        let mut changes: Vec<CompositionChange> = curr
            .members
            .iter()
            .filter(|m| !prev.is_some_and(|p| p.contains(&m.symbol)))
            .map(|m| CompositionChange {
                date: curr.date,
                symbol: m.symbol.clone(),
                action: ChangeAction::Entered,
                previous_rank: None,
                new_rank: Some(m.rank),
                market_cap: m.market_cap,
            })
            .collect();

        if let Some(prev) = prev {
            changes.extend(
                prev.members
                    .iter()
                    .filter(|m| !curr.contains(&m.symbol))
                    .map(|m| CompositionChange {
                        date: curr.date,
                        symbol: m.symbol.clone(),
                        action: ChangeAction::Exited,
                        previous_rank: Some(m.rank),
                        new_rank: None,
                        market_cap: m.market_cap,
                    }),
            );
        }

        changes
    }

    /// Diff every adjacent pair of an ascending series. The first
    /// composition has no predecessor.
    pub fn diff_series(compositions: &[Composition]) -> Vec<CompositionChange> {
        let mut changes = Vec::new();
        let mut prev: Option<&Composition> = None;
        for curr in compositions {
            changes.extend(Self::diff(prev, curr));
            prev = Some(curr);
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::composition::Constituent;
    use chrono::NaiveDate;

    fn comp(day: u32, symbols: &[&str]) -> Composition {
        let weight = 1.0 / symbols.len() as f64;
        Composition {
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            members: symbols
                .iter()
                .enumerate()
                .map(|(i, s)| Constituent {
                    symbol: s.to_string(),
                    rank: i as u32 + 1,
                    market_cap: 1000.0 - i as f64,
                    weight,
                })
                .collect(),
        }
    }

    #[test]
    fn test_symmetric_turnover() {
        let c1 = comp(3, &["A", "B", "C"]);
        let c2 = comp(4, &["B", "C", "D"]);
        let changes = ChangeDetector::diff(Some(&c1), &c2);

        assert_eq!(changes.len(), 2);
        let entered: Vec<_> = changes
            .iter()
            .filter(|c| c.action == ChangeAction::Entered)
            .collect();
        let exited: Vec<_> = changes
            .iter()
            .filter(|c| c.action == ChangeAction::Exited)
            .collect();
        assert_eq!(entered.len(), 1);
        assert_eq!(entered[0].symbol, "D");
        assert_eq!(entered[0].new_rank, Some(3));
        assert_eq!(entered[0].previous_rank, None);
        assert_eq!(exited.len(), 1);
        assert_eq!(exited[0].symbol, "A");
        assert_eq!(exited[0].previous_rank, Some(1));
        assert_eq!(exited[0].new_rank, None);
        assert!(changes.iter().all(|c| c.date == c2.date));
    }

    #[test]
    fn test_rank_moves_not_reported() {
        let c1 = comp(3, &["A", "B"]);
        let c2 = comp(4, &["B", "A"]);
        assert!(ChangeDetector::diff(Some(&c1), &c2).is_empty());
    }

    #[test]
    fn test_initial_composition_all_entered() {
        let c1 = comp(3, &["A", "B", "C"]);
        let changes = ChangeDetector::diff(None, &c1);
        assert_eq!(changes.len(), 3);
        assert!(changes.iter().all(|c| c.action == ChangeAction::Entered));
    }

    #[test]
    fn test_empty_current_exits_everyone() {
        let c1 = comp(3, &["A", "B"]);
        let c2 = Composition::empty(NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());
        let changes = ChangeDetector::diff(Some(&c1), &c2);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.action == ChangeAction::Exited));
    }

    #[test]
    fn test_series_diffs_adjacent_pairs() {
        let series = vec![comp(3, &["A", "B"]), comp(4, &["A", "C"]), comp(5, &["A", "C"])];
        let changes = ChangeDetector::diff_series(&series);
        // 2 initial entries, then C in / B out, then nothing.
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[2].symbol, "C");
        assert_eq!(changes[3].symbol, "B");
    }
}
