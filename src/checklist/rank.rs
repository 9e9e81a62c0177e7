//! Priority ranking engine.
//!
//! Deterministic, total, stable ordering over checklist items for display:
//! deadline ascending first (no deadline sorts last), then a fixed
//! (category, subcategory) → rank table. Pairs absent from the table sort
//! after every ranked pair and keep their input order.

use super::model::{Category, ChecklistItem, Subcategory};

/// The business priority table. Lower rank sorts first.
/// Fixed enumerated constant — never derived dynamically.
pub const PRIORITY_TABLE: &[(Category, Subcategory, u32)] = &[
    (Category::QuoteFollowUp, Subcategory::QuotesFollowUp, 0),
    // Life
    (Category::Life, Subcategory::NoPay, 1),
    (Category::Life, Subcategory::Cancellation, 2),
    (Category::Life, Subcategory::DocumentsNeeded, 3),
    (Category::Life, Subcategory::Renewal, 4),
    (Category::Life, Subcategory::Endorsement, 5),
    (Category::Life, Subcategory::Claim, 6),
    // Commercial
    (Category::Commercial, Subcategory::NoPay, 7),
    (Category::Commercial, Subcategory::Cancellation, 8),
    (Category::Commercial, Subcategory::DocumentsNeeded, 9),
    (Category::Commercial, Subcategory::Renewal, 10),
    (Category::Commercial, Subcategory::Endorsement, 11),
    (Category::Commercial, Subcategory::Claim, 12),
    // PL Home
    (Category::PlHome, Subcategory::QuotesFollowUp, 13),
    (Category::PlHome, Subcategory::NoPay, 14),
    (Category::PlHome, Subcategory::Cancellation, 15),
    (Category::PlHome, Subcategory::DocumentsNeeded, 16),
    (Category::PlHome, Subcategory::Renewal, 17),
    (Category::PlHome, Subcategory::Endorsement, 18),
    (Category::PlHome, Subcategory::Claim, 19),
    // PL Auto
    (Category::PlAuto, Subcategory::NoPay, 20),
    (Category::PlAuto, Subcategory::Cancellation, 21),
    (Category::PlAuto, Subcategory::DocumentsNeeded, 22),
    (Category::PlAuto, Subcategory::Renewal, 23),
    (Category::PlAuto, Subcategory::Endorsement, 24),
    (Category::PlAuto, Subcategory::Claim, 25),
    // PL Renters
    (Category::PlRenters, Subcategory::QuotesFollowUp, 26),
    (Category::PlRenters, Subcategory::NoPay, 27),
    (Category::PlRenters, Subcategory::Cancellation, 28),
    (Category::PlRenters, Subcategory::DocumentsNeeded, 29),
    (Category::PlRenters, Subcategory::Renewal, 30),
    (Category::PlRenters, Subcategory::Endorsement, 31),
    (Category::PlRenters, Subcategory::Claim, 32),
];

/// Rank for a (category, subcategory) pair; `None` for pairs not in the table.
pub fn pair_rank(category: Category, subcategory: Subcategory) -> Option<u32> {
    PRIORITY_TABLE
        .iter()
        .find(|(c, s, _)| *c == category && *s == subcategory)
        .map(|(_, _, rank)| *rank)
}

/// Produce the display ordering. Stable; does not mutate the input.
pub fn rank(items: &[ChecklistItem]) -> Vec<ChecklistItem> {
    let mut out: Vec<ChecklistItem> = items.to_vec();
    out.sort_by_key(|item| {
        (
            // No deadline sorts as the maximum representable future instant.
            item.deadline.unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC),
            pair_rank(item.category, item.subcategory).unwrap_or(u32::MAX),
        )
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn item(
        text: &str,
        deadline: Option<chrono::DateTime<Utc>>,
        category: Category,
        subcategory: Subcategory,
    ) -> ChecklistItem {
        ChecklistItem::new(Uuid::new_v4(), text, deadline, category, subcategory)
    }

    #[test]
    fn table_covers_thirty_three_pairs_with_unique_ranks() {
        assert_eq!(PRIORITY_TABLE.len(), 33);
        let mut ranks: Vec<u32> = PRIORITY_TABLE.iter().map(|(_, _, r)| *r).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (0..33).collect::<Vec<u32>>());
    }

    #[test]
    fn quote_follow_up_is_globally_highest() {
        assert_eq!(
            pair_rank(Category::QuoteFollowUp, Subcategory::QuotesFollowUp),
            Some(0)
        );
    }

    #[test]
    fn ranking_is_deterministic() {
        let items = vec![
            item("a", None, Category::Life, Subcategory::Claim),
            item("b", Some(Utc::now()), Category::PlAuto, Subcategory::NoPay),
            item("c", None, Category::QuoteFollowUp, Subcategory::QuotesFollowUp),
        ];
        let first: Vec<Uuid> = rank(&items).iter().map(|i| i.id).collect();
        let second: Vec<Uuid> = rank(&items).iter().map(|i| i.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn deadline_beats_category() {
        let soon = Utc::now() + Duration::hours(1);
        let later = Utc::now() + Duration::hours(2);
        let items = vec![
            item("low-priority-soon", Some(soon), Category::PlRenters, Subcategory::Claim),
            item("high-priority-later", Some(later), Category::Life, Subcategory::NoPay),
        ];
        let ranked = rank(&items);
        assert_eq!(ranked[0].text, "low-priority-soon");
    }

    #[test]
    fn no_deadline_sorts_last() {
        let items = vec![
            item(
                "x",
                None,
                Category::QuoteFollowUp,
                Subcategory::QuotesFollowUp,
            ),
            item(
                "y",
                Some(Utc::now() + Duration::hours(1)),
                Category::PlRenters,
                Subcategory::DocumentsNeeded,
            ),
        ];
        let ranked = rank(&items);
        assert_eq!(ranked[0].text, "y");
        assert_eq!(ranked[1].text, "x");
    }

    #[test]
    fn equal_deadlines_fall_back_to_table() {
        let deadline = Utc::now() + Duration::days(1);
        let items = vec![
            item("commercial", Some(deadline), Category::Commercial, Subcategory::NoPay),
            item("life", Some(deadline), Category::Life, Subcategory::NoPay),
        ];
        let ranked = rank(&items);
        // Life / No Pay (rank 1) sorts before Commercial / No Pay (rank 7).
        assert_eq!(ranked[0].text, "life");
    }

    #[test]
    fn unranked_pairs_sort_last_and_keep_input_order() {
        // Quote Follow Up only pairs with Quotes Follow Up in the table.
        let items = vec![
            item("unranked-1", None, Category::QuoteFollowUp, Subcategory::Claim),
            item("unranked-2", None, Category::QuoteFollowUp, Subcategory::Renewal),
            item("ranked", None, Category::PlRenters, Subcategory::Claim),
        ];
        let ranked = rank(&items);
        assert_eq!(ranked[0].text, "ranked");
        assert_eq!(ranked[1].text, "unranked-1");
        assert_eq!(ranked[2].text, "unranked-2");
    }

    #[test]
    fn input_is_not_mutated() {
        let items = vec![
            item("b", None, Category::Life, Subcategory::Claim),
            item("a", Some(Utc::now()), Category::Life, Subcategory::NoPay),
        ];
        let before: Vec<Uuid> = items.iter().map(|i| i.id).collect();
        let _ = rank(&items);
        let after: Vec<Uuid> = items.iter().map(|i| i.id).collect();
        assert_eq!(before, after);
    }
}
