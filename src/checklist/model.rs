//! Checklist data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Business line a checklist item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Quote Follow Up")]
    QuoteFollowUp,
    Life,
    Commercial,
    #[serde(rename = "PL Home")]
    PlHome,
    #[serde(rename = "PL Auto")]
    PlAuto,
    #[serde(rename = "PL Renters")]
    PlRenters,
}

/// Work type within a business line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subcategory {
    #[serde(rename = "Quotes Follow Up")]
    QuotesFollowUp,
    #[serde(rename = "No Pay")]
    NoPay,
    Cancellation,
    #[serde(rename = "Documents Needed")]
    DocumentsNeeded,
    Renewal,
    Endorsement,
    Claim,
}

/// A single checklist item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub category: Category,
    pub subcategory: Subcategory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChecklistItem {
    pub fn new(
        creator_id: Uuid,
        text: impl Into<String>,
        deadline: Option<DateTime<Utc>>,
        category: Category,
        subcategory: Subcategory,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            creator_id,
            text: text.into(),
            deadline,
            completed: false,
            completed_at: None,
            deleted: false,
            category,
            subcategory,
            created_at: now,
            updated_at: now,
        }
    }

    /// Toggle completion, keeping `completed` and `completed_at` in lockstep.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = completed.then_some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serde_display_names() {
        assert_eq!(
            serde_json::to_string(&Category::QuoteFollowUp).unwrap(),
            "\"Quote Follow Up\""
        );
        assert_eq!(serde_json::to_string(&Category::PlHome).unwrap(), "\"PL Home\"");
        let parsed: Category = serde_json::from_str("\"PL Renters\"").unwrap();
        assert_eq!(parsed, Category::PlRenters);
    }

    #[test]
    fn subcategory_serde_display_names() {
        assert_eq!(
            serde_json::to_string(&Subcategory::QuotesFollowUp).unwrap(),
            "\"Quotes Follow Up\""
        );
        let parsed: Subcategory = serde_json::from_str("\"No Pay\"").unwrap();
        assert_eq!(parsed, Subcategory::NoPay);
    }

    #[test]
    fn completed_and_completed_at_stay_in_lockstep() {
        let mut item = ChecklistItem::new(
            Uuid::new_v4(),
            "send renewal docs",
            None,
            Category::PlAuto,
            Subcategory::Renewal,
        );
        assert!(!item.completed);
        assert!(item.completed_at.is_none());

        let now = Utc::now();
        item.set_completed(true, now);
        assert!(item.completed);
        assert_eq!(item.completed_at, Some(now));

        item.set_completed(false, now);
        assert!(!item.completed);
        assert!(item.completed_at.is_none());
    }
}
