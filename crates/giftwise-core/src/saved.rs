use tracing::debug;

use crate::gift::Gift;

pub const UNGROUPED_LABEL: &str = "All Gifts";
pub const FALLBACK_PERSONALITY_LABEL: &str = "Other";

/// Inserts a copy of `gift` unless an entry with the same id exists.
/// Returns whether the collection changed.
pub fn save_gift(saved: &mut Vec<Gift>, gift: &Gift) -> bool {
    if is_saved(saved, gift.id) {
        debug!(id = gift.id, "gift already saved");
        return false;
    }
    let mut copy = gift.clone();
    copy.recommended = false;
    saved.push(copy);
    true
}

/// Removes every entry with `id`. Returns whether the collection changed.
pub fn remove_gift(saved: &mut Vec<Gift>, id: u64) -> bool {
    let before = saved.len();
    saved.retain(|gift| gift.id != id);
    before != saved.len()
}

/// Same outcome as removing each current id in turn.
pub fn remove_all(saved: &mut Vec<Gift>) -> usize {
    let ids: Vec<u64> = saved.iter().map(|gift| gift.id).collect();
    let mut removed = 0;
    for id in ids {
        let before = saved.len();
        remove_gift(saved, id);
        removed += before - saved.len();
    }
    removed
}

pub fn is_saved(saved: &[Gift], id: u64) -> bool {
    saved.iter().any(|gift| gift.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Saved,
    Removed,
}

pub fn toggle_gift(saved: &mut Vec<Gift>, gift: &Gift) -> Toggle {
    if remove_gift(saved, gift.id) {
        Toggle::Removed
    } else {
        save_gift(saved, gift);
        Toggle::Saved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Category,
    Personality,
    PriceRange,
}

impl GroupBy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "category" => Some(Self::Category),
            "personality" | "tag" => Some(Self::Personality),
            "price" | "pricerange" => Some(Self::PriceRange),
            _ => None,
        }
    }

    pub fn key_for<'a>(self, gift: &'a Gift) -> &'a str {
        match self {
            Self::Category => &gift.category,
            Self::Personality => gift
                .match_tags
                .first()
                .map(String::as_str)
                .unwrap_or(FALLBACK_PERSONALITY_LABEL),
            Self::PriceRange => &gift.price_range,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GiftGroup<'a> {
    pub label: String,
    pub gifts: Vec<&'a Gift>,
}

/// Groups in first-occurrence order. `None` yields a single "All Gifts" group.
pub fn group_saved(saved: &[Gift], group_by: Option<GroupBy>) -> Vec<GiftGroup<'_>> {
    let Some(group_by) = group_by else {
        return vec![GiftGroup {
            label: UNGROUPED_LABEL.to_string(),
            gifts: saved.iter().collect(),
        }];
    };

    let mut groups: Vec<GiftGroup<'_>> = Vec::new();
    for gift in saved {
        let key = group_by.key_for(gift);
        match groups.iter_mut().find(|g| g.label == key) {
            Some(group) => group.gifts.push(gift),
            None => groups.push(GiftGroup {
                label: key.to_string(),
                gifts: vec![gift],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::{
        GroupBy, Toggle, group_saved, is_saved, remove_all, remove_gift, save_gift, toggle_gift,
    };
    use crate::gift::{Gift, sample_gift};

    fn ids(gifts: &[Gift]) -> Vec<u64> {
        gifts.iter().map(|g| g.id).collect()
    }

    #[test]
    fn save_twice_keeps_one_copy() {
        let gift = sample_gift(7, "Tech", 20.0, &[]);
        let mut saved = vec![];
        assert!(save_gift(&mut saved, &gift));
        assert!(!save_gift(&mut saved, &gift));
        assert_eq!(ids(&saved), vec![7]);
    }

    #[test]
    fn removing_absent_id_is_noop() {
        let mut saved = vec![sample_gift(1, "Tech", 20.0, &[])];
        assert!(!remove_gift(&mut saved, 99));
        assert_eq!(ids(&saved), vec![1]);
    }

    #[test]
    fn remove_all_clears_duplicates_too() {
        let gift = sample_gift(1, "Tech", 20.0, &[]);
        let mut saved = vec![
            gift.clone(),
            sample_gift(2, "Books", 10.0, &[]),
            gift,
        ];
        assert_eq!(remove_all(&mut saved), 3);
        assert!(saved.is_empty());
    }

    #[test]
    fn toggle_flips_saved_state() {
        let gift = sample_gift(3, "Tech", 20.0, &[]);
        let mut saved = vec![];
        assert_eq!(toggle_gift(&mut saved, &gift), Toggle::Saved);
        assert!(is_saved(&saved, 3));
        assert_eq!(toggle_gift(&mut saved, &gift), Toggle::Removed);
        assert!(!is_saved(&saved, 3));
    }

    #[test]
    fn grouping_keys() {
        let mut a = sample_gift(1, "Tech", 20.0, &["techSavvy"]);
        a.price_range = "Under $25".to_string();
        let mut b = sample_gift(2, "Books", 30.0, &[]);
        b.price_range = "$25-$50".to_string();
        let mut c = sample_gift(3, "Tech", 22.0, &["bookworm"]);
        c.price_range = "Under $25".to_string();
        let saved = vec![a, b, c];

        let flat = group_saved(&saved, None);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].label, "All Gifts");
        assert_eq!(flat[0].gifts.len(), 3);

        let by_category = group_saved(&saved, Some(GroupBy::Category));
        let labels: Vec<&str> = by_category.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Tech", "Books"]);
        assert_eq!(by_category[0].gifts.len(), 2);

        let by_tag = group_saved(&saved, Some(GroupBy::Personality));
        let labels: Vec<&str> = by_tag.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["techSavvy", "Other", "bookworm"]);

        let by_price = group_saved(&saved, Some(GroupBy::PriceRange));
        let labels: Vec<&str> = by_price.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Under $25", "$25-$50"]);
    }
}
