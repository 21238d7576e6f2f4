use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    pub id: u64,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub category: String,

    pub price_range: String,

    pub price_value: f64,

    #[serde(default)]
    pub match_tags: Vec<String>,

    #[serde(default)]
    pub occasions: Vec<String>,

    #[serde(default)]
    pub moods: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Per-session badge; never part of a catalog entry's identity.
    #[serde(default)]
    pub recommended: bool,
}

/// Size of the placeholder image requested for a gift without artwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Card,
    Detail,
}

impl ImageSize {
    fn dimensions(self) -> &'static str {
        match self {
            Self::Card => "300x200",
            Self::Detail => "600x600",
        }
    }
}

impl Gift {
    pub fn image_url(&self, size: ImageSize) -> String {
        match self.image.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!(
                "https://source.unsplash.com/random/{}/?{},gift",
                size.dimensions(),
                self.category.to_lowercase()
            ),
        }
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|tag| self.match_tags.contains(tag))
    }

    pub fn suits_occasion(&self, occasion: &str) -> bool {
        self.occasions.iter().any(|o| o == occasion)
    }

    pub fn suits_mood(&self, mood: &str) -> bool {
        self.moods.iter().any(|m| m == mood)
    }

    /// Case-insensitive substring match over name, description, category and tags.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        if q.is_empty() {
            return true;
        }

        self.name.to_lowercase().contains(&q)
            || self.description.to_lowercase().contains(&q)
            || self.category.to_lowercase().contains(&q)
            || self
                .match_tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&q))
    }
}

/// Uppercases the first character, leaving the rest untouched.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
pub(crate) fn sample_gift(id: u64, category: &str, price_value: f64, tags: &[&str]) -> Gift {
    Gift {
        id,
        name: format!("Gift {id}"),
        description: format!("A {category} gift"),
        category: category.to_string(),
        price_range: "$0-$0".to_string(),
        price_value,
        match_tags: tags.iter().map(ToString::to_string).collect(),
        occasions: vec![],
        moods: vec![],
        image: None,
        recommended: false,
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageSize, capitalize, sample_gift};

    #[test]
    fn placeholder_image_uses_lowercased_category() {
        let gift = sample_gift(1, "Tech", 20.0, &["techSavvy"]);
        assert_eq!(
            gift.image_url(ImageSize::Card),
            "https://source.unsplash.com/random/300x200/?tech,gift"
        );

        let mut with_art = gift.clone();
        with_art.image = Some("https://img.example/1.png".to_string());
        assert_eq!(
            with_art.image_url(ImageSize::Detail),
            "https://img.example/1.png"
        );
    }

    #[test]
    fn query_matches_tags_case_insensitively() {
        let gift = sample_gift(2, "Books", 12.0, &["bookworm"]);
        assert!(gift.matches_query("BOOKW"));
        assert!(gift.matches_query(""));
        assert!(!gift.matches_query("kitchen"));
    }

    #[test]
    fn capitalize_first_letter_only() {
        assert_eq!(capitalize("babyShower"), "BabyShower");
        assert_eq!(capitalize(""), "");
    }
}
