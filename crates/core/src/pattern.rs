use serde::{Deserialize, Serialize};

/// A curated substring rule from the `known_receivers` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownPattern {
    pub id: i64,
    pub receiver_pattern: String,
    pub category: String,
    pub new_content: Option<String>,
}

impl KnownPattern {
    /// The pattern as it is compared against search text, or `None` when blank.
    pub fn needle(&self) -> Option<String> {
        let needle = self.receiver_pattern.trim().to_lowercase();
        (!needle.is_empty()).then_some(needle)
    }

    /// The replacement content, ignoring blank values.
    pub fn replacement(&self) -> Option<&str> {
        self.new_content
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPattern {
    pub receiver_pattern: String,
    pub category: String,
    pub new_content: Option<String>,
}

impl NewPattern {
    pub fn new(receiver_pattern: &str, category: &str) -> Self {
        NewPattern {
            receiver_pattern: receiver_pattern.trim().to_lowercase(),
            category: category.to_string(),
            new_content: None,
        }
    }

    pub fn with_new_content(mut self, new_content: &str) -> Self {
        self.new_content = Some(new_content.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str, new_content: Option<&str>) -> KnownPattern {
        KnownPattern {
            id: 1,
            receiver_pattern: p.to_string(),
            category: "Food".to_string(),
            new_content: new_content.map(str::to_string),
        }
    }

    #[test]
    fn needle_is_trimmed_and_lowercased() {
        assert_eq!(pattern("  GrabFood ", None).needle().as_deref(), Some("grabfood"));
        assert_eq!(pattern("   ", None).needle(), None);
    }

    #[test]
    fn blank_replacement_is_ignored() {
        assert_eq!(pattern("grab", Some("")).replacement(), None);
        assert_eq!(pattern("grab", Some("Grab ride")).replacement(), Some("Grab ride"));
    }

    #[test]
    fn new_pattern_normalizes_text() {
        let p = NewPattern::new(" Shopee ", "Shopping").with_new_content("Shopee order");
        assert_eq!(p.receiver_pattern, "shopee");
        assert_eq!(p.new_content.as_deref(), Some("Shopee order"));
    }
}
