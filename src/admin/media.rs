use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Script and stylesheet assets a screen or inline needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub js: Vec<String>,
    #[serde(default)]
    pub css: Vec<String>,
}

impl Media {
    pub fn new(js: &[&str], css: &[&str]) -> Self {
        Self {
            js: js.iter().map(|s| s.to_string()).collect(),
            css: css.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Combine two asset lists keeping first occurrences in order
    pub fn merge(&self, other: &Media) -> Media {
        Media {
            js: self.js.iter().chain(other.js.iter()).unique().cloned().collect(),
            css: self.css.iter().chain(other.css.iter()).unique().cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.js.is_empty() && self.css.is_empty()
    }
}

impl std::ops::Add for Media {
    type Output = Media;

    fn add(self, other: Media) -> Media {
        self.merge(&other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_order_and_drops_duplicates() {
        let screen = Media::new(&["core.js", "actions.js"], &["base.css"]);
        let inline = Media::new(&["core.js", "inlines.js"], &["base.css", "forms.css"]);

        let merged = screen + inline;
        assert_eq!(merged.js, vec!["core.js", "actions.js", "inlines.js"]);
        assert_eq!(merged.css, vec!["base.css", "forms.css"]);
    }
}
