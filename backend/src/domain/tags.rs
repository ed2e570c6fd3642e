//! Tag lists attached to announcements and opportunities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of tags kept on a single post.
pub const TAG_LIMIT: usize = 12;

/// Validation errors returned by [`TagList::try_new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagListError {
    /// More tags were supplied than [`TAG_LIMIT`] allows.
    TooManyTags {
        /// The configured limit.
        max: usize,
    },
}

impl fmt::Display for TagListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyTags { max } => write!(f, "at most {max} tags are allowed"),
        }
    }
}

impl std::error::Error for TagListError {}

/// Ordered list of at most [`TAG_LIMIT`] non-empty tags.
///
/// # Examples
/// ```
/// use campushub_backend::domain::TagList;
///
/// let tags = TagList::from_csv("exams, hostel, , academics");
/// assert_eq!(tags.as_slice(), ["exams", "hostel", "academics"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct TagList(Vec<String>);

impl TagList {
    /// Validate an explicit tag list.
    pub fn try_new(tags: Vec<String>) -> Result<Self, TagListError> {
        let tags: Vec<String> = tags
            .into_iter()
            .map(|tag| tag.trim().to_owned())
            .filter(|tag| !tag.is_empty())
            .collect();
        if tags.len() > TAG_LIMIT {
            return Err(TagListError::TooManyTags { max: TAG_LIMIT });
        }
        Ok(Self(tags))
    }

    /// Parse comma-separated form input the way the intake forms do:
    /// trim entries, drop empties, and truncate to the limit.
    pub fn from_csv(input: &str) -> Self {
        let tags = input
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .take(TAG_LIMIT)
            .map(str::to_owned)
            .collect();
        Self(tags)
    }

    /// The tags in input order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<TagList> for Vec<String> {
    fn from(value: TagList) -> Self {
        value.0
    }
}

impl TryFrom<Vec<String>> for TagList {
    type Error = TagListError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;

    #[test]
    fn csv_parsing_trims_and_truncates() {
        let input = (0..20).map(|i| format!("tag{i}")).collect::<Vec<_>>().join(",");
        let tags = TagList::from_csv(&input);
        assert_eq!(tags.as_slice().len(), TAG_LIMIT);
        assert_eq!(tags.as_slice()[0], "tag0");
    }

    #[test]
    fn explicit_lists_over_the_limit_are_rejected() {
        let tags: Vec<String> = (0..13).map(|i| format!("tag{i}")).collect();
        assert_eq!(
            TagList::try_new(tags),
            Err(TagListError::TooManyTags { max: TAG_LIMIT })
        );
    }

    #[test]
    fn blank_entries_are_dropped_before_the_limit_check() {
        let tags = TagList::try_new(vec![" ".to_owned(), "exams".to_owned()])
            .expect("blank entries do not count");
        assert_eq!(tags.as_slice(), ["exams"]);
    }
}
