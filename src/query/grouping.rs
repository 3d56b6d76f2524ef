//! Bucketing of query results into named groups.
//!
//! A grouping function maps one attribute value to a bucket name plus an
//! optional filter that reproduces the bucket's membership. Buckets are
//! accumulated into a name-sorted map while folding a result set or a
//! value-distribution query.

use crate::query::filter::{escape_like, AttributeRef, Filter, LIKE_ESCAPE_CHAR};
use std::collections::BTreeMap;

pub const EMPTY_GROUP_NAME: &str = "<empty>";
pub const MISC_GROUP_NAME: &str = "#";

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    /// Additional filter reproducing this bucket's members; `None` for
    /// buckets that cannot be re-queried (e.g. empty values).
    pub filter: Option<Filter>,
}

/// One result bucket with its member count.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItemGroup {
    pub name: String,
    pub count: i64,
    pub filter: Option<Filter>,
}

pub trait GroupingFunction {
    fn group(&self, value: &str) -> Group;

    /// Fold (value, count) pairs into name-sorted buckets. NULL values are
    /// folded like empty strings.
    fn accumulate<'a>(
        &self,
        values: impl IntoIterator<Item = (Option<&'a str>, i64)>,
    ) -> Vec<MediaItemGroup> {
        let mut buckets: BTreeMap<String, MediaItemGroup> = BTreeMap::new();
        for (value, count) in values {
            let group = self.group(value.unwrap_or(""));
            buckets
                .entry(group.name.clone())
                .and_modify(|b| b.count += count)
                .or_insert(MediaItemGroup {
                    name: group.name,
                    count,
                    filter: group.filter,
                });
        }
        buckets.into_values().collect()
    }
}

/// Reference grouping policy: bucket by uppercased first character.
///
/// Alphanumeric ASCII leaders get their own `X*` bucket with a
/// case-insensitive prefix filter; whitespace-only values fall into a fixed
/// empty bucket; everything else (including accented letters) lands in the
/// misc bucket whose filter is the negation of all alphanumeric prefixes.
pub struct FirstCharacterGrouping {
    attr: AttributeRef,
}

impl FirstCharacterGrouping {
    pub fn new(attr: AttributeRef) -> Self {
        FirstCharacterGrouping { attr }
    }

    fn prefix_filter(&self, prefix: char) -> Filter {
        Filter::Like {
            attr: self.attr.clone(),
            pattern: format!("{}%", escape_like(&prefix.to_string(), LIKE_ESCAPE_CHAR)),
            escape: LIKE_ESCAPE_CHAR,
            case_sensitive: false,
        }
    }

    fn misc_filter(&self) -> Filter {
        let alphanumeric_prefixes = ('a'..='z')
            .chain('0'..='9')
            .map(|c| self.prefix_filter(c))
            .collect();
        Filter::not(Filter::Or(alphanumeric_prefixes))
    }
}

impl GroupingFunction for FirstCharacterGrouping {
    fn group(&self, value: &str) -> Group {
        let trimmed = value.trim();
        let Some(first) = trimmed.chars().next() else {
            return Group {
                name: EMPTY_GROUP_NAME.to_string(),
                filter: None,
            };
        };
        if first.is_ascii_alphanumeric() {
            Group {
                name: format!("{}*", first.to_ascii_uppercase()),
                filter: Some(self.prefix_filter(first.to_ascii_lowercase())),
            }
        } else {
            Group {
                name: MISC_GROUP_NAME.to_string(),
                filter: Some(self.misc_filter()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspect::AspectId;
    use uuid::Uuid;

    fn grouping() -> FirstCharacterGrouping {
        FirstCharacterGrouping::new(AttributeRef::new(
            AspectId(Uuid::from_u128(1)),
            "title",
        ))
    }

    #[test]
    fn reference_buckets() {
        let g = grouping();
        let buckets = g.accumulate(vec![
            (Some("Apple"), 1),
            (Some(""), 1),
            (Some("7up"), 1),
            (Some("éclair"), 1),
        ]);
        let names: Vec<(&str, i64)> = buckets
            .iter()
            .map(|b| (b.name.as_str(), b.count))
            .collect();
        assert_eq!(
            names,
            vec![("#", 1), ("7*", 1), ("<empty>", 1), ("A*", 1)]
        );
    }

    #[test]
    fn case_folds_into_one_bucket() {
        let g = grouping();
        let buckets = g.accumulate(vec![(Some("alpha"), 2), (Some("Arrow"), 3)]);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].name, "A*");
        assert_eq!(buckets[0].count, 5);
    }

    #[test]
    fn whitespace_only_is_empty_with_no_filter() {
        let group = grouping().group("   ");
        assert_eq!(group.name, EMPTY_GROUP_NAME);
        assert!(group.filter.is_none());
    }

    #[test]
    fn null_values_fold_as_empty() {
        let buckets = grouping().accumulate(vec![(None, 4)]);
        assert_eq!(buckets[0].name, EMPTY_GROUP_NAME);
        assert_eq!(buckets[0].count, 4);
    }

    #[test]
    fn alphanumeric_bucket_carries_prefix_filter() {
        let group = grouping().group("blade runner");
        assert_eq!(group.name, "B*");
        match group.filter {
            Some(Filter::Like { pattern, .. }) => assert_eq!(pattern, "b%"),
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn misc_bucket_negates_all_alphanumeric_prefixes() {
        let group = grouping().group("éclair");
        assert_eq!(group.name, MISC_GROUP_NAME);
        match group.filter {
            Some(Filter::Not(inner)) => match *inner {
                Filter::Or(children) => assert_eq!(children.len(), 36),
                other => panic!("unexpected inner {other:?}"),
            },
            other => panic!("unexpected filter {other:?}"),
        }
    }
}
