//! Record filters: drop expressions and field transforms
//!
//! Filters run in declaration order. The first filter that drops a record
//! short-circuits the chain; a filter that changes the record marks it
//! modified, which the pipeline counts separately from drops.

mod expr;

pub use expr::ExpressionFilter;

use std::collections::BTreeSet;

use crate::models::Record;

/// Outcome of passing a record through a filter or a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Filtered {
    Kept(Record),
    Modified(Record),
    Dropped,
}

/// One configured filter stage.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Drop the record when the expression evaluates true.
    Drop(ExpressionFilter),
    /// Null out the named fields.
    Unset(UnsetFields),
}

impl Filter {
    pub fn apply(&self, record: Record) -> Filtered {
        match self {
            Filter::Drop(expr) => {
                if expr.matches(&record) {
                    Filtered::Dropped
                } else {
                    Filtered::Kept(record)
                }
            }
            Filter::Unset(unset) => unset.apply(record),
        }
    }
}

/// Transform that sets fields to their empty state. Fields the record does
/// not have are silently ignored; an empty field set is a pass-through.
#[derive(Debug, Clone, Default)]
pub struct UnsetFields {
    fields: BTreeSet<String>,
}

impl UnsetFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UnsetFields {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse comma-separated `--unset` arguments into one transform.
    pub fn parse(values: &[String]) -> Option<UnsetFields> {
        let fields: BTreeSet<String> = values
            .iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect();
        if fields.is_empty() {
            None
        } else {
            Some(UnsetFields { fields })
        }
    }

    fn apply(&self, mut record: Record) -> Filtered {
        if self.fields.is_empty() {
            return Filtered::Kept(record);
        }
        let mut touched = false;
        for field in &self.fields {
            touched |= record.unset_field(field);
        }
        if touched {
            Filtered::Modified(record)
        } else {
            Filtered::Kept(record)
        }
    }
}

/// Applies filters in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new(filters: Vec<Filter>) -> Self {
        FilterChain { filters }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(&self, record: Record) -> Filtered {
        let mut record = record;
        let mut modified = false;
        for filter in &self.filters {
            match filter.apply(record) {
                Filtered::Dropped => return Filtered::Dropped,
                Filtered::Modified(next) => {
                    modified = true;
                    record = next;
                }
                Filtered::Kept(next) => record = next,
            }
        }
        if modified {
            Filtered::Modified(record)
        } else {
            Filtered::Kept(record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Artist;

    fn artist(id: u64, name: &str) -> Record {
        Record::Artist(Artist {
            id,
            name: Some(name.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_drop_filter() {
        let filter = Filter::Drop(ExpressionFilter::parse("id == 1").unwrap());
        assert_eq!(filter.apply(artist(1, "A")), Filtered::Dropped);
        assert!(matches!(filter.apply(artist(2, "B")), Filtered::Kept(_)));
    }

    #[test]
    fn test_unset_marks_modified() {
        let unset = UnsetFields::new(["name"]);
        match unset.apply(artist(1, "A")) {
            Filtered::Modified(Record::Artist(a)) => assert_eq!(a.name, None),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_unset_unknown_field_is_kept() {
        let unset = UnsetFields::new(["nonexistent"]);
        assert!(matches!(unset.apply(artist(1, "A")), Filtered::Kept(_)));
    }

    #[test]
    fn test_unset_empty_set_is_passthrough() {
        let unset = UnsetFields::default();
        assert!(matches!(unset.apply(artist(1, "A")), Filtered::Kept(_)));
    }

    #[test]
    fn test_unset_is_idempotent() {
        let unset = UnsetFields::new(["name"]);
        let once = match unset.apply(artist(1, "A")) {
            Filtered::Modified(record) => record,
            other => panic!("unexpected outcome: {other:?}"),
        };
        let twice = match unset.apply(once.clone()) {
            // already-null fields still exist, so this counts as modified
            Filtered::Modified(record) => record,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(once, twice);
    }

    #[test]
    fn test_parse_unset() {
        let unset =
            UnsetFields::parse(&["name, profile".to_string(), "urls".to_string()]).unwrap();
        assert_eq!(unset.fields.len(), 3);
        assert!(UnsetFields::parse(&[]).is_none());
        assert!(UnsetFields::parse(&[" , ".to_string()]).is_none());
    }

    #[test]
    fn test_chain_short_circuits_on_drop() {
        let chain = FilterChain::new(vec![
            Filter::Drop(ExpressionFilter::parse("id == 1").unwrap()),
            Filter::Unset(UnsetFields::new(["name"])),
        ]);
        assert_eq!(chain.apply(artist(1, "A")), Filtered::Dropped);
        match chain.apply(artist(2, "B")) {
            Filtered::Modified(Record::Artist(a)) => assert_eq!(a.name, None),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_chain_is_flat_composition() {
        // chain([a, b, c]) behaves like chain([a]) then chain([b, c])
        let a = Filter::Drop(ExpressionFilter::parse("id == 1").unwrap());
        let b = Filter::Unset(UnsetFields::new(["name"]));
        let c = Filter::Drop(ExpressionFilter::parse("profile != null").unwrap());

        let flat = FilterChain::new(vec![a.clone(), b.clone(), c.clone()]);

        for record in [artist(1, "A"), artist(2, "B")] {
            let flat_result = flat.apply(record.clone());

            let rest = FilterChain::new(vec![b.clone(), c.clone()]);
            let staged = match FilterChain::new(vec![a.clone()]).apply(record) {
                Filtered::Dropped => Filtered::Dropped,
                Filtered::Modified(r) => match rest.apply(r) {
                    Filtered::Dropped => Filtered::Dropped,
                    Filtered::Kept(r) | Filtered::Modified(r) => Filtered::Modified(r),
                },
                Filtered::Kept(r) => rest.apply(r),
            };
            assert_eq!(flat_result, staged);
        }
    }
}
