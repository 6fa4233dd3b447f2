use crate::error::{LensError, LensResult};
use std::collections::BTreeSet;

/// The validated split of a `lens_fields` request.
///
/// `fields` are names the collection knows as columns; `relations` are the
/// remaining names, each confirmed to be a declared relation. Both keep the
/// request order and drop repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LensSpec {
    pub fields: Vec<String>,
    pub relations: Vec<String>,
}

impl LensSpec {
    /// Partitions `requested` against `known` columns.
    ///
    /// A name that is not a column must satisfy `supports`, otherwise the
    /// whole request fails with [`LensError::UnsupportedRelation`].
    pub fn resolve<F>(
        collection: &str,
        requested: &[String],
        known: &BTreeSet<String>,
        supports: F,
    ) -> LensResult<Self>
    where
        F: Fn(&str) -> bool,
    {
        let mut spec = LensSpec::default();
        for name in requested {
            if known.contains(name) {
                if !spec.fields.contains(name) {
                    spec.fields.push(name.clone());
                }
                continue;
            }
            if !supports(name) {
                return Err(LensError::UnsupportedRelation {
                    collection: collection.to_string(),
                    relation: name.clone(),
                });
            }
            if !spec.relations.contains(name) {
                spec.relations.push(name.clone());
            }
        }
        Ok(spec)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.relations.is_empty()
    }
}
