//! Entity-set diffing for incremental updates
//!
//! Re-analysis produces a fresh entity set for a file. The differ compares
//! it with what the store holds by id: missing ids are deletions, new ids
//! are insertions, and ids present in both are overwritten only when
//! their property hash changed.

use std::collections::HashMap;

use onyx_core::Entity;

/// What one file's re-analysis changes.
#[derive(Debug, Default)]
pub struct EntityDiff {
    pub added: Vec<Entity>,
    pub removed_ids: Vec<String>,
    pub changed: Vec<Entity>,
    pub unchanged: usize,
}

impl EntityDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed_ids.is_empty() && self.changed.is_empty()
    }
}

/// Diff the prior entity set against a fresh parse.
pub fn diff_entities(prior: &[&Entity], fresh: &[Entity]) -> EntityDiff {
    let prior_hashes: HashMap<&str, u64> = prior
        .iter()
        .map(|e| (e.id.as_str(), e.property_hash()))
        .collect();
    let fresh_ids: HashMap<&str, ()> = fresh.iter().map(|e| (e.id.as_str(), ())).collect();

    let mut diff = EntityDiff::default();
    for entity in fresh {
        match prior_hashes.get(entity.id.as_str()) {
            None => diff.added.push(entity.clone()),
            Some(&hash) if hash != entity.property_hash() => diff.changed.push(entity.clone()),
            Some(_) => diff.unchanged += 1,
        }
    }
    for entity in prior {
        if !fresh_ids.contains_key(entity.id.as_str()) {
            diff.removed_ids.push(entity.id.clone());
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use onyx_core::{EntityKind, Language, Span};

    fn entity(name: &str, start: u32) -> Entity {
        Entity::new(
            EntityKind::Function,
            name,
            "a.go",
            Language::Go,
            Span::new(start, start + 2),
        )
    }

    #[test]
    fn detects_additions_removals_and_changes() {
        let foo = entity("Foo", 1);
        let mut bar_old = entity("Bar", 5);
        bar_old.set_property("complexity", "1");
        let prior: Vec<&Entity> = vec![&foo, &bar_old];

        let mut bar_new = entity("Bar", 5);
        bar_new.set_property("complexity", "4");
        let baz = entity("Baz", 9);
        let fresh = vec![bar_new, baz];

        let diff = diff_entities(&prior, &fresh);
        assert_eq!(diff.removed_ids, vec![foo.id.clone()]);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].name, "Baz");
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].name, "Bar");
        assert_eq!(diff.unchanged, 0);
    }

    #[test]
    fn identical_sets_are_a_noop() {
        let foo = entity("Foo", 1);
        let prior: Vec<&Entity> = vec![&foo];
        let diff = diff_entities(&prior, &[foo.clone()]);
        assert!(diff.is_empty());
        assert_eq!(diff.unchanged, 1);
    }
}
