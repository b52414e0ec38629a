use crate::core_model::TopicId;
use std::collections::HashSet;

/// Claim changes needed to move an identity from its current claims to a
/// selected set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimDiff {
    /// In current, not selected. Order follows `current`.
    pub to_remove: Vec<TopicId>,
    /// In selected, not current. Order follows `selected`.
    pub to_add: Vec<TopicId>,
}

impl ClaimDiff {
    pub fn between(current: &[TopicId], selected: &[TopicId]) -> Self {
        let current_set: HashSet<_> = current.iter().copied().collect();
        let selected_set: HashSet<_> = selected.iter().copied().collect();

        let mut seen = HashSet::new();
        let to_remove = current
            .iter()
            .copied()
            .filter(|t| !selected_set.contains(t) && seen.insert(*t))
            .collect();

        let mut seen = HashSet::new();
        let to_add = selected
            .iter()
            .copied()
            .filter(|t| !current_set.contains(t) && seen.insert(*t))
            .collect();

        Self { to_remove, to_add }
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}
