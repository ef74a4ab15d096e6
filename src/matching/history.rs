use crate::core::types::{CharacterId, Selection};

/// Choices made in a multi-access session, in the order they were made.
///
/// The history is the source of truth for the candidate set: replaying it from the
/// full taxon set must always reproduce the current candidates. A character chosen
/// twice has two entries; the later one is its current selection, and both still
/// constrain the candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionHistory {
    entries: Vec<(CharacterId, Selection)>,
}

impl SelectionHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a selection. Returns the character's previous selection, if any.
    pub fn record(&mut self, character: CharacterId, selection: Selection) -> Option<Selection> {
        let previous = self.get(&character).cloned();
        self.entries.push((character, selection));
        previous
    }

    /// Remove the most recently inserted entry
    pub fn pop(&mut self) -> Option<(CharacterId, Selection)> {
        self.entries.pop()
    }

    #[must_use]
    pub fn contains(&self, character: &CharacterId) -> bool {
        self.get(character).is_some()
    }

    /// The most recent selection for `character`
    #[must_use]
    pub fn get(&self, character: &CharacterId) -> Option<&Selection> {
        self.entries
            .iter()
            .rfind(|(c, _)| c == character)
            .map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(CharacterId, Selection)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StateId;

    fn state(id: &str) -> Selection {
        Selection::State(StateId::new(id))
    }

    #[test]
    fn test_insertion_order() {
        let mut history = SelectionHistory::new();
        history.record(CharacterId::new("9"), state("90"));
        history.record(CharacterId::new("1"), Selection::Numeric(4.5));
        let order: Vec<_> = history.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(order, vec!["9", "1"]);
    }

    #[test]
    fn test_reselect_appends() {
        let mut history = SelectionHistory::new();
        history.record(CharacterId::new("a"), state("1"));
        history.record(CharacterId::new("b"), state("2"));
        let previous = history.record(CharacterId::new("a"), state("3"));
        assert_eq!(previous, Some(state("1")));
        assert_eq!(history.len(), 3);
        assert_eq!(history.get(&CharacterId::new("a")), Some(&state("3")));

        // Undoing the re-selection restores the earlier one
        assert_eq!(history.pop(), Some((CharacterId::new("a"), state("3"))));
        assert_eq!(history.get(&CharacterId::new("a")), Some(&state("1")));
    }

    #[test]
    fn test_pop_empty() {
        let mut history = SelectionHistory::new();
        assert_eq!(history.pop(), None);
        assert!(history.is_empty());
    }
}
