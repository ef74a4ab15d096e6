use serde::Serialize;
use std::collections::BTreeSet;

use crate::catalog::matrix::is_wildcard;
use crate::catalog::multi_access::MultiAccessKey;
use crate::core::character::{Character, State};
use crate::core::taxon::Taxon;
use crate::core::types::{CharacterId, Narrowing, Selection, StateId, TaxonId};
use crate::matching::history::SelectionHistory;

/// Default number of taxa shown in a remaining-taxa preview
pub const DEFAULT_PREVIEW_LIMIT: usize = 25;

/// Configuration for the candidate engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Preview size used by [`CandidateEngine::preview`]
    pub preview_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }
}

/// A taxon as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonPreview {
    pub id: TaxonId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&Taxon> for TaxonPreview {
    fn from(taxon: &Taxon) -> Self {
        Self {
            id: taxon.id.clone(),
            name: taxon.name.clone(),
            url: taxon.url.clone(),
        }
    }
}

/// Remaining candidates: the total and an alphabetical sample
#[derive(Debug, Clone, Serialize)]
pub struct RemainingTaxa {
    pub total: usize,
    pub sample: Vec<TaxonPreview>,
}

/// One recorded selection, resolved for display
#[derive(Debug, Clone, Serialize)]
pub struct SelectionView {
    pub character: CharacterId,
    pub character_name: String,
    pub selection: Selection,
    /// State name, or the observed value
    pub value: String,
}

/// A selection removed by [`CandidateEngine::undo_last`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Undone {
    pub character: CharacterId,
    pub selection: Selection,
}

/// Where a session stands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Every taxon has been eliminated
    NoMatch,
    /// Exactly one taxon remains
    Identified { taxon: TaxonPreview },
    /// More than one taxon remains
    Candidates { count: usize },
}

/// Eliminated taxa out of all scored taxa
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub eliminated: usize,
    pub total: usize,
    pub fraction: f64,
}

/// Narrows the taxa of a multi-access key as characters are observed.
///
/// The engine borrows its key, so many sessions can share one loaded catalog. All
/// state is local: the live candidate set, the cumulative eliminated set, and the
/// selection history the candidate set is derived from.
pub struct CandidateEngine<'a> {
    key: &'a MultiAccessKey,
    config: EngineConfig,

    /// Taxon indices still consistent with every selection
    candidates: BTreeSet<usize>,

    /// Taxon indices removed since the last reset
    eliminated: BTreeSet<usize>,

    history: SelectionHistory,
}

impl<'a> CandidateEngine<'a> {
    /// Create a new engine with default configuration
    #[must_use]
    pub fn new(key: &'a MultiAccessKey) -> Self {
        Self::with_config(key, EngineConfig::default())
    }

    /// Create a new engine with custom configuration
    #[must_use]
    pub fn with_config(key: &'a MultiAccessKey, config: EngineConfig) -> Self {
        let mut engine = Self {
            key,
            config,
            candidates: BTreeSet::new(),
            eliminated: BTreeSet::new(),
            history: SelectionHistory::new(),
        };
        engine.reset();
        engine
    }

    #[must_use]
    pub fn key(&self) -> &'a MultiAccessKey {
        self.key
    }

    /// Start over: every scored taxon is a candidate and nothing is selected
    pub fn reset(&mut self) {
        self.candidates = self.key.scores().scored_taxa().collect();
        self.eliminated.clear();
        self.history.clear();
        tracing::debug!(
            "Session reset on {}: {} candidates",
            self.key.id,
            self.candidates.len()
        );
    }

    /// Characters that would split the remaining candidates, discrete before numeric
    /// and then by name. Grouping characters and characters already selected are
    /// never included.
    #[must_use]
    pub fn relevant_characters(&self) -> Vec<&'a Character> {
        let key = self.key;
        let mut relevant: Vec<&'a Character> = key
            .characters()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind.is_askable() && !self.history.contains(&c.id))
            .filter(|&(column, _)| {
                key.scores()
                    .distinct_codes(self.candidates.iter().copied(), column)
                    .len()
                    > 1
            })
            .map(|(_, c)| c)
            .collect();
        relevant.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        relevant
    }

    /// States of a character in position order
    #[must_use]
    pub fn states_of(&self, character: &CharacterId) -> Vec<&'a State> {
        self.key.states_of(character)
    }

    /// Keep the candidates whose code for `character` is the position of `state`, or a
    /// wildcard. Unknown characters and states leave everything unchanged.
    pub fn choose_state(&mut self, character: &CharacterId, state: &StateId) -> Narrowing {
        if self.key.state_position(character, state).is_none() {
            tracing::debug!("State {state} does not belong to character {character}; ignored");
            return Narrowing::unchanged(self.candidates.len());
        }
        self.select(character, Selection::State(state.clone()))
    }

    /// Keep the candidates whose measured range for `character` contains `value`.
    /// Unknown characters and non-finite values leave everything unchanged.
    pub fn choose_numeric(&mut self, character: &CharacterId, value: f64) -> Narrowing {
        if self.key.column(character).is_none() || !value.is_finite() {
            tracing::debug!("Numeric value {value} for character {character} ignored");
            return Narrowing::unchanged(self.candidates.len());
        }
        self.select(character, Selection::Numeric(value))
    }

    /// Apply any selection
    pub fn choose(&mut self, character: &CharacterId, selection: &Selection) -> Narrowing {
        match selection {
            Selection::State(state) => self.choose_state(character, state),
            Selection::Numeric(value) => self.choose_numeric(character, *value),
        }
    }

    fn select(&mut self, character: &CharacterId, selection: Selection) -> Narrowing {
        // A re-selection further filters the current candidates; the earlier choice
        // stays in the history so a replay reaches the same set
        if let Some(previous) = self.history.record(character.clone(), selection.clone()) {
            tracing::debug!("{character} re-selected (was {previous})");
        }
        let narrowing = self.narrow(character, &selection);

        tracing::debug!(
            "{} = {}: eliminated {}, {} remaining",
            character,
            selection,
            narrowing.eliminated,
            narrowing.remaining
        );
        narrowing
    }

    /// Filter the candidate set by one selection, without touching the history
    fn narrow(&mut self, character: &CharacterId, selection: &Selection) -> Narrowing {
        let key = self.key;
        let Some(column) = key.column(character) else {
            return Narrowing::unchanged(self.candidates.len());
        };

        let keep = |taxon: usize| -> bool {
            match selection {
                Selection::State(state) => {
                    let Some(position) = key
                        .state_position(character, state)
                        .and_then(|p| i32::try_from(p).ok())
                    else {
                        return false;
                    };
                    key.scores()
                        .code(taxon, column)
                        .is_some_and(|code| code == position || is_wildcard(code))
                }
                Selection::Numeric(value) => key
                    .measures()
                    .range(column, taxon)
                    .is_some_and(|range| range.contains(*value)),
            }
        };

        let (kept, removed): (BTreeSet<usize>, BTreeSet<usize>) =
            self.candidates.iter().partition(|&&taxon| keep(taxon));
        let eliminated = removed.len();
        self.eliminated.extend(removed);
        self.candidates = kept;

        Narrowing {
            eliminated,
            remaining: self.candidates.len(),
        }
    }

    /// Rebuild the candidate set from the full taxon set by applying the history in order
    fn replay(&mut self) {
        self.candidates = self.key.scores().scored_taxa().collect();
        self.eliminated.clear();
        let entries: Vec<(CharacterId, Selection)> = self.history.iter().cloned().collect();
        for (character, selection) in &entries {
            self.narrow(character, selection);
        }
    }

    /// Remove the most recent selection and recompute the candidates from the rest
    pub fn undo_last(&mut self) -> Option<Undone> {
        let (character, selection) = self.history.pop()?;
        self.replay();
        tracing::debug!(
            "Undid {character} = {selection}: {} remaining",
            self.candidates.len()
        );
        Some(Undone {
            character,
            selection,
        })
    }

    /// Total remaining and up to `limit` of them, sorted by name
    #[must_use]
    pub fn remaining_taxa(&self, limit: usize) -> RemainingTaxa {
        let mut taxa: Vec<&Taxon> = self
            .candidates
            .iter()
            .filter_map(|&i| self.key.taxon(i))
            .collect();
        taxa.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        RemainingTaxa {
            total: self.candidates.len(),
            sample: taxa.into_iter().take(limit).map(TaxonPreview::from).collect(),
        }
    }

    /// [`CandidateEngine::remaining_taxa`] with the configured preview limit
    #[must_use]
    pub fn preview(&self) -> RemainingTaxa {
        self.remaining_taxa(self.config.preview_limit)
    }

    /// Selections in the order they were made
    #[must_use]
    pub fn selections(&self) -> Vec<SelectionView> {
        self.history
            .iter()
            .map(|(character, selection)| {
                let value = match selection {
                    Selection::State(state) => self
                        .key
                        .state(state)
                        .map_or_else(|| format!("State {state}"), |s| s.name.clone()),
                    Selection::Numeric(value) => value.to_string(),
                };
                SelectionView {
                    character: character.clone(),
                    character_name: self.key.character_display_name(character),
                    selection: selection.clone(),
                    value,
                }
            })
            .collect()
    }

    #[must_use]
    pub fn history(&self) -> &SelectionHistory {
        &self.history
    }

    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn is_candidate(&self, taxon: &TaxonId) -> bool {
        self.key
            .taxon_index(taxon)
            .is_some_and(|i| self.candidates.contains(&i))
    }

    /// Candidate taxon ids in taxon order
    #[must_use]
    pub fn candidate_ids(&self) -> Vec<&'a TaxonId> {
        let key = self.key;
        self.candidates
            .iter()
            .filter_map(|&i| key.taxon(i).map(|t| &t.id))
            .collect()
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        let mut remaining = self.candidates.iter();
        match (remaining.next(), remaining.next()) {
            (None, _) => Outcome::NoMatch,
            (Some(&only), None) => match self.key.taxon(only) {
                Some(taxon) => Outcome::Identified {
                    taxon: TaxonPreview::from(taxon),
                },
                None => Outcome::NoMatch,
            },
            _ => Outcome::Candidates {
                count: self.candidates.len(),
            },
        }
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        let total = self.candidates.len() + self.eliminated.len();
        #[allow(clippy::cast_precision_loss)]
        let fraction = if total == 0 {
            0.0
        } else {
            self.eliminated.len() as f64 / total as f64
        };
        Progress {
            eliminated: self.eliminated.len(),
            total,
            fraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::KeyId;
    use crate::parsing::lucid::parse_key_text;

    /// Three taxa scored on one discrete character, plus a numeric character
    fn key() -> MultiAccessKey {
        let raw = parse_key_text(
            r#"{"features": [
                    {"id": "c", "name": "Corolla", "type": 1},
                    {"id": "n", "name": "Length", "type": 2},
                    {"id": "g", "name": "Flower", "type": 0},
                    {"id": "b", "name": "Bract", "type": 1}
                ],
                "states": [
                    {"id": "c0", "feature": "c", "name": "white"},
                    {"id": "c1", "feature": "c", "name": "yellow"},
                    {"id": "b0", "feature": "b", "name": "absent"},
                    {"id": "b1", "feature": "b", "name": "present"}
                ],
                "entities": [
                    {"id": "t0", "name": "Alpha"},
                    {"id": "t1", "name": "Beta"},
                    {"id": "t2", "name": "Gamma"},
                    {"id": "t3", "name": "Unscored"}
                ],
                "decompressedScores": {
                    "t0": [0, 0, 0, 0],
                    "t1": [1, 1, 1, 0],
                    "t2": [2, 0, 0, 1]
                },
                "decompressedMeasures": {"n": {"t0": [null, 5, 10], "t1": [null, 12, 20]}}
            }"#,
        )
        .unwrap();
        MultiAccessKey::from_raw(KeyId::new("test"), raw).unwrap()
    }

    fn ids(engine: &CandidateEngine) -> Vec<String> {
        engine.candidate_ids().iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_reset_excludes_unscored_taxa() {
        let key = key();
        let engine = CandidateEngine::new(&key);
        assert_eq!(ids(&engine), vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn test_choose_state_keeps_wildcards() {
        let key = key();
        let mut engine = CandidateEngine::new(&key);
        let result = engine.choose_state(&CharacterId::new("c"), &StateId::new("c0"));
        assert_eq!(
            result,
            Narrowing {
                eliminated: 1,
                remaining: 2
            }
        );
        assert_eq!(ids(&engine), vec!["t0", "t2"]);
    }

    #[test]
    fn test_choose_numeric_range() {
        let key = key();
        let length = CharacterId::new("n");

        let mut engine = CandidateEngine::new(&key);
        engine.choose_numeric(&length, 7.0);
        assert_eq!(ids(&engine), vec!["t0"]);

        // Taxa without a measurement are eliminated too
        let mut engine = CandidateEngine::new(&key);
        let result = engine.choose_numeric(&length, 12.0);
        assert_eq!(result.eliminated, 2);
        assert_eq!(ids(&engine), vec!["t1"]);
    }

    #[test]
    fn test_unknown_references_are_no_ops() {
        let key = key();
        let mut engine = CandidateEngine::new(&key);
        let unchanged = Narrowing::unchanged(3);
        assert_eq!(
            engine.choose_state(&CharacterId::new("zz"), &StateId::new("c0")),
            unchanged
        );
        assert_eq!(
            engine.choose_state(&CharacterId::new("c"), &StateId::new("b0")),
            unchanged
        );
        assert_eq!(engine.choose_numeric(&CharacterId::new("zz"), 1.0), unchanged);
        assert_eq!(
            engine.choose_numeric(&CharacterId::new("n"), f64::NAN),
            unchanged
        );
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_relevant_characters_order_and_exclusions() {
        let key = key();
        let mut engine = CandidateEngine::new(&key);
        let names: Vec<_> = engine
            .relevant_characters()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        // Discrete first, by name; grouping never offered
        assert_eq!(names, vec!["Bract", "Corolla", "Length"]);

        engine.choose_state(&CharacterId::new("b"), &StateId::new("b0"));
        let names: Vec<_> = engine
            .relevant_characters()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Corolla", "Length"]);

        engine.choose_state(&CharacterId::new("c"), &StateId::new("c0"));
        assert!(engine.relevant_characters().is_empty());
        assert!(matches!(engine.outcome(), Outcome::Identified { .. }));
    }

    #[test]
    fn test_undo_replays_history() {
        let key = key();
        let mut engine = CandidateEngine::new(&key);
        assert_eq!(engine.undo_last(), None);
        assert_eq!(engine.candidate_count(), 3);

        engine.choose_state(&CharacterId::new("b"), &StateId::new("b0"));
        engine.choose_state(&CharacterId::new("c"), &StateId::new("c1"));
        assert_eq!(ids(&engine), vec!["t1"]);

        let undone = engine.undo_last().unwrap();
        assert_eq!(undone.character, CharacterId::new("c"));
        assert_eq!(ids(&engine), vec!["t0", "t1"]);
        assert_eq!(engine.progress().eliminated, 1);
    }

    #[test]
    fn test_reselect_narrows_current_candidates() {
        let key = key();
        let corolla = CharacterId::new("c");
        let mut engine = CandidateEngine::new(&key);
        engine.choose_state(&corolla, &StateId::new("c1"));
        assert_eq!(ids(&engine), vec!["t1", "t2"]);

        // t1 is yellow and goes; t0 was already gone and stays gone
        let result = engine.choose_state(&corolla, &StateId::new("c0"));
        assert_eq!(
            result,
            Narrowing {
                eliminated: 1,
                remaining: 1
            }
        );
        assert_eq!(ids(&engine), vec!["t2"]);
        assert_eq!(engine.history().len(), 2);
        assert_eq!(
            engine.history().get(&corolla),
            Some(&Selection::State(StateId::new("c0")))
        );

        engine.undo_last();
        assert_eq!(ids(&engine), vec!["t1", "t2"]);
    }

    #[test]
    fn test_remaining_taxa_and_selections() {
        let key = key();
        let mut engine = CandidateEngine::new(&key);
        engine.choose_numeric(&CharacterId::new("n"), 15.5);
        engine.reset();
        engine.choose_state(&CharacterId::new("c"), &StateId::new("c0"));

        let remaining = engine.remaining_taxa(1);
        assert_eq!(remaining.total, 2);
        assert_eq!(remaining.sample.len(), 1);
        assert_eq!(remaining.sample[0].name, "Alpha");

        let selections = engine.selections();
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].character_name, "Corolla");
        assert_eq!(selections[0].value, "white");
    }

    #[test]
    fn test_no_match_outcome() {
        let key = key();
        let mut engine = CandidateEngine::new(&key);
        engine.choose_numeric(&CharacterId::new("n"), 100.0);
        assert_eq!(engine.outcome(), Outcome::NoMatch);
        let progress = engine.progress();
        assert_eq!(progress.eliminated, 3);
        assert!((progress.fraction - 1.0).abs() < f64::EPSILON);
    }
}
