use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::catalog::matrix::{MeasurementTable, ScoreMatrix};
use crate::catalog::store::{IssueLog, LoadIssue, SchemaViolation};
use crate::core::character::{Character, State};
use crate::core::taxon::Taxon;
use crate::core::types::{CharacterId, CharacterKind, KeyId, StateId, TaxonId};
use crate::parsing::codec::{decode_measures, decode_scores};
use crate::parsing::lucid::{RawEntity, RawFeature, RawMultiAccessKey, RawState};
use crate::parsing::RawId;
use crate::utils::validation::check_record_limit;

/// Listing entry for a multi-access key
#[derive(Debug, Clone, Serialize)]
pub struct MultiKeySummary {
    pub id: KeyId,
    pub title: String,
    pub taxa: usize,
    pub characters: usize,
}

/// Character counts by kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct KindCounts {
    pub grouping: usize,
    pub discrete: usize,
    pub numeric: usize,
}

/// Structure summary of a multi-access key
#[derive(Debug, Clone, Serialize)]
pub struct KeyAnalysis {
    pub id: KeyId,
    pub title: String,
    pub entities: usize,
    pub scored_entities: usize,
    pub features: usize,
    pub features_by_kind: KindCounts,
    pub states: usize,
    pub measured_characters: usize,
    pub warnings: Vec<String>,
}

/// A validated multi-access key: characters, states, taxa and their decoded matrices,
/// indexed for constant-time lookup by identifier.
#[derive(Debug, Clone)]
pub struct MultiAccessKey {
    pub id: KeyId,
    pub title: String,

    /// Characters in declaration order; the index is the score matrix column
    characters: Vec<Character>,
    states: Vec<State>,
    taxa: Vec<Taxon>,

    scores: ScoreMatrix,
    measures: MeasurementTable,

    /// Index: character ID -> column
    character_index: HashMap<CharacterId, usize>,

    /// Index: state ID -> index in states vec
    state_index: HashMap<StateId, usize>,

    /// Index: column -> indices of that character's states, by position
    states_by_column: Vec<Vec<usize>>,

    /// Index: taxon ID -> index in taxa vec
    taxon_index: HashMap<TaxonId, usize>,

    warnings: Vec<LoadIssue>,
}

impl MultiAccessKey {
    /// Validate and index a raw key.
    ///
    /// Cells that fail to decode and records that refer to unknown entities are
    /// quarantined and reported through [`MultiAccessKey::warnings`].
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaViolation`] if the key has no characters, a character has a
    /// blank or duplicate id, or the key exceeds the record limit.
    pub fn from_raw(id: KeyId, raw: RawMultiAccessKey) -> Result<Self, SchemaViolation> {
        let mut log = IssueLog::new(&id);

        let (characters, character_index) = index_characters(&id, raw.features, &mut log)?;
        let (states, state_index, states_by_column) =
            index_states(raw.states, &character_index, characters.len(), &mut log);
        let (taxa, taxon_index) = index_taxa(&id, raw.entities, &mut log)?;

        let scores = match raw.decompressed_scores {
            Some(decoded) => decoded_score_rows(decoded, &taxon_index, &mut log),
            None => compressed_score_rows(raw.scores, &taxon_index, &mut log),
        };
        let measures = match raw.decompressed_measures {
            Some(decoded) => decoded_measures(decoded, &character_index, &taxon_index, &mut log),
            None => compressed_measures(raw.measures, &character_index, &taxon_index, &mut log),
        };

        let title = raw
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| id.to_string());

        let key = Self {
            id,
            title,
            characters,
            states,
            taxa,
            scores: ScoreMatrix::new(scores),
            measures,
            character_index,
            state_index,
            states_by_column,
            taxon_index,
            warnings: log.into_issues(),
        };

        tracing::debug!(
            "Indexed multi-access key {}: {} taxa ({} scored), {} characters, {} states",
            key.id,
            key.taxa.len(),
            key.scores.scored_count(),
            key.characters.len(),
            key.states.len()
        );
        Ok(key)
    }

    #[must_use]
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    #[must_use]
    pub fn taxa(&self) -> &[Taxon] {
        &self.taxa
    }

    #[must_use]
    pub fn scores(&self) -> &ScoreMatrix {
        &self.scores
    }

    #[must_use]
    pub fn measures(&self) -> &MeasurementTable {
        &self.measures
    }

    /// Problems found while loading that did not prevent the key from being used
    #[must_use]
    pub fn warnings(&self) -> &[LoadIssue] {
        &self.warnings
    }

    #[must_use]
    pub fn character(&self, id: &CharacterId) -> Option<&Character> {
        self.column(id).map(|column| &self.characters[column])
    }

    /// Score matrix column of a character
    #[must_use]
    pub fn column(&self, id: &CharacterId) -> Option<usize> {
        self.character_index.get(id).copied()
    }

    #[must_use]
    pub fn state(&self, id: &StateId) -> Option<&State> {
        self.state_index.get(id).map(|&idx| &self.states[idx])
    }

    /// States of a character, in position order. Empty for unknown characters.
    #[must_use]
    pub fn states_of(&self, character: &CharacterId) -> Vec<&State> {
        self.column(character)
            .map(|column| {
                self.states_by_column[column]
                    .iter()
                    .map(|&idx| &self.states[idx])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Position of a state among its character's states, if the state belongs to it
    #[must_use]
    pub fn state_position(&self, character: &CharacterId, state: &StateId) -> Option<usize> {
        self.state(state)
            .filter(|s| &s.character == character)
            .map(|s| s.position)
    }

    #[must_use]
    pub fn taxon(&self, index: usize) -> Option<&Taxon> {
        self.taxa.get(index)
    }

    #[must_use]
    pub fn taxon_index(&self, id: &TaxonId) -> Option<usize> {
        self.taxon_index.get(id).copied()
    }

    /// Name to show for a character.
    ///
    /// Sub-characters are often recorded with an empty name or a bare unit under a
    /// named parent trait, so those are shown as `Parent (name)`, or as `Parent` alone
    /// when the two names say the same thing.
    #[must_use]
    pub fn character_display_name(&self, id: &CharacterId) -> String {
        let Some(character) = self.character(id) else {
            return format!("Character {id}");
        };
        let own = character.name.trim();
        let parent = character
            .parent
            .as_ref()
            .and_then(|p| self.character(p))
            .map(|p| p.name.trim())
            .filter(|name| !name.is_empty());

        match parent {
            Some(parent) if own.is_empty() => parent.to_string(),
            Some(parent) if character.kind == CharacterKind::Numeric => {
                let (own_lower, parent_lower) = (own.to_lowercase(), parent.to_lowercase());
                if own_lower == parent_lower || parent_lower.contains(&own_lower) {
                    parent.to_string()
                } else {
                    format!("{parent} ({own})")
                }
            }
            _ if own.is_empty() => format!("Character {id}"),
            _ => own.to_string(),
        }
    }

    #[must_use]
    pub fn summary(&self) -> MultiKeySummary {
        MultiKeySummary {
            id: self.id.clone(),
            title: self.title.clone(),
            taxa: self.taxa.len(),
            characters: self.characters.len(),
        }
    }

    #[must_use]
    pub fn analyze(&self) -> KeyAnalysis {
        let mut by_kind = KindCounts::default();
        for character in &self.characters {
            match character.kind {
                CharacterKind::Grouping => by_kind.grouping += 1,
                CharacterKind::Discrete => by_kind.discrete += 1,
                CharacterKind::Numeric => by_kind.numeric += 1,
            }
        }

        KeyAnalysis {
            id: self.id.clone(),
            title: self.title.clone(),
            entities: self.taxa.len(),
            scored_entities: self.scores.scored_count(),
            features: self.characters.len(),
            features_by_kind: by_kind,
            states: self.states.len(),
            measured_characters: self.measures.measured_columns().len(),
            warnings: self.warnings.iter().map(ToString::to_string).collect(),
        }
    }

    /// Convert back to a raw record with pre-decoded matrices, for export
    #[must_use]
    pub fn to_raw(&self) -> RawMultiAccessKey {
        let features = self
            .characters
            .iter()
            .map(|c| RawFeature {
                id: RawId::Str(c.id.to_string()),
                name: Some(c.name.clone()),
                kind: Some(c.kind.code()),
                parent: c.parent.as_ref().map(|p| RawId::Str(p.to_string())),
            })
            .collect();

        let states = self
            .states
            .iter()
            .map(|s| RawState {
                id: RawId::Str(s.id.to_string()),
                feature: RawId::Str(s.character.to_string()),
                name: Some(s.name.clone()),
            })
            .collect();

        let entities = self
            .taxa
            .iter()
            .map(|t| RawEntity {
                id: RawId::Str(t.id.to_string()),
                name: Some(t.name.clone()),
                title: None,
                url: t.url.clone(),
                text: None,
            })
            .collect();

        let scores = self
            .taxa
            .iter()
            .enumerate()
            .filter_map(|(i, t)| Some((t.id.to_string(), Some(self.scores.row(i)?.to_vec()))))
            .collect();

        let mut measures: BTreeMap<String, BTreeMap<String, Option<Vec<Option<f64>>>>> =
            BTreeMap::new();
        for column in self.measures.measured_columns() {
            let cells = measures
                .entry(self.characters[column].id.to_string())
                .or_default();
            for (taxon, values) in self.measures.column(column) {
                let values = values
                    .iter()
                    .map(|v| v.is_finite().then_some(*v))
                    .collect();
                cells.insert(self.taxa[taxon].id.to_string(), Some(values));
            }
        }

        RawMultiAccessKey {
            title: Some(self.title.clone()),
            features,
            states,
            entities,
            decompressed_scores: Some(scores),
            decompressed_measures: Some(measures),
            ..RawMultiAccessKey::default()
        }
    }
}

fn index_characters(
    key: &KeyId,
    features: Vec<RawFeature>,
    log: &mut IssueLog,
) -> Result<(Vec<Character>, HashMap<CharacterId, usize>), SchemaViolation> {
    if features.is_empty() {
        return Err(SchemaViolation::NoCharacters { key: key.clone() });
    }

    let mut characters = Vec::with_capacity(features.len());
    let mut index = HashMap::with_capacity(features.len());

    for (column, feature) in features.into_iter().enumerate() {
        if let Some(detail) = check_record_limit(characters.len()) {
            return Err(SchemaViolation::TooManyRecords {
                key: key.clone(),
                detail,
            });
        }

        // A blank id would shift every later column, so it cannot be quarantined
        let Some(id) = feature.id.normalized() else {
            return Err(SchemaViolation::MalformedRecord {
                key: key.clone(),
                detail: format!("feature at column {column} has a blank id"),
            });
        };

        let kind = match feature.kind {
            None => CharacterKind::Discrete,
            Some(code) => CharacterKind::from_code(code).unwrap_or_else(|| {
                log.push(LoadIssue::UnknownCharacterKind {
                    character: id.clone(),
                    code,
                });
                CharacterKind::Grouping
            }),
        };

        let mut character = Character::new(
            id.clone(),
            feature.name.unwrap_or_default().trim(),
            kind,
        );
        character.parent =
            crate::parsing::optional_id(feature.parent.as_ref()).map(CharacterId::new);

        if index.insert(character.id.clone(), column).is_some() {
            return Err(SchemaViolation::DuplicateCharacter {
                key: key.clone(),
                character: id,
            });
        }
        characters.push(character);
    }

    Ok((characters, index))
}

type StateIndexes = (Vec<State>, HashMap<StateId, usize>, Vec<Vec<usize>>);

fn index_states(
    raw_states: Vec<RawState>,
    character_index: &HashMap<CharacterId, usize>,
    columns: usize,
    log: &mut IssueLog,
) -> StateIndexes {
    let mut states = Vec::with_capacity(raw_states.len());
    let mut index = HashMap::with_capacity(raw_states.len());
    let mut by_column = vec![Vec::new(); columns];

    for raw in raw_states {
        let Some(id) = raw.id.normalized() else {
            log.push(LoadIssue::MalformedRecord {
                detail: "state with a blank id".to_string(),
            });
            continue;
        };
        let character = raw.feature.normalized().unwrap_or_default();
        let Some(&column) = character_index.get(&CharacterId::new(character.as_str())) else {
            log.push(LoadIssue::UnknownCharacter {
                character,
                context: format!("state {id}"),
            });
            continue;
        };
        let state_id = StateId::new(id.as_str());
        if index.contains_key(&state_id) {
            log.push(LoadIssue::DuplicateId {
                kind: "state",
                id,
            });
            continue;
        }

        let name = raw
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("State {id}"));
        let position = by_column[column].len();

        index.insert(state_id, states.len());
        by_column[column].push(states.len());
        states.push(State::new(id, character, name, position));
    }

    (states, index, by_column)
}

fn index_taxa(
    key: &KeyId,
    entities: Vec<RawEntity>,
    log: &mut IssueLog,
) -> Result<(Vec<Taxon>, HashMap<TaxonId, usize>), SchemaViolation> {
    let mut taxa = Vec::with_capacity(entities.len());
    let mut index = HashMap::with_capacity(entities.len());

    for entity in entities {
        if let Some(detail) = check_record_limit(taxa.len()) {
            return Err(SchemaViolation::TooManyRecords {
                key: key.clone(),
                detail,
            });
        }
        let Some(id) = entity.id.normalized() else {
            log.push(LoadIssue::MalformedRecord {
                detail: "entity with a blank id".to_string(),
            });
            continue;
        };
        let taxon_id = TaxonId::new(id.as_str());
        if index.contains_key(&taxon_id) {
            log.push(LoadIssue::DuplicateId {
                kind: "entity",
                id,
            });
            continue;
        }

        let mut taxon = Taxon::new(id.as_str(), entity.display_name(&id));
        taxon.url = entity.reference_url();
        index.insert(taxon_id, taxa.len());
        taxa.push(taxon);
    }

    Ok((taxa, index))
}

fn lookup_taxon(
    taxon_index: &HashMap<TaxonId, usize>,
    taxon: &str,
    context: &str,
    log: &mut IssueLog,
) -> Option<usize> {
    let found = taxon_index.get(&TaxonId::new(taxon.trim())).copied();
    if found.is_none() {
        log.push(LoadIssue::UnknownTaxon {
            taxon: taxon.to_string(),
            context: context.to_string(),
        });
    }
    found
}

fn lookup_column(
    character_index: &HashMap<CharacterId, usize>,
    character: &str,
    log: &mut IssueLog,
) -> Option<usize> {
    let found = character_index
        .get(&CharacterId::new(character.trim()))
        .copied();
    if found.is_none() {
        log.push(LoadIssue::UnknownCharacter {
            character: character.to_string(),
            context: "measurements".to_string(),
        });
    }
    found
}

fn decoded_score_rows(
    decoded: BTreeMap<String, Option<Vec<i32>>>,
    taxon_index: &HashMap<TaxonId, usize>,
    log: &mut IssueLog,
) -> Vec<Option<Vec<i32>>> {
    let mut rows = vec![None; taxon_index.len()];
    for (taxon, row) in decoded {
        let Some(idx) = lookup_taxon(taxon_index, &taxon, "score row", log) else {
            continue;
        };
        match row.filter(|r| !r.is_empty()) {
            Some(row) => rows[idx] = Some(row),
            None => log.push(LoadIssue::MissingScores { taxon }),
        }
    }
    rows
}

fn compressed_score_rows(
    payloads: BTreeMap<String, Option<String>>,
    taxon_index: &HashMap<TaxonId, usize>,
    log: &mut IssueLog,
) -> Vec<Option<Vec<i32>>> {
    let mut rows = vec![None; taxon_index.len()];
    for (taxon, payload) in payloads {
        let Some(idx) = lookup_taxon(taxon_index, &taxon, "score row", log) else {
            continue;
        };
        match payload.as_deref().map(decode_scores) {
            Some(Ok(row)) => rows[idx] = Some(row),
            Some(Err(e)) => log.push(LoadIssue::ScoreDecodeFailure {
                taxon,
                reason: e.to_string(),
            }),
            None => log.push(LoadIssue::MissingScores { taxon }),
        }
    }
    rows
}

fn decoded_measures(
    decoded: BTreeMap<String, BTreeMap<String, Option<Vec<Option<f64>>>>>,
    character_index: &HashMap<CharacterId, usize>,
    taxon_index: &HashMap<TaxonId, usize>,
    log: &mut IssueLog,
) -> MeasurementTable {
    let mut table = MeasurementTable::new();
    for (character, cells) in decoded {
        let Some(column) = lookup_column(character_index, &character, log) else {
            continue;
        };
        for (taxon, values) in cells {
            let Some(idx) = lookup_taxon(taxon_index, &taxon, "measurement", log) else {
                continue;
            };
            match values {
                Some(values) => table.insert(
                    column,
                    idx,
                    values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
                ),
                None => log.push(LoadIssue::MeasureDecodeFailure {
                    character: character.clone(),
                    taxon,
                    reason: "no decoded value".to_string(),
                }),
            }
        }
    }
    table
}

fn compressed_measures(
    payloads: BTreeMap<String, BTreeMap<String, Option<String>>>,
    character_index: &HashMap<CharacterId, usize>,
    taxon_index: &HashMap<TaxonId, usize>,
    log: &mut IssueLog,
) -> MeasurementTable {
    let mut table = MeasurementTable::new();
    for (character, cells) in payloads {
        let Some(column) = lookup_column(character_index, &character, log) else {
            continue;
        };
        for (taxon, payload) in cells {
            let Some(idx) = lookup_taxon(taxon_index, &taxon, "measurement", log) else {
                continue;
            };
            let decoded = payload
                .as_deref()
                .map(decode_measures)
                .unwrap_or(Err(crate::parsing::codec::CodecError::Empty));
            match decoded {
                Ok(values) => table.insert(column, idx, values),
                Err(e) => log.push(LoadIssue::MeasureDecodeFailure {
                    character: character.clone(),
                    taxon,
                    reason: e.to_string(),
                }),
            }
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::lucid::parse_key_text;

    fn sample() -> MultiAccessKey {
        let raw = parse_key_text(
            r#"{
            "title": "Wattles",
            "features": [
                {"id": 1, "name": "Habit", "type": 0},
                {"id": 2, "name": "Leaves", "type": 1, "parent": 1},
                {"id": 3, "name": "Phyllode length", "type": 2},
                {"id": 4, "name": "mm", "type": 2, "parent": 3},
                {"id": 5, "name": "", "type": 2, "parent": 3}
            ],
            "states": [
                {"id": 20, "feature": 2, "name": "bipinnate"},
                {"id": 21, "feature": 2, "name": "phyllodes"},
                {"id": 22, "feature": 99, "name": "orphan"},
                {"id": 20, "feature": 2, "name": "duplicate"}
            ],
            "entities": [
                {"id": 100, "name": "Acacia dealbata", "url": "https://example.org/a"},
                {"id": 101, "title": "Acacia melanoxylon"},
                {"id": 102}
            ],
            "decompressedScores": {"100": [0, 0, 0, 0, 0], "101": [0, 1, 0, 0, 0], "102": null, "999": [0]},
            "decompressedMeasures": {"3": {"100": [null, 5, 10]}, "8": {"100": [null, 1]}}
        }"#,
        )
        .unwrap();
        MultiAccessKey::from_raw(KeyId::new("wattles"), raw).unwrap()
    }

    #[test]
    fn test_indexes() {
        let key = sample();
        assert_eq!(key.title, "Wattles");
        assert_eq!(key.characters().len(), 5);
        assert_eq!(key.column(&CharacterId::new("3")), Some(2));
        assert_eq!(key.taxa().len(), 3);
        assert_eq!(key.taxon(2).unwrap().name, "Taxon 102");
        assert_eq!(key.taxon(1).unwrap().name, "Acacia melanoxylon");
        assert_eq!(key.taxon(0).unwrap().url.as_deref(), Some("https://example.org/a"));
    }

    #[test]
    fn test_state_positions_follow_declaration_order() {
        let key = sample();
        let leaves = CharacterId::new("2");
        let states = key.states_of(&leaves);
        assert_eq!(states.len(), 2);
        assert_eq!(key.state_position(&leaves, &StateId::new("21")), Some(1));
        assert_eq!(key.state_position(&CharacterId::new("3"), &StateId::new("21")), None);
        assert!(key.states_of(&CharacterId::new("404")).is_empty());
    }

    #[test]
    fn test_quarantine() {
        let key = sample();
        let warnings: Vec<String> = key.warnings().iter().map(ToString::to_string).collect();
        assert!(warnings.iter().any(|w| w.contains("99")), "{warnings:?}");
        assert!(warnings.iter().any(|w| w.contains("999")), "{warnings:?}");
        assert!(warnings.iter().any(|w| w.contains("102")), "{warnings:?}");
        assert!(warnings.iter().any(|w| w.contains("8")), "{warnings:?}");
        assert_eq!(key.scores().scored_count(), 2);
        assert!(!key.scores().is_scored(2));
    }

    #[test]
    fn test_character_display_names() {
        let key = sample();
        assert_eq!(key.character_display_name(&CharacterId::new("2")), "Leaves");
        assert_eq!(
            key.character_display_name(&CharacterId::new("4")),
            "Phyllode length (mm)"
        );
        assert_eq!(
            key.character_display_name(&CharacterId::new("5")),
            "Phyllode length"
        );
        assert_eq!(key.character_display_name(&CharacterId::new("77")), "Character 77");
    }

    #[test]
    fn test_analyze() {
        let analysis = sample().analyze();
        assert_eq!(analysis.entities, 3);
        assert_eq!(analysis.scored_entities, 2);
        assert_eq!(analysis.features_by_kind.grouping, 1);
        assert_eq!(analysis.features_by_kind.discrete, 1);
        assert_eq!(analysis.features_by_kind.numeric, 3);
        assert_eq!(analysis.states, 2);
        assert_eq!(analysis.measured_characters, 1);
    }

    #[test]
    fn test_compressed_scores_with_bad_cell() {
        let raw = parse_key_text(
            r#"{"features": [{"id": 1, "name": "A", "type": 1}, {"id": 2, "name": "B", "type": 1},
                {"id": 3, "name": "C", "type": 1}, {"id": 4, "name": "D", "type": 1}],
              "entities": [{"id": 1, "name": "good"}, {"id": 2, "name": "bad"}],
              "scores": {"1": "AwRgTMQ=", "2": "AwR!TMQ="}}"#,
        )
        .unwrap();
        let key = MultiAccessKey::from_raw(KeyId::new("k"), raw).unwrap();
        assert_eq!(key.scores().row(0), Some(&[0, 1, 2, 0][..]));
        assert!(!key.scores().is_scored(1));
        assert_eq!(key.warnings().len(), 1);
    }

    #[test]
    fn test_compressed_measures_with_bad_cell() {
        use crate::core::types::Narrowing;
        use crate::matching::engine::CandidateEngine;

        let raw = parse_key_text(
            r#"{"features": [{"id": "n", "name": "Length", "type": 2}],
              "entities": [{"id": "a", "name": "measured"}, {"id": "b", "name": "corrupt"}],
              "decompressedScores": {"a": [0], "b": [0]},
              "measures": {"n": {"a": "LYUwhgdgXArFCMAGIA==", "b": "LYU!hgdg"}}}"#,
        )
        .unwrap();
        let key = MultiAccessKey::from_raw(KeyId::new("k"), raw).unwrap();

        // "mean:5:10": the label decodes as NaN and is not part of the range
        let values = key.measures().values(0, 0).unwrap();
        assert!(values[0].is_nan());
        assert_eq!(&values[1..], &[5.0, 10.0]);
        assert_eq!(key.measures().values(0, 1), None);

        assert_eq!(key.warnings().len(), 1);
        assert!(matches!(
            &key.warnings()[0],
            LoadIssue::MeasureDecodeFailure { taxon, .. } if taxon == "b"
        ));

        let mut engine = CandidateEngine::new(&key);
        let result = engine.choose_numeric(&CharacterId::new("n"), 7.0);
        assert_eq!(
            result,
            Narrowing {
                eliminated: 1,
                remaining: 1
            }
        );
        assert!(engine.is_candidate(&TaxonId::new("a")));
    }

    #[test]
    fn test_no_characters_is_fatal() {
        let raw = parse_key_text(r#"{"features": [], "entities": [{"id": 1}]}"#).unwrap();
        assert!(matches!(
            MultiAccessKey::from_raw(KeyId::new("empty"), raw),
            Err(SchemaViolation::NoCharacters { .. })
        ));
    }

    #[test]
    fn test_duplicate_character_is_fatal() {
        let raw = parse_key_text(r#"{"features": [{"id": 1}, {"id": "1"}]}"#).unwrap();
        assert!(matches!(
            MultiAccessKey::from_raw(KeyId::new("dup"), raw),
            Err(SchemaViolation::DuplicateCharacter { .. })
        ));
    }

    #[test]
    fn test_to_raw_keeps_decoded_matrices() {
        let key = sample();
        let raw = key.to_raw();
        let rebuilt = MultiAccessKey::from_raw(key.id.clone(), raw).unwrap();
        assert_eq!(rebuilt.scores().scored_count(), 2);
        assert_eq!(rebuilt.measures().range(2, 0), key.measures().range(2, 0));
        assert_eq!(rebuilt.states().len(), key.states().len());
    }
}
