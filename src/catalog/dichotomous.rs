use serde::Serialize;
use std::collections::HashMap;

use crate::catalog::store::{IssueLog, LoadIssue, SchemaViolation};
use crate::core::lead::{Item, Lead};
use crate::core::types::{ItemId, KeyId, LeadId};
use crate::parsing::keybase::{RawDichotomousKey, RawFirstStep, RawItem, RawLead, RawScope};
use crate::parsing::{optional_id, RawId};

/// Listing entry for a dichotomous key
#[derive(Debug, Clone, Serialize)]
pub struct DichotomousKeySummary {
    pub id: KeyId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub leads: usize,
    pub items: usize,
}

/// A validated dichotomous key, with leads indexed by the node they are offered at
#[derive(Debug, Clone)]
pub struct DichotomousKey {
    pub id: KeyId,
    pub title: String,

    /// Taxonomic scope the key covers (e.g. a family)
    pub scope: Option<String>,

    root: LeadId,
    leads: Vec<Lead>,
    items: Vec<Item>,

    /// Index: parent node -> indices of its leads, in declared order
    leads_by_parent: HashMap<LeadId, Vec<usize>>,

    /// Index: item ID -> index in items vec
    item_index: HashMap<ItemId, usize>,

    warnings: Vec<LoadIssue>,
}

impl DichotomousKey {
    /// Validate and index a raw key. `fallback_id` is used when the record carries no
    /// `key_id` (typically the file stem).
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaViolation`] if the key has no id or no root node.
    pub fn from_raw(
        raw: RawDichotomousKey,
        fallback_id: Option<&str>,
    ) -> Result<Self, SchemaViolation> {
        let id = optional_id(raw.key_id.as_ref())
            .or_else(|| fallback_id.map(str::to_string))
            .map(KeyId::new)
            .ok_or(SchemaViolation::MissingKeyId)?;

        let root = raw
            .first_step
            .as_ref()
            .and_then(|step| optional_id(step.root_node_id.as_ref()))
            .map(LeadId::new)
            .ok_or_else(|| SchemaViolation::MissingRootNode { key: id.clone() })?;

        let mut log = IssueLog::new(&id);
        let (items, item_index) = index_items(raw.items, &mut log);
        let (leads, leads_by_parent) = index_leads(raw.leads, &item_index, &mut log);

        let title = raw
            .key_title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("Key {id}"));
        let scope = raw
            .taxonomic_scope
            .and_then(|s| s.item_name)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if !leads_by_parent.contains_key(&root) {
            tracing::debug!("Dichotomous key {id}: root node {root} has no leads");
        }

        Ok(Self {
            id,
            title,
            scope,
            root,
            leads,
            items,
            leads_by_parent,
            item_index,
            warnings: log.into_issues(),
        })
    }

    /// The node navigation starts at
    #[must_use]
    pub fn root(&self) -> &LeadId {
        &self.root
    }

    /// Leads offered at a node, in declared order. Empty at a dead end.
    #[must_use]
    pub fn options(&self, node: &LeadId) -> Vec<&Lead> {
        self.leads_by_parent
            .get(node)
            .map(|indices| indices.iter().map(|&i| &self.leads[i]).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.item_index.get(id).map(|&i| &self.items[i])
    }

    #[must_use]
    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Keys this key links onward to, in item order, without repeats
    #[must_use]
    pub fn linked_keys(&self) -> Vec<&KeyId> {
        let mut linked: Vec<&KeyId> = Vec::new();
        for key in self.items.iter().filter_map(|item| item.to_key.as_ref()) {
            if !linked.contains(&key) {
                linked.push(key);
            }
        }
        linked
    }

    #[must_use]
    pub fn warnings(&self) -> &[LoadIssue] {
        &self.warnings
    }

    #[must_use]
    pub fn summary(&self) -> DichotomousKeySummary {
        DichotomousKeySummary {
            id: self.id.clone(),
            title: self.title.clone(),
            scope: self.scope.clone(),
            leads: self.leads.len(),
            items: self.items.len(),
        }
    }

    /// Convert back to a raw record, for export
    #[must_use]
    pub fn to_raw(&self) -> RawDichotomousKey {
        RawDichotomousKey {
            key_id: Some(RawId::Str(self.id.to_string())),
            key_title: Some(self.title.clone()),
            taxonomic_scope: self.scope.as_ref().map(|s| RawScope {
                item_name: Some(s.clone()),
            }),
            first_step: Some(RawFirstStep {
                root_node_id: Some(RawId::Str(self.root.to_string())),
            }),
            leads: self
                .leads
                .iter()
                .map(|lead| RawLead {
                    lead_id: RawId::Str(lead.id.to_string()),
                    parent_id: RawId::Str(lead.parent.to_string()),
                    lead_text: Some(lead.text.clone()),
                    item: lead.item.as_ref().map(|i| RawId::Str(i.to_string())),
                })
                .collect(),
            items: self
                .items
                .iter()
                .map(|item| RawItem {
                    item_id: RawId::Str(item.id.to_string()),
                    item_name: Some(item.name.clone()),
                    url: item.url.clone(),
                    to_key: item.to_key.as_ref().map(|k| RawId::Str(k.to_string())),
                })
                .collect(),
        }
    }
}

fn index_items(raw_items: Vec<RawItem>, log: &mut IssueLog) -> (Vec<Item>, HashMap<ItemId, usize>) {
    let mut items = Vec::with_capacity(raw_items.len());
    let mut index = HashMap::with_capacity(raw_items.len());

    for raw in raw_items {
        let Some(id) = raw.item_id.normalized() else {
            log.push(LoadIssue::MalformedRecord {
                detail: "item with a blank id".to_string(),
            });
            continue;
        };
        let item_id = ItemId::new(id.as_str());
        if index.contains_key(&item_id) {
            log.push(LoadIssue::DuplicateId { kind: "item", id });
            continue;
        }

        let name = raw
            .item_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Item {id}"));
        index.insert(item_id.clone(), items.len());
        items.push(Item {
            id: item_id,
            name,
            url: raw.url.filter(|u| !u.trim().is_empty()),
            to_key: optional_id(raw.to_key.as_ref()).map(KeyId::new),
        });
    }

    (items, index)
}

fn index_leads(
    raw_leads: Vec<RawLead>,
    item_index: &HashMap<ItemId, usize>,
    log: &mut IssueLog,
) -> (Vec<Lead>, HashMap<LeadId, Vec<usize>>) {
    let mut leads = Vec::with_capacity(raw_leads.len());
    let mut by_parent: HashMap<LeadId, Vec<usize>> = HashMap::new();

    for raw in raw_leads {
        let (Some(id), Some(parent)) = (raw.lead_id.normalized(), raw.parent_id.normalized())
        else {
            log.push(LoadIssue::MalformedRecord {
                detail: "lead with a blank id or parent".to_string(),
            });
            continue;
        };

        let item = optional_id(raw.item.as_ref()).map(ItemId::new);
        let item = match item {
            Some(item) if !item_index.contains_key(&item) => {
                log.push(LoadIssue::MissingItem {
                    lead: id.clone(),
                    item: item.to_string(),
                });
                None
            }
            other => other,
        };

        let lead = Lead {
            id: LeadId::new(id),
            parent: LeadId::new(parent),
            text: raw.lead_text.unwrap_or_default().trim().to_string(),
            item,
        };
        by_parent
            .entry(lead.parent.clone())
            .or_default()
            .push(leads.len());
        leads.push(lead);
    }

    (leads, by_parent)
}
