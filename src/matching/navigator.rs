use serde::Serialize;
use thiserror::Error;

use crate::catalog::dichotomous::DichotomousKey;
use crate::catalog::store::KeyCatalog;
use crate::core::lead::{Item, Lead};
use crate::core::types::{KeyId, LeadId};

/// Key a navigation session starts in unless told otherwise
pub const DEFAULT_START_KEY: &str = "1903";

/// Maximum number of keys on the navigation stack. Keys can link to each other in a
/// cycle, so following links has to stop somewhere.
pub const DEFAULT_MAX_KEY_DEPTH: usize = 32;

/// Source of dichotomous keys for a navigator. Linked keys are requested on demand.
pub trait KeyLoader {
    fn load_key(&self, id: &KeyId) -> Option<&DichotomousKey>;
}

impl KeyLoader for KeyCatalog {
    fn load_key(&self, id: &KeyId) -> Option<&DichotomousKey> {
        self.dichotomous(id)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigatorError {
    #[error("Dichotomous key {0} not found")]
    UnknownStartKey(KeyId),

    #[error("Option {index} is out of range ({available} options available)")]
    InvalidOption { index: usize, available: usize },

    #[error("{item} leads to key {key}, which is not available")]
    LinkedKeyNotFound { key: KeyId, item: String },

    #[error("Cannot follow more than {0} linked keys")]
    DepthExceeded(usize),
}

/// Configuration for the navigator
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    pub start_key: KeyId,
    pub max_depth: usize,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            start_key: KeyId::new(DEFAULT_START_KEY),
            max_depth: DEFAULT_MAX_KEY_DEPTH,
        }
    }
}

/// What choosing an option did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    /// Moved to a deeper node of the same key
    Continue { node: LeadId },
    /// Reached a terminal item; the position is unchanged
    Result { item: Item },
    /// Reached an item that continues in another key, which is now active
    KeyTransition { from: KeyId, to: KeyId, item: Item },
}

/// What stepping back did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "back", rename_all = "snake_case")]
pub enum BackOutcome {
    /// Returned to the previous node of the active key
    Stepped { node: LeadId },
    /// Left the active key and returned to the key that linked to it
    LeftKey { left: KeyId, returned_to: KeyId },
    /// Already at the root of the start key
    AtStart,
}

/// Where the session is
#[derive(Debug, Clone, Serialize)]
pub struct Header {
    pub key_id: KeyId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub node: LeadId,
    /// Number of keys on the stack, 1 in the start key
    pub depth: usize,
}

/// One option at the current node
#[derive(Debug, Clone, Serialize)]
pub struct NavOption {
    pub index: usize,
    pub lead: Lead,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
    pub links_to_key: bool,
}

#[derive(Debug, Clone)]
struct Frame<'a> {
    key: &'a DichotomousKey,
    node: LeadId,
    /// Nodes visited before `node` in this key
    history: Vec<LeadId>,
}

impl<'a> Frame<'a> {
    fn at_root(key: &'a DichotomousKey) -> Self {
        Self {
            key,
            node: key.root().clone(),
            history: Vec::new(),
        }
    }
}

/// Walks a dichotomous key, following links into other keys.
///
/// The session is a stack of frames, one per key entered. Each frame remembers the
/// node it is at and the nodes visited before it, so stepping back is a pop within
/// the frame, or a pop of the frame itself when the frame is at its root.
pub struct KeyNavigator<'a, L: KeyLoader> {
    loader: &'a L,
    config: NavigatorConfig,
    frames: Vec<Frame<'a>>,
}

impl<'a, L: KeyLoader> KeyNavigator<'a, L> {
    /// Start a session at the root of the configured start key
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::UnknownStartKey` if the loader has no such key.
    pub fn new(loader: &'a L, config: NavigatorConfig) -> Result<Self, NavigatorError> {
        let start = loader
            .load_key(&config.start_key)
            .ok_or_else(|| NavigatorError::UnknownStartKey(config.start_key.clone()))?;
        tracing::debug!("Navigation started in key {} ({})", start.id, start.title);
        Ok(Self {
            loader,
            config,
            frames: vec![Frame::at_root(start)],
        })
    }

    fn active(&self) -> &Frame<'a> {
        // The stack is never empty: back() stops at the start frame
        &self.frames[self.frames.len() - 1]
    }

    fn active_mut(&mut self) -> &mut Frame<'a> {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// The key currently being navigated
    #[must_use]
    pub fn current_key(&self) -> &'a DichotomousKey {
        self.active().key
    }

    #[must_use]
    pub fn current_node(&self) -> &LeadId {
        &self.active().node
    }

    /// Number of keys on the stack
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Keys on the stack, start key first
    #[must_use]
    pub fn trail(&self) -> Vec<&KeyId> {
        self.frames.iter().map(|f| &f.key.id).collect()
    }

    #[must_use]
    pub fn header(&self) -> Header {
        let frame = self.active();
        Header {
            key_id: frame.key.id.clone(),
            title: frame.key.title.clone(),
            scope: frame.key.scope.clone(),
            node: frame.node.clone(),
            depth: self.frames.len(),
        }
    }

    /// Options at the current node, in declared order
    #[must_use]
    pub fn options(&self) -> Vec<NavOption> {
        let frame = self.active();
        frame
            .key
            .options(&frame.node)
            .into_iter()
            .enumerate()
            .map(|(index, lead)| {
                let item = lead.item.as_ref().and_then(|i| frame.key.item(i)).cloned();
                NavOption {
                    index,
                    lead: lead.clone(),
                    links_to_key: item.as_ref().is_some_and(Item::links_to_key),
                    item,
                }
            })
            .collect()
    }

    /// True when the current node offers no options
    #[must_use]
    pub fn is_dead_end(&self) -> bool {
        let frame = self.active();
        frame.key.options(&frame.node).is_empty()
    }

    /// Take the option at `index` (zero-based)
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::InvalidOption` for an out-of-range index, and
    /// `NavigatorError::LinkedKeyNotFound` or `NavigatorError::DepthExceeded` when the
    /// option leads to a key that cannot be entered. The session is unchanged on error.
    pub fn choose_option(&mut self, index: usize) -> Result<Transition, NavigatorError> {
        let key = self.active().key;
        let node = self.active().node.clone();
        let options = key.options(&node);
        let lead = options
            .get(index)
            .copied()
            .ok_or(NavigatorError::InvalidOption {
                index,
                available: options.len(),
            })?;

        let Some(item) = lead.item.as_ref().and_then(|i| key.item(i)) else {
            let frame = self.active_mut();
            frame.history.push(node);
            frame.node = lead.id.clone();
            tracing::debug!("{}: moved to node {}", key.id, lead.id);
            return Ok(Transition::Continue {
                node: lead.id.clone(),
            });
        };

        let Some(target) = &item.to_key else {
            tracing::debug!("{}: reached {}", key.id, item.name);
            return Ok(Transition::Result { item: item.clone() });
        };

        if self.frames.len() >= self.config.max_depth.max(1) {
            return Err(NavigatorError::DepthExceeded(self.config.max_depth));
        }
        let linked = self
            .loader
            .load_key(target)
            .ok_or_else(|| NavigatorError::LinkedKeyNotFound {
                key: target.clone(),
                item: item.name.clone(),
            })?;

        self.frames.push(Frame::at_root(linked));
        tracing::debug!("{}: {} leads to key {}", key.id, item.name, linked.id);
        Ok(Transition::KeyTransition {
            from: key.id.clone(),
            to: linked.id.clone(),
            item: item.clone(),
        })
    }

    /// Step back one node, or out of a linked key when at its root
    pub fn back(&mut self) -> BackOutcome {
        if let Some(previous) = self.active_mut().history.pop() {
            self.active_mut().node = previous.clone();
            return BackOutcome::Stepped { node: previous };
        }
        if self.frames.len() > 1 {
            if let Some(left) = self.frames.pop() {
                return BackOutcome::LeftKey {
                    left: left.key.id.clone(),
                    returned_to: self.active().key.id.clone(),
                };
            }
        }
        BackOutcome::AtStart
    }

    /// Return to the root of the start key
    pub fn reset(&mut self) {
        self.frames.truncate(1);
        let start = self.frames[0].key;
        self.frames[0] = Frame::at_root(start);
        tracing::debug!("Navigation reset to key {}", start.id);
    }
}
