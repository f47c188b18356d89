//! XState-compatible JSON projection of a machine description.
//!
//! The exported document can be pasted into the XState visualizer
//! (stately.ai/viz) or fed to other XState v5 tooling. This is a read-only
//! projection of the IR; runtime state never appears in it.

use crate::core::{HistoryKind, Machine, StateId, StateKind, StateNode, Trigger};
use serde::Serialize;
use std::collections::BTreeMap;

/// Root of the exported document.
#[derive(Clone, Debug, Serialize)]
pub struct XStateMachine {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub initial: String,
    pub states: BTreeMap<String, XStateNode>,
}

/// One state in XState's nested-object form.
#[derive(Clone, Debug, Default, Serialize)]
pub struct XStateNode {
    /// "final", "history", or "parallel"; omitted for ordinary states.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub states: BTreeMap<String, XStateNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exit: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub on: BTreeMap<String, XStateTransition>,
    /// Delayed transitions keyed by delay in milliseconds.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub after: BTreeMap<String, XStateTransition>,
    /// "shallow" or "deep"; only on history nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<String>,
    /// Default target; only on history nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct XStateTransition {
    pub target: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
}

/// Projects a machine into the XState JSON schema.
pub struct XStateExporter<'a, C> {
    machine: &'a Machine<C>,
}

impl<'a, C> XStateExporter<'a, C> {
    pub fn new(machine: &'a Machine<C>) -> Self {
        Self { machine }
    }

    /// Build the exported document.
    pub fn export(&self) -> XStateMachine {
        let mut roots: Vec<&StateId> = self
            .machine
            .states()
            .values()
            .filter(|node| node.parent.is_none())
            .map(|node| &node.id)
            .collect();
        roots.sort();

        XStateMachine {
            id: self.machine.id().to_owned(),
            initial: self.machine.initial().as_str().to_owned(),
            states: roots
                .into_iter()
                .filter_map(|id| {
                    self.machine
                        .state(id)
                        .map(|node| (id.as_str().to_owned(), self.node(node)))
                })
                .collect(),
        }
    }

    /// Serialize the document as compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.export())
    }

    /// Serialize the document as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.export())
    }

    fn node(&self, node: &StateNode) -> XStateNode {
        let mut out = XStateNode {
            kind: match node.kind {
                StateKind::Final => Some("final".to_owned()),
                StateKind::History(_) => Some("history".to_owned()),
                StateKind::Parallel => Some("parallel".to_owned()),
                StateKind::Atomic | StateKind::Compound => None,
            },
            initial: node.initial.as_ref().map(|id| id.as_str().to_owned()),
            entry: node.entry.iter().map(|a| a.as_str().to_owned()).collect(),
            exit: node.exit.iter().map(|a| a.as_str().to_owned()).collect(),
            ..XStateNode::default()
        };

        if let StateKind::History(kind) = node.kind {
            out.history = Some(
                match kind {
                    HistoryKind::Shallow => "shallow",
                    HistoryKind::Deep => "deep",
                }
                .to_owned(),
            );
            out.target = node
                .history_default
                .as_ref()
                .map(|id| id.as_str().to_owned());
        }

        for transition in &node.transitions {
            let projected = XStateTransition {
                target: transition.target.as_str().to_owned(),
                actions: transition
                    .actions
                    .iter()
                    .map(|a| a.as_str().to_owned())
                    .collect(),
                guard: transition.guard.as_ref().map(|g| g.as_str().to_owned()),
            };
            match &transition.trigger {
                Trigger::Event(event) => {
                    // first declaration wins, matching dispatch order
                    out.on.entry(event.as_str().to_owned()).or_insert(projected);
                }
                Trigger::After(delay) => {
                    out.after
                        .entry(delay.as_millis().to_string())
                        .or_insert(projected);
                }
            }
        }

        for child in &node.children {
            if let Some(child_node) = self.machine.state(child) {
                out.states
                    .insert(child.as_str().to_owned(), self.node(child_node));
            }
        }

        out
    }
}
