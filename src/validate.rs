//! Build-time structural validation of a machine description.
//!
//! [`validate`] is a pure function from a machine to the full list of
//! structural problems it contains. It never stops at the first issue: one
//! pass reports everything, so authors fix a machine in one round instead of
//! replaying build-fix cycles per error.

use crate::core::{Machine, StateId, StateKind};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Stable identifier for a class of validation issue.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IssueCode {
    MissingInitial,
    InitialNotFound,
    NoStates,
    InvalidTarget,
    MissingAction,
    MissingGuard,
    CompoundMissingInitial,
    CompoundInvalidInitial,
    InvalidParent,
    InvalidChild,
    HistoryNoParent,
    HistoryNoDefault,
    HistoryInvalidDefault,
    ParallelNoRegions,
    FinalTransition,
    InitialCycle,
}

impl IssueCode {
    /// The stable wire form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingInitial => "MISSING_INITIAL",
            Self::InitialNotFound => "INITIAL_NOT_FOUND",
            Self::NoStates => "NO_STATES",
            Self::InvalidTarget => "INVALID_TARGET",
            Self::MissingAction => "MISSING_ACTION",
            Self::MissingGuard => "MISSING_GUARD",
            Self::CompoundMissingInitial => "COMPOUND_MISSING_INITIAL",
            Self::CompoundInvalidInitial => "COMPOUND_INVALID_INITIAL",
            Self::InvalidParent => "INVALID_PARENT",
            Self::InvalidChild => "INVALID_CHILD",
            Self::HistoryNoParent => "HISTORY_NO_PARENT",
            Self::HistoryNoDefault => "HISTORY_NO_DEFAULT",
            Self::HistoryInvalidDefault => "HISTORY_INVALID_DEFAULT",
            Self::ParallelNoRegions => "PARALLEL_NO_REGIONS",
            Self::FinalTransition => "FINAL_TRANSITION",
            Self::InitialCycle => "INITIAL_CYCLE",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation problem: code, human message, structural locator.
#[derive(Clone, Debug)]
pub struct Issue {
    pub code: IssueCode,
    pub message: String,
    /// Structural path, e.g. `["states", "green", "transitions", "0"]`.
    pub path: Vec<String>,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(
                f,
                "[{}] {} (at {})",
                self.code,
                self.message,
                self.path.join(".")
            )
        }
    }
}

/// All problems found in one validation pass. An empty list never occurs;
/// success is the `Ok(())` of [`validate`].
#[derive(Debug, Error)]
#[error("{}", render_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<Issue>,
}

impl ValidationError {
    /// True if any issue carries the given code.
    pub fn has_code(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }
}

fn render_issues(issues: &[Issue]) -> String {
    match issues {
        [] => "validation failed".to_owned(),
        [only] => only.to_string(),
        many => {
            let mut out = format!("validation failed with {} issues:", many.len());
            for (i, issue) in many.iter().enumerate() {
                out.push_str(&format!("\n  {}. {}", i + 1, issue));
            }
            out
        }
    }
}

struct Issues(Vec<Issue>);

impl Issues {
    fn push(&mut self, code: IssueCode, message: impl Into<String>, path: &[&str]) {
        self.0.push(Issue {
            code,
            message: message.into(),
            path: path.iter().map(|s| (*s).to_owned()).collect(),
        });
    }
}

/// Check a machine description for structural errors.
///
/// Returns `Ok(())` for a well-formed machine, or a [`ValidationError`]
/// carrying every issue found. Interpreters refuse machines that fail here.
pub fn validate<C>(machine: &Machine<C>) -> Result<(), ValidationError> {
    let mut issues = Issues(Vec::new());

    if machine.initial().is_empty() {
        issues.push(
            IssueCode::MissingInitial,
            "initial state is required",
            &[],
        );
    }

    if machine.states().is_empty() {
        issues.push(IssueCode::NoStates, "at least one state is required", &[]);
    }

    if !machine.initial().is_empty()
        && !machine.states().is_empty()
        && machine.state(machine.initial()).is_none()
    {
        issues.push(
            IssueCode::InitialNotFound,
            format!("initial state '{}' not found in states", machine.initial()),
            &[],
        );
    }

    // deterministic report order
    let mut ids: Vec<&StateId> = machine.states().keys().collect();
    ids.sort();

    for id in ids {
        check_state(machine, id, &mut issues);
    }

    check_initial_cycles(machine, &mut issues);

    if issues.0.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues: issues.0 })
    }
}

fn check_state<C>(machine: &Machine<C>, id: &StateId, issues: &mut Issues) {
    let node = match machine.state(id) {
        Some(node) => node,
        None => return,
    };
    let state_path = ["states", id.as_str()];

    if let Some(parent_id) = &node.parent {
        match machine.state(parent_id) {
            None => issues.push(
                IssueCode::InvalidParent,
                format!("parent state '{parent_id}' not found"),
                &state_path,
            ),
            Some(parent) => {
                if !matches!(parent.kind, StateKind::Compound | StateKind::Parallel) {
                    issues.push(
                        IssueCode::InvalidParent,
                        format!("parent state '{parent_id}' is not a compound or parallel state"),
                        &state_path,
                    );
                } else if !parent.children.contains(id) {
                    issues.push(
                        IssueCode::InvalidParent,
                        format!("state '{id}' is not listed among the children of '{parent_id}'"),
                        &state_path,
                    );
                }
            }
        }
    }

    match node.kind {
        StateKind::Compound => {
            match &node.initial {
                None => issues.push(
                    IssueCode::CompoundMissingInitial,
                    format!("compound state '{id}' must have an initial child state"),
                    &state_path,
                ),
                Some(initial) if !node.children.contains(initial) => issues.push(
                    IssueCode::CompoundInvalidInitial,
                    format!("initial state '{initial}' must be a child of compound state '{id}'"),
                    &state_path,
                ),
                Some(_) => {}
            }
            check_children(machine, id, issues);
        }
        StateKind::Parallel => {
            if node.children.is_empty() {
                issues.push(
                    IssueCode::ParallelNoRegions,
                    format!("parallel state '{id}' must have at least one region"),
                    &state_path,
                );
            }
            check_children(machine, id, issues);
            for (i, region_id) in node.children.iter().enumerate() {
                if let Some(region) = machine.state(region_id) {
                    if !matches!(region.kind, StateKind::Compound | StateKind::Atomic) {
                        let index = i.to_string();
                        issues.push(
                            IssueCode::InvalidChild,
                            format!("region '{region_id}' must be a compound or atomic state"),
                            &["states", id.as_str(), "children", index.as_str()],
                        );
                    }
                }
            }
        }
        StateKind::Atomic | StateKind::Final | StateKind::History(_) => {
            if !node.children.is_empty() {
                issues.push(
                    IssueCode::InvalidChild,
                    format!("state '{id}' cannot have children"),
                    &state_path,
                );
            }
        }
    }

    if let StateKind::History(_) = node.kind {
        let parent_is_compound = node
            .parent
            .as_ref()
            .and_then(|p| machine.state(p))
            .is_some_and(|p| p.kind == StateKind::Compound);
        if !parent_is_compound {
            issues.push(
                IssueCode::HistoryNoParent,
                format!("history state '{id}' must have a compound parent"),
                &state_path,
            );
        }

        match &node.history_default {
            None => issues.push(
                IssueCode::HistoryNoDefault,
                format!("history state '{id}' must declare a default target"),
                &state_path,
            ),
            Some(default) => {
                let inside_parent = machine.state(default).is_some()
                    && node
                        .parent
                        .as_ref()
                        .is_some_and(|p| machine.is_descendant(default, p));
                if !inside_parent {
                    issues.push(
                        IssueCode::HistoryInvalidDefault,
                        format!(
                            "history default '{default}' must be a state inside the parent of '{id}'"
                        ),
                        &state_path,
                    );
                }
            }
        }
    }

    for (i, action) in node.entry.iter().enumerate() {
        if !machine.registry().has_action(action) {
            let index = i.to_string();
            issues.push(
                IssueCode::MissingAction,
                format!("entry action '{action}' is not defined"),
                &["states", id.as_str(), "entry", index.as_str()],
            );
        }
    }
    for (i, action) in node.exit.iter().enumerate() {
        if !machine.registry().has_action(action) {
            let index = i.to_string();
            issues.push(
                IssueCode::MissingAction,
                format!("exit action '{action}' is not defined"),
                &["states", id.as_str(), "exit", index.as_str()],
            );
        }
    }

    for (i, transition) in node.transitions.iter().enumerate() {
        let index = i.to_string();
        let trans_path = ["states", id.as_str(), "transitions", index.as_str()];

        if node.kind == StateKind::Final {
            issues.push(
                IssueCode::FinalTransition,
                format!("final state '{id}' cannot declare transitions"),
                &trans_path,
            );
        }

        if machine.state(&transition.target).is_none() {
            issues.push(
                IssueCode::InvalidTarget,
                format!("transition target '{}' not found", transition.target),
                &trans_path,
            );
        }

        if let Some(guard) = &transition.guard {
            if !machine.registry().has_guard(guard) {
                issues.push(
                    IssueCode::MissingGuard,
                    format!("guard '{guard}' is not defined"),
                    &trans_path,
                );
            }
        }

        for (j, action) in transition.actions.iter().enumerate() {
            if !machine.registry().has_action(action) {
                let action_index = j.to_string();
                issues.push(
                    IssueCode::MissingAction,
                    format!("transition action '{action}' is not defined"),
                    &[
                        "states",
                        id.as_str(),
                        "transitions",
                        index.as_str(),
                        "actions",
                        action_index.as_str(),
                    ],
                );
            }
        }
    }
}

fn check_children<C>(machine: &Machine<C>, id: &StateId, issues: &mut Issues) {
    let node = match machine.state(id) {
        Some(node) => node,
        None => return,
    };
    for (i, child_id) in node.children.iter().enumerate() {
        let index = i.to_string();
        let child_path = ["states", id.as_str(), "children", index.as_str()];
        match machine.state(child_id) {
            None => issues.push(
                IssueCode::InvalidChild,
                format!("child state '{child_id}' not found"),
                &child_path,
            ),
            Some(child) => {
                if child.parent.as_ref() != Some(id) {
                    issues.push(
                        IssueCode::InvalidChild,
                        format!(
                            "child state '{child_id}' does not name '{id}' as its parent"
                        ),
                        &child_path,
                    );
                }
            }
        }
    }
}

/// Walk every compound's initial chain; a revisited state means the chain
/// can never reach a leaf.
fn check_initial_cycles<C>(machine: &Machine<C>, issues: &mut Issues) {
    let mut ids: Vec<&StateId> = machine.states().keys().collect();
    ids.sort();

    let mut reported = HashSet::new();
    for start in ids {
        let mut seen = HashSet::new();
        let mut current = start.clone();
        while let Some(node) = machine.state(&current) {
            if node.kind != StateKind::Compound {
                break;
            }
            let next = match &node.initial {
                Some(next) => next.clone(),
                None => break,
            };
            if !seen.insert(current.clone()) {
                if reported.insert(current.clone()) {
                    issues.push(
                        IssueCode::InitialCycle,
                        format!("initial resolution starting at '{start}' never reaches a leaf"),
                        &["states", start.as_str()],
                    );
                }
                break;
            }
            current = next;
        }
    }
}
