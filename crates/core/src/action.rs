//! Actions and per-feature action sets.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single permission-relevant operation on a feature.
///
/// The vocabulary is closed: gating is screen-level and coarse, so there is
/// no "custom action" escape hatch. Anything outside these four is a caller
/// error and unrepresentable here.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    /// All actions, in display order.
    pub const ALL: [Action; 4] = [Action::View, Action::Create, Action::Edit, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }

    /// Whether this action mutates data (everything except `View`).
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Action::View)
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Action::View),
            "create" => Ok(Action::Create),
            "edit" => Ok(Action::Edit),
            "delete" => Ok(Action::Delete),
            other => Err(CoreError::unknown_action(other)),
        }
    }
}

/// The set of actions granted on a single feature.
///
/// Mirrors the backing store's row shape (four boolean columns). Rows may
/// omit keys; missing actions deserialize as denied.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionSet {
    #[serde(default)]
    pub view: bool,
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub edit: bool,
    #[serde(default)]
    pub delete: bool,
}

impl ActionSet {
    /// No actions granted.
    pub const fn none() -> Self {
        Self {
            view: false,
            create: false,
            edit: false,
            delete: false,
        }
    }

    /// Every action granted.
    pub const fn all() -> Self {
        Self {
            view: true,
            create: true,
            edit: true,
            delete: true,
        }
    }

    /// A set granting exactly one action.
    pub const fn only(action: Action) -> Self {
        let mut set = Self::none();
        match action {
            Action::View => set.view = true,
            Action::Create => set.create = true,
            Action::Edit => set.edit = true,
            Action::Delete => set.delete = true,
        }
        set
    }

    /// A set granting each action in `actions`.
    pub fn of(actions: &[Action]) -> Self {
        let mut set = Self::none();
        for action in actions {
            set.grant(*action);
        }
        set
    }

    pub fn contains(&self, action: Action) -> bool {
        match action {
            Action::View => self.view,
            Action::Create => self.create,
            Action::Edit => self.edit,
            Action::Delete => self.delete,
        }
    }

    pub fn grant(&mut self, action: Action) {
        match action {
            Action::View => self.view = true,
            Action::Create => self.create = true,
            Action::Edit => self.edit = true,
            Action::Delete => self.delete = true,
        }
    }

    pub fn revoke(&mut self, action: Action) {
        match action {
            Action::View => self.view = false,
            Action::Create => self.create = false,
            Action::Edit => self.edit = false,
            Action::Delete => self.delete = false,
        }
    }

    /// Union of two sets (an action is granted if either side grants it).
    pub fn union(&self, other: &ActionSet) -> ActionSet {
        ActionSet {
            view: self.view || other.view,
            create: self.create || other.create,
            edit: self.edit || other.edit,
            delete: self.delete || other.delete,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.view || self.create || self.edit || self.delete)
    }

    /// Actions granted by this set, in display order.
    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.into_iter().filter(|a| self.contains(*a))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
