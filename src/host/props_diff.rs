//! Property diff - computes the patch payload for a host element update.
//!
//! # Algorithm
//!
//! 1. Every prop present in `old` but absent from `new` emits a removal
//!    (a removed `style` turns each of its fields into an empty string).
//! 2. Every prop in `new` that differs from `old` emits a set; a `new` value of
//!    `Null` over a non-null `old` value emits a removal.
//! 3. `style` is diffed field by field: removed fields become `""`, added or
//!    changed fields carry their new value. All style changes are merged into
//!    one trailing `style` entry.
//! 4. `children` is only patched when the new value is text. Structural
//!    children belong to reconciliation.
//!
//! No differences at all yields `None`, which means "no mutation flag".

use crate::element::{PropValue, Props, Style, CHILDREN, STYLE};

// =============================================================================
// Payload
// =============================================================================

/// One change to apply to a host element.
#[derive(Debug, Clone, PartialEq)]
pub enum PropPatch {
    /// Drop the property.
    Remove,
    /// Set the property to a new value.
    Set(PropValue),
    /// Merge style fields; an empty value clears that field.
    Style(Style),
}

/// Ordered list of property changes for one element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePayload {
    entries: Vec<(String, PropPatch)>,
}

impl UpdatePayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, patch: PropPatch) {
        self.entries.push((name.into(), patch));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropPatch)> {
        self.entries.iter().map(|(name, patch)| (name.as_str(), patch))
    }

    /// The first patch for `name`.
    pub fn get(&self, name: &str) -> Option<&PropPatch> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, patch)| patch)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Diff
// =============================================================================

/// Diff two flat property maps. `None` when nothing changed.
pub fn diff_properties(old: &Props, new: &Props) -> Option<UpdatePayload> {
    let mut payload = UpdatePayload::new();
    let mut style_updates: Option<Style> = None;

    // Pass 1: props that disappeared.
    for (name, last) in old.iter() {
        if new.contains(name) || last.is_null() {
            continue;
        }
        if name == STYLE {
            if let PropValue::Style(last_style) = last {
                let updates = style_updates.get_or_insert_with(Style::new);
                for field in last_style.keys() {
                    updates.insert(field.clone(), String::new());
                }
            }
        } else if name == CHILDREN && !last.is_textual_children() {
            // Structural children are reconciled, not patched.
        } else {
            payload.push(name, PropPatch::Remove);
        }
    }

    // Pass 2: props that were added or changed.
    for (name, next) in new.iter() {
        let last = old.get(name);
        if last == Some(next) {
            continue;
        }
        if next.is_null() && last.is_none_or(PropValue::is_null) {
            continue;
        }

        if name == STYLE {
            diff_style(last, next, &mut style_updates);
        } else if name == CHILDREN {
            if next.is_textual_children() {
                payload.push(name, PropPatch::Set(next.clone()));
            } else if last.is_some_and(PropValue::is_textual_children) {
                // Text content replaced by structure: clear the text.
                payload.push(name, PropPatch::Remove);
            }
        } else if next.is_null() {
            payload.push(name, PropPatch::Remove);
        } else {
            payload.push(name, PropPatch::Set(next.clone()));
        }
    }

    if let Some(updates) = style_updates {
        if !updates.is_empty() {
            payload.push(STYLE, PropPatch::Style(updates));
        }
    }

    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

fn diff_style(last: Option<&PropValue>, next: &PropValue, updates: &mut Option<Style>) {
    let empty = Style::new();
    let next_style = match next {
        PropValue::Style(style) => style,
        _ => &empty,
    };

    match last {
        Some(PropValue::Style(last_style)) => {
            for field in last_style.keys() {
                if !next_style.contains_key(field) {
                    updates
                        .get_or_insert_with(Style::new)
                        .insert(field.clone(), String::new());
                }
            }
            for (field, value) in next_style {
                if last_style.get(field) != Some(value) {
                    updates
                        .get_or_insert_with(Style::new)
                        .insert(field.clone(), value.clone());
                }
            }
        }
        _ => {
            if !next_style.is_empty() {
                updates
                    .get_or_insert_with(Style::new)
                    .extend(next_style.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
