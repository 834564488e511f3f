//! Field-level diff between two entity snapshots.
//!
//! Only scalar business fields take part: metadata columns and nested objects
//! (expanded relations) are dropped from both sides before comparing. Values are
//! compared structurally, so arrays with equal contents are equal.

use serde_json::{Map, Value};

/// An entity rendered as an ordered field-name to value mapping.
pub type Snapshot = Map<String, Value>;

/// Bookkeeping columns that never appear in an audit fragment.
pub const METADATA_FIELDS: [&str; 4] = ["created_at", "updated_at", "created_by", "updated_by"];

/// The changed fields of a mutation, each side holding its own values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    pub prior: Snapshot,
    pub new: Snapshot,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.prior.is_empty() && self.new.is_empty()
    }

    /// Names of every field that changed, in first-seen order.
    pub fn changed_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.prior.keys().map(String::as_str).collect();
        for key in self.new.keys() {
            if !self.prior.contains_key(key) {
                fields.push(key);
            }
        }
        fields
    }
}

/// Whether a field takes part in diffing at all.
pub fn is_diffable(field: &str, value: &Value) -> bool {
    !METADATA_FIELDS.contains(&field) && !value.is_object()
}

fn diffable<'a>(snapshot: Option<&'a Snapshot>, field: &str) -> Option<&'a Value> {
    snapshot
        .and_then(|s| s.get(field))
        .filter(|v| is_diffable(field, v))
}

/// Computes the minimal diff between two snapshots.
///
/// A field lands in a fragment only when its values differ; a side that lacks the
/// field (or whose value was stripped) simply omits it from its fragment.
pub fn diff_snapshots(prior: Option<&Snapshot>, new: Option<&Snapshot>) -> Diff {
    let mut diff = Diff::default();

    let prior_keys = prior.into_iter().flat_map(|s| s.keys());
    let new_only = new
        .into_iter()
        .flat_map(|s| s.keys())
        .filter(|k| !prior.is_some_and(|p| p.contains_key(*k)));

    for field in prior_keys.chain(new_only) {
        let before = diffable(prior, field);
        let after = diffable(new, field);
        if before == after {
            continue;
        }
        if let Some(v) = before {
            diff.prior.insert(field.clone(), v.clone());
        }
        if let Some(v) = after {
            diff.new.insert(field.clone(), v.clone());
        }
    }

    diff
}
