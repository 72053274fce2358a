//! Maps parsed buffer lines onto persisted records.
//!
//! Matching runs in three stages, each only considering records no earlier
//! stage claimed:
//!
//! 1. exact content equality (any project),
//! 2. whitespace-insensitive equality within the same project tag,
//! 3. containment of one whitespace-stripped string in the other, same tag.
//!
//! Matched records keep their identity. Text reconciliation only ever
//! rewrites `content` and the project tag; progress, completion, sub-items
//! and notes belong to the per-item edit operations.

use serde::Serialize;

use crate::model::line_item::LineItem;
use crate::model::record::{RecordPatch, WorkItemRecord};

/// Which stage paired a line with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStage {
    Exact,
    Normalized,
    Containment,
}

/// A line item paired with the record it keeps alive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemMatch {
    pub line_index: usize,
    pub record_id: String,
    pub stage: MatchStage,
}

/// The write plan that brings the stored records in line with the text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Lines with no matching record, in buffer order
    pub to_insert: Vec<LineItem>,
    /// Content / project reattachments for matched records
    pub to_update: Vec<RecordPatch>,
    /// Ids of records no line claims
    pub to_delete: Vec<String>,
    pub matches: Vec<ItemMatch>,
}

impl Reconciliation {
    /// True when applying the plan would not change the store
    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Compute the insert / update / delete plan for `items` against the
/// records currently stored for the same day.
///
/// An empty item list clears the day: every record is deleted.
pub fn reconcile(items: &[LineItem], existing: &[WorkItemRecord]) -> Reconciliation {
    if items.is_empty() {
        return Reconciliation {
            to_delete: existing.iter().map(|r| r.id.clone()).collect(),
            ..Default::default()
        };
    }

    let mut claimed = vec![false; existing.len()];
    let mut paired: Vec<Option<(usize, MatchStage)>> = vec![None; items.len()];

    // Stage 1: exact content
    for (i, item) in items.iter().enumerate() {
        if let Some(j) = first_unclaimed(existing, &claimed, |r| r.content == item.content) {
            claimed[j] = true;
            paired[i] = Some((j, MatchStage::Exact));
        }
    }

    // Stage 2: same tag, whitespace-collapsed equality
    for (i, item) in items.iter().enumerate() {
        if paired[i].is_some() {
            continue;
        }
        let wanted = normalize(&item.content);
        if let Some(j) = first_unclaimed(existing, &claimed, |r| {
            r.project_tag() == item.project_tag && normalize(&r.content) == wanted
        }) {
            claimed[j] = true;
            paired[i] = Some((j, MatchStage::Normalized));
        }
    }

    // Stage 3: same tag, one contains the other
    for (i, item) in items.iter().enumerate() {
        if paired[i].is_some() {
            continue;
        }
        let wanted = normalize(&item.content);
        if wanted.is_empty() {
            continue;
        }
        if let Some(j) = first_unclaimed(existing, &claimed, |r| {
            if r.project_tag() != item.project_tag {
                return false;
            }
            let have = normalize(&r.content);
            !have.is_empty() && (have.contains(&wanted) || wanted.contains(&have))
        }) {
            claimed[j] = true;
            paired[i] = Some((j, MatchStage::Containment));
        }
    }

    let mut plan = Reconciliation::default();

    for (item, pair) in items.iter().zip(&paired) {
        match pair {
            Some((j, stage)) => {
                let record = &existing[*j];
                plan.matches.push(ItemMatch {
                    line_index: item.line_index,
                    record_id: record.id.clone(),
                    stage: *stage,
                });
                if let Some(patch) = text_patch(item, record) {
                    plan.to_update.push(patch);
                }
            }
            None => plan.to_insert.push(item.clone()),
        }
    }

    plan.to_delete = existing
        .iter()
        .zip(&claimed)
        .filter(|(_, taken)| !**taken)
        .map(|(r, _)| r.id.clone())
        .collect();

    plan
}

/// Remove all whitespace so re-spaced text compares equal
pub fn normalize(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn first_unclaimed(
    existing: &[WorkItemRecord],
    claimed: &[bool],
    pred: impl Fn(&WorkItemRecord) -> bool,
) -> Option<usize> {
    existing
        .iter()
        .enumerate()
        .find(|(j, r)| !claimed[*j] && pred(r))
        .map(|(j, _)| j)
}

/// Patch carrying only the text-derived fields that changed
fn text_patch(item: &LineItem, record: &WorkItemRecord) -> Option<RecordPatch> {
    let content_changed = record.content != item.content;
    let tag_changed = record.project_tag() != item.project_tag;
    if !content_changed && !tag_changed {
        return None;
    }

    let mut patch = RecordPatch::new(&record.id);
    if content_changed {
        patch.content = Some(item.content.clone());
    }
    if tag_changed {
        patch.project_tags = Some(vec![item.project_tag.clone()]);
    }
    Some(patch)
}
