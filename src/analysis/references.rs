//! Reconciliation of added and removed dependency references.
//!
//! A `-` line and a `+` line for the same (kind, name) collapse into one
//! record regardless of which one comes first. Whether a record is an
//! addition, an update or a removal is only known once every line has been
//! seen, so classification is read off the populated versions afterwards.

use std::collections::HashMap;

use tracing::debug;

use super::classify::{self, EditSign, ReferenceMatch};
use crate::pr::types::ChangedFile;
use crate::report::types::{ReferenceAnalysisResult, ReferenceChange, ReferenceKind, NO_VERSION};

/// Insertion-ordered map from (kind, name) to the record being built.
#[derive(Debug, Default)]
struct Reconciler {
    index: HashMap<(ReferenceKind, String), usize>,
    changes: Vec<ReferenceChange>,
}

impl Reconciler {
    fn apply(&mut self, reference: ReferenceMatch<'_>, is_addition: bool) {
        let version = if reference.version.is_empty() && reference.kind.is_unversioned() {
            NO_VERSION.to_string()
        } else {
            reference.version.to_string()
        };

        let key = (reference.kind, reference.name.to_string());
        if let Some(&slot) = self.index.get(&key) {
            let existing = &mut self.changes[slot];
            if is_addition {
                existing.new_version = Some(version);
            } else {
                existing.old_version = Some(version);
            }
            return;
        }

        let change = if is_addition {
            ReferenceChange {
                name: reference.name.to_string(),
                kind: reference.kind,
                old_version: None,
                new_version: Some(version),
            }
        } else {
            ReferenceChange {
                name: reference.name.to_string(),
                kind: reference.kind,
                old_version: Some(version),
                new_version: None,
            }
        };
        self.index.insert(key, self.changes.len());
        self.changes.push(change);
    }

    fn finish(self) -> ReferenceAnalysisResult {
        ReferenceAnalysisResult {
            changes: self.changes,
        }
    }
}

/// Reconcile reference changes across all given manifest files.
///
/// The key spans the whole run, so a reference removed in one manifest and
/// added in another ends up as a single update.
pub fn analyze_references<'a, I>(files: I) -> ReferenceAnalysisResult
where
    I: IntoIterator<Item = &'a ChangedFile>,
{
    let mut reconciler = Reconciler::default();
    for file in files {
        for line in file.lines() {
            let is_addition = match classify::edit_sign(line) {
                EditSign::Added => true,
                EditSign::Removed => false,
                EditSign::Neutral => continue,
            };
            let content = line[1..].trim();
            if let Some(reference) = classify::match_reference(content) {
                debug!(
                    file = %file.filename,
                    kind = %reference.kind,
                    name = reference.name,
                    added = is_addition,
                    "reference line"
                );
                reconciler.apply(reference, is_addition);
            }
        }
    }
    reconciler.finish()
}
