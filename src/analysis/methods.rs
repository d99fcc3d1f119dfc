use tracing::debug;

use super::classify::{self, EditSign};
use crate::pr::types::ChangedFile;
use crate::report::types::DeletedMethodRecord;

/// Collect every public method declaration removed from the given source
/// files, in file order and then line order.
pub fn deleted_public_methods<'a, I>(files: I) -> Vec<DeletedMethodRecord>
where
    I: IntoIterator<Item = &'a ChangedFile>,
{
    let mut records = Vec::new();
    for file in files {
        for line in file.lines() {
            if classify::edit_sign(line) != EditSign::Removed {
                continue;
            }
            if let Some(method_name) = classify::deleted_public_method(line) {
                debug!(file = %file.filename, method = method_name, "deleted public method");
                records.push(DeletedMethodRecord {
                    filename: file.filename.clone(),
                    method_name: method_name.to_string(),
                });
            }
        }
    }
    records
}
