use super::types::ChangedFile;
use super::PrError;

/// Split the output of `git diff` into one ChangedFile per file.
///
/// Each file section starts with:
///   diff --git a/{path} b/{path}
///
/// Extended headers (`index`, `new file mode`, `---`/`+++`, ...) are dropped;
/// everything from the first `@@` hunk header onward becomes the file's
/// patch, matching what GitHub returns in the `patch` field. Deleted files
/// keep their `a/` path.
pub fn split_diff(raw_diff: &str) -> Result<Vec<ChangedFile>, PrError> {
    let mut files = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    let mut in_hunks = false;

    for line in raw_diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some((filename, lines)) = current.take() {
                files.push(ChangedFile::new(filename, lines.join("\n")));
            }
            current = Some((parse_header_path(rest)?, Vec::new()));
            in_hunks = false;
            continue;
        }

        let Some((_, lines)) = current.as_mut() else {
            continue;
        };

        if line.starts_with("@@") {
            in_hunks = true;
        }
        if in_hunks {
            lines.push(line);
        }
    }

    if let Some((filename, lines)) = current.take() {
        files.push(ChangedFile::new(filename, lines.join("\n")));
    }
    Ok(files)
}

fn parse_header_path(rest: &str) -> Result<String, PrError> {
    let mut parts = rest.split_whitespace();
    let a_path = parts
        .next()
        .ok_or_else(|| PrError::DiffParse("Missing a/ path in diff header".to_string()))?;
    let b_path = parts
        .next()
        .ok_or_else(|| PrError::DiffParse("Missing b/ path in diff header".to_string()))?;
    let path = b_path
        .strip_prefix("b/")
        .or_else(|| a_path.strip_prefix("a/"))
        .unwrap_or(b_path);
    Ok(path.to_string())
}
