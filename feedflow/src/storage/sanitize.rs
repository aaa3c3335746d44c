//! Comma removal from object paths.
//!
//! Planning is pure; [`StorageManager::sanitize_obj_names`](super::StorageManager::sanitize_obj_names)
//! applies the plan against the store.

/// What to do with one object during sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeAction {
    /// The path has no commas to strip.
    Unchanged,
    /// Move the object to a new path.
    Rename(String),
    /// The leaf name is only commas and whitespace, so the object is removed.
    Delete,
}

fn is_blank(part: &str) -> bool {
    part.replace(',', "").trim().is_empty()
}

fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|p| !p.is_empty() && *p != ".").collect()
}

/// Plans the sanitization of `obj_path`, listed under `prefix`.
///
/// Only the components below `prefix` are rewritten. A prefix that ends in
/// the middle of a component is treated as its parent folder, so that
/// partially matched component is rewritten as well.
#[must_use]
pub fn plan(prefix: &str, obj_path: &str) -> SanitizeAction {
    let obj_parts = components(obj_path);
    let Some(leaf) = obj_parts.last() else {
        return SanitizeAction::Unchanged;
    };
    if is_blank(leaf) {
        return SanitizeAction::Delete;
    }

    let prefix_parts = components(prefix);
    let base_len = if obj_parts.starts_with(&prefix_parts) {
        prefix_parts.len()
    } else {
        prefix_parts.len().saturating_sub(1)
    };
    let base_len = base_len.min(obj_parts.len());

    let mut new_parts: Vec<String> = obj_parts[..base_len].iter().map(|p| (*p).to_string()).collect();
    new_parts.extend(
        obj_parts[base_len..]
            .iter()
            .filter(|part| !is_blank(part))
            .map(|part| part.replace(',', "")),
    );

    let new_path = new_parts.join("/");
    if new_path == obj_parts.join("/") {
        SanitizeAction::Unchanged
    } else {
        SanitizeAction::Rename(new_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commas_are_stripped_from_components() {
        assert_eq!(
            plan("PIPELINES", "PIPELINES/a,b/c,.txt"),
            SanitizeAction::Rename("PIPELINES/ab/c.txt".into())
        );
    }

    #[test]
    fn test_blank_folder_is_collapsed() {
        assert_eq!(
            plan("PIPELINES/", "PIPELINES/a,b/ ,,/x.txt"),
            SanitizeAction::Rename("PIPELINES/ab/x.txt".into())
        );
    }

    #[test]
    fn test_whitespace_is_kept_inside_names() {
        assert_eq!(
            plan("PIPELINES", "PIPELINES/c, .txt"),
            SanitizeAction::Rename("PIPELINES/c .txt".into())
        );
    }

    #[test]
    fn test_blank_leaf_is_deleted() {
        assert_eq!(plan("home/foo", "home/foo/dir/ , "), SanitizeAction::Delete);
    }

    #[test]
    fn test_clean_path_is_unchanged() {
        assert_eq!(plan("home/foo", "home/foo/dir/file.txt"), SanitizeAction::Unchanged);
    }

    #[test]
    fn test_prefix_components_are_preserved() {
        assert_eq!(plan("home/a,b", "home/a,b/x,y.txt"), SanitizeAction::Rename("home/a,b/xy.txt".into()));
    }

    #[test]
    fn test_partial_component_prefix_is_rewritten() {
        assert_eq!(plan("home/a", "home/a,b/x.txt"), SanitizeAction::Rename("home/ab/x.txt".into()));
    }
}
