//! Storage path conventions.
//!
//! User files live under `home/<username>/`; plugin instance outputs live
//! under `<owner>/feed_<id>/`.

use crate::access::Actor;
use crate::errors::{FeedflowError, PermissionDenied};

/// Top-level folder holding every user's home.
pub const HOME_ROOT: &str = "home";

/// Suffix of link files, which may not be uploaded directly.
pub const LINK_FILE_SUFFIX: &str = ".chrislink";

/// Returns a user's home folder.
#[must_use]
pub fn user_home(username: &str) -> String {
    format!("{HOME_ROOT}/{username}")
}

/// Returns the root folder of a feed's outputs.
#[must_use]
pub fn feed_root(owner: &str, feed_id: u64) -> String {
    format!("{owner}/feed_{feed_id}")
}

/// Validates and normalizes a user upload path.
///
/// The path may not contain commas, has surrounding whitespace and slashes
/// removed, may not name a link file, must live under `home/`, and the
/// actor must be able to write under the owning user's home folder.
pub fn validate_upload_path(actor: &Actor, upload_path: &str) -> Result<String, FeedflowError> {
    if upload_path.contains(',') {
        return Err(FeedflowError::InvalidPath("Invalid path. Cannot contain commas.".into()));
    }

    let path = upload_path.trim().trim_matches('/');

    if path.ends_with(LINK_FILE_SUFFIX) {
        return Err(FeedflowError::InvalidPath(
            "Invalid path. Uploading link files is not allowed.".into(),
        ));
    }

    let Some(rest) = path.strip_prefix("home/") else {
        return Err(FeedflowError::InvalidPath(
            "Invalid path. Path must start with 'home/'.".into(),
        ));
    };

    let Some((home_owner, _)) = rest.split_once('/') else {
        return Err(FeedflowError::InvalidPath(format!(
            "Invalid path. '{path}' does not name a file under a home folder."
        )));
    };

    let home = user_home(home_owner);
    if !actor.access_to(Some(home_owner), &home).can_write() {
        return Err(PermissionDenied::new(
            "upload",
            format!("user does not have write permission under the folder '{home}'"),
        )
        .into());
    }

    Ok(path.to_string())
}
