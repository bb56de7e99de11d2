//! Role based capability checks
//!
//! Every permission decision in the API goes through the functions in this
//! module. They only look at the user record, never touch storage.

use uuid::Uuid;

use crate::{
    error::{ErrorMessage, HttpError},
    models::{User, UserRole},
};

/// Actions that need more than being logged in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Create and delete categories and genres, create/update/delete titles
    ManageCatalog,
    /// List, create, edit and delete any user account
    ManageUsers,
}

/// Admin role, or the superuser escape hatch.
pub fn is_admin(user: &User) -> bool {
    user.is_superuser || user.role == UserRole::Admin
}

pub fn is_moderator(user: &User) -> bool {
    user.role == UserRole::Moderator
}

pub fn has_capability(user: &User, capability: Capability) -> bool {
    match capability {
        Capability::ManageCatalog | Capability::ManageUsers => is_admin(user),
    }
}

/// Reviews and comments can be changed by their author, moderators and admins.
pub fn can_modify_content(user: &User, author_id: Uuid) -> bool {
    user.id == author_id || is_moderator(user) || is_admin(user)
}

/// `can_modify_content` as a 403 for use with `?` in handlers.
pub fn ensure_can_modify_content(user: &User, author_id: Uuid) -> Result<(), HttpError> {
    if can_modify_content(user, author_id) {
        Ok(())
    } else {
        tracing::error!(username = %user.username, "Not the author, moderator or admin");
        Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ))
    }
}
