//! Ownership checks shared by every task and project operation.

use uuid::Uuid;

use crate::auth::Identity;
use crate::error::ServiceError;
use crate::project::Project;
use crate::task::Task;

/// A document that belongs to exactly one user.
pub trait Owned {
    /// Name used in `NotFound` messages.
    const KIND: &'static str;

    fn owner(&self) -> Uuid;
}

impl Owned for Task {
    const KIND: &'static str = "Task";

    fn owner(&self) -> Uuid {
        self.owner
    }
}

impl Owned for Project {
    const KIND: &'static str = "Project";

    fn owner(&self) -> Uuid {
        self.owner
    }
}

/// Existence first, then ownership: a missing document is `NotFound` for
/// everyone, an existing one owned by someone else is `Forbidden`.
pub fn authorize<'a, T, F>(identity: &Identity, fetch: F) -> Result<&'a T, ServiceError>
where
    T: Owned,
    F: FnOnce() -> Option<&'a T>,
{
    let doc = fetch().ok_or(ServiceError::NotFound(T::KIND))?;
    if doc.owner() != identity.user_id {
        tracing::warn!(user = %identity.user_id, kind = T::KIND, "Ownership check failed");
        return Err(ServiceError::Forbidden);
    }
    Ok(doc)
}

pub fn authorize_mut<'a, T, F>(identity: &Identity, fetch: F) -> Result<&'a mut T, ServiceError>
where
    T: Owned,
    F: FnOnce() -> Option<&'a mut T>,
{
    let doc = fetch().ok_or(ServiceError::NotFound(T::KIND))?;
    if doc.owner() != identity.user_id {
        tracing::warn!(user = %identity.user_id, kind = T::KIND, "Ownership check failed");
        return Err(ServiceError::Forbidden);
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Role;
    use crate::project::NewProject;

    fn identity(user_id: Uuid) -> Identity {
        Identity {
            user_id,
            email: "a@b.co".into(),
            role: Role::User,
        }
    }

    #[test]
    fn missing_then_foreign_then_owned() {
        let owner = Uuid::new_v4();
        let project = Project::create(
            owner,
            NewProject {
                name: "P".into(),
                description: None,
                color: "#3498db".into(),
            },
            chrono::Utc::now(),
        );

        let missing = authorize::<Project, _>(&identity(owner), || None);
        assert!(matches!(missing, Err(ServiceError::NotFound("Project"))));

        let foreign = authorize(&identity(Uuid::new_v4()), || Some(&project));
        assert!(matches!(foreign, Err(ServiceError::Forbidden)));

        assert!(authorize(&identity(owner), || Some(&project)).is_ok());
    }
}
