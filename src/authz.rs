use std::collections::HashSet;

use uuid::Uuid;

use crate::db::organization_repository::OrganizationRepository;
use crate::models::organization::OrgRole;

/// A required-role-set policy. Uniqueness guarantees at most one role per
/// (user, org), but the check stays a set intersection so a widened model
/// keeps working.
#[derive(Debug, Clone, Copy)]
pub struct RoleRequirement {
    roles: &'static [OrgRole],
}

/// Admin-only actions (inviting members).
pub const ADMIN_ONLY: RoleRequirement = RoleRequirement {
    roles: &[OrgRole::Admin],
};

/// Actions open to managers and admins (creating projects).
pub const MANAGER_OR_ADMIN: RoleRequirement = RoleRequirement {
    roles: &[OrgRole::Admin, OrgRole::Manager],
};

impl RoleRequirement {
    pub fn allows(&self, held: &[OrgRole]) -> bool {
        let held: HashSet<OrgRole> = held.iter().copied().collect();
        self.roles.iter().any(|role| held.contains(role))
    }
}

/// True iff the user holds one of the required roles within the organization.
/// Callers without a resolved organization never reach this point.
pub async fn authorize(
    orgs: &dyn OrganizationRepository,
    user_id: Uuid,
    organization_id: Uuid,
    requirement: RoleRequirement,
) -> Result<bool, sqlx::Error> {
    let held = orgs.roles_for_user(user_id, organization_id).await?;
    Ok(requirement.allows(&held))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::{test_org, MockOrganizationRepository};

    #[test]
    fn admin_only_accepts_exactly_admin() {
        assert!(ADMIN_ONLY.allows(&[OrgRole::Admin]));
        assert!(!ADMIN_ONLY.allows(&[OrgRole::Manager]));
        assert!(!ADMIN_ONLY.allows(&[OrgRole::Employee]));
        assert!(!ADMIN_ONLY.allows(&[]));
    }

    #[test]
    fn manager_or_admin_accepts_both() {
        assert!(MANAGER_OR_ADMIN.allows(&[OrgRole::Admin]));
        assert!(MANAGER_OR_ADMIN.allows(&[OrgRole::Manager]));
        assert!(!MANAGER_OR_ADMIN.allows(&[OrgRole::Employee]));
    }

    #[tokio::test]
    async fn authorize_checks_membership_in_the_given_org() {
        let org_a = test_org("A", "a");
        let org_b = test_org("B", "b");
        let repo = MockOrganizationRepository::with_orgs(vec![org_a.clone(), org_b.clone()]);

        let user = Uuid::new_v4();
        repo.insert_membership(user, org_a.id, OrgRole::Admin);
        repo.insert_membership(user, org_b.id, OrgRole::Employee);

        assert!(authorize(&repo, user, org_a.id, ADMIN_ONLY).await.unwrap());
        assert!(!authorize(&repo, user, org_b.id, ADMIN_ONLY).await.unwrap());
        assert!(!authorize(&repo, user, org_b.id, MANAGER_OR_ADMIN)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn authorize_fails_without_membership() {
        let org = test_org("A", "a");
        let repo = MockOrganizationRepository::with_orgs(vec![org.clone()]);

        assert!(!authorize(&repo, Uuid::new_v4(), org.id, ADMIN_ONLY)
            .await
            .unwrap());
    }
}
