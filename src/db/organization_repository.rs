use async_trait::async_trait;
use uuid::Uuid;

use crate::models::organization::{Membership, MembershipSummary, Organization, OrgRole};

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Insert a new organization. Name and slug uniqueness is enforced by the
    /// store; callers retry slug collisions with a suffixed candidate.
    async fn create_organization(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<Organization, sqlx::Error>;
    /// Cleanup path for half-finished signups; cascades to memberships and
    /// projects.
    async fn delete_organization(&self, org_id: Uuid) -> Result<(), sqlx::Error>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>, sqlx::Error>;
    async fn find_by_id(&self, org_id: Uuid) -> Result<Option<Organization>, sqlx::Error>;
    /// Idempotent: re-adding an existing (user, org) pair is a no-op and the
    /// original role is kept.
    async fn add_member(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<(), sqlx::Error>;
    async fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, sqlx::Error>;
    async fn roles_for_user(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<OrgRole>, sqlx::Error>;
    /// Memberships ordered by joined_at ascending; the head is the
    /// deterministic fallback organization for tenant resolution.
    async fn list_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<MembershipSummary>, sqlx::Error>;
}
