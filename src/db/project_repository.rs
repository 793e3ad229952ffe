use async_trait::async_trait;
use uuid::Uuid;

use crate::models::organization::OrgRole;
use crate::models::project::Project;

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create_project(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<Project, sqlx::Error>;
    /// Only rows belonging to the given organization; tenant isolation lives
    /// in this WHERE clause.
    async fn list_projects(&self, organization_id: Uuid) -> Result<Vec<Project>, sqlx::Error>;
    async fn find_project(
        &self,
        organization_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, sqlx::Error>;
    async fn add_project_member(
        &self,
        organization_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<(), sqlx::Error>;
}
