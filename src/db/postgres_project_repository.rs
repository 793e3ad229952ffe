use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::organization::OrgRole;
use crate::models::project::Project;

use super::project_repository::ProjectRepository;

pub struct PostgresProjectRepository {
    pub pool: PgPool,
}

#[async_trait]
impl ProjectRepository for PostgresProjectRepository {
    async fn create_project(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<Project, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (organization_id, name, created_at, updated_at)
            VALUES ($1, $2, now(), now())
            RETURNING id, organization_id, name, created_at, updated_at
            "#,
        )
        .bind(organization_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_projects(&self, organization_id: Uuid) -> Result<Vec<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, organization_id, name, created_at, updated_at
            FROM projects
            WHERE organization_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn find_project(
        &self,
        organization_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, organization_id, name, created_at, updated_at
            FROM projects
            WHERE organization_id = $1 AND id = $2
            "#,
        )
        .bind(organization_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn add_project_member(
        &self,
        organization_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO project_members (organization_id, project_id, user_id, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (organization_id, project_id, user_id) DO NOTHING
            "#,
        )
        .bind(organization_id)
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
