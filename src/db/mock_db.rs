//! In-memory repository implementations backing the router tests. They model
//! the same uniqueness rules the Postgres schema enforces, including unique
//! violations with the real constraint names so retry paths can be exercised.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::organization::{Membership, MembershipSummary, Organization, OrgRole};
use crate::models::project::Project;
use crate::models::user::{PublicUser, User};

use super::organization_repository::OrganizationRepository;
use super::project_repository::ProjectRepository;
use super::user_repository::UserRepository;

#[derive(Debug)]
struct MockUniqueViolation {
    constraint: &'static str,
}

impl fmt::Display for MockUniqueViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duplicate key value violates unique constraint \"{}\"",
            self.constraint
        )
    }
}

impl StdError for MockUniqueViolation {}

impl sqlx::error::DatabaseError for MockUniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.constraint)
    }

    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }
}

pub fn unique_violation(constraint: &'static str) -> sqlx::Error {
    sqlx::Error::Database(Box::new(MockUniqueViolation { constraint }))
}

pub fn test_user(username: &str, email: &str, password_hash: &str) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        created_at: OffsetDateTime::now_utc(),
    }
}

pub fn test_org(name: &str, slug: &str) -> Organization {
    Organization {
        id: Uuid::new_v4(),
        name: name.to_string(),
        slug: slug.to_string(),
        created_at: OffsetDateTime::now_utc(),
    }
}

#[derive(Default)]
pub struct MockUserRepository {
    pub users: Mutex<Vec<User>>,
    pub should_fail: bool,
}

impl MockUserRepository {
    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Default::default()
        }
    }

    fn guard(&self) -> Result<(), sqlx::Error> {
        if self.should_fail {
            Err(sqlx::Error::PoolClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        self.guard()?;
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.username == username) {
            return Err(unique_violation("users_username_key"));
        }
        if users.iter().any(|u| u.email == email) {
            return Err(unique_violation("users_email_key"));
        }
        let user = test_user(username, email, password_hash);
        users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        self.guard()?;
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        self.guard()?;
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        self.guard()?;
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_public_user_by_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PublicUser>, sqlx::Error> {
        Ok(self
            .find_user_by_id(user_id)
            .await?
            .as_ref()
            .map(PublicUser::from))
    }

    async fn get_or_create_by_email(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<(User, bool), sqlx::Error> {
        self.guard()?;
        if let Some(existing) = self.find_user_by_email(email).await? {
            return Ok((existing, false));
        }
        let user = self.create_user(email, email, password_hash).await?;
        Ok((user, true))
    }

    async fn update_user_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        self.guard()?;
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn is_username_taken(&self, username: &str) -> Result<bool, sqlx::Error> {
        Ok(self.find_user_by_username(username).await?.is_some())
    }

    async fn is_email_taken(&self, email: &str) -> Result<bool, sqlx::Error> {
        Ok(self.find_user_by_email(email).await?.is_some())
    }
}

#[derive(Default)]
pub struct MockOrganizationRepository {
    pub orgs: Mutex<Vec<Organization>>,
    pub memberships: Mutex<Vec<Membership>>,
    pub should_fail: bool,
}

impl MockOrganizationRepository {
    pub fn with_orgs(orgs: Vec<Organization>) -> Self {
        Self {
            orgs: Mutex::new(orgs),
            ..Default::default()
        }
    }

    pub fn insert_membership(&self, user_id: Uuid, organization_id: Uuid, role: OrgRole) {
        self.insert_membership_at(user_id, organization_id, role, OffsetDateTime::now_utc());
    }

    pub fn insert_membership_at(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        role: OrgRole,
        joined_at: OffsetDateTime,
    ) {
        self.memberships.lock().unwrap().push(Membership {
            user_id,
            organization_id,
            role,
            joined_at,
        });
    }

    pub fn membership_count(&self, user_id: Uuid, organization_id: Uuid) -> usize {
        self.memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id && m.organization_id == organization_id)
            .count()
    }

    fn guard(&self) -> Result<(), sqlx::Error> {
        if self.should_fail {
            Err(sqlx::Error::PoolClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OrganizationRepository for MockOrganizationRepository {
    async fn create_organization(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<Organization, sqlx::Error> {
        self.guard()?;
        let mut orgs = self.orgs.lock().unwrap();
        if orgs.iter().any(|o| o.name == name) {
            return Err(unique_violation("organizations_name_key"));
        }
        if orgs.iter().any(|o| o.slug == slug) {
            return Err(unique_violation("organizations_slug_key"));
        }
        let org = test_org(name, slug);
        orgs.push(org.clone());
        Ok(org)
    }

    async fn delete_organization(&self, org_id: Uuid) -> Result<(), sqlx::Error> {
        self.guard()?;
        self.orgs.lock().unwrap().retain(|o| o.id != org_id);
        self.memberships
            .lock()
            .unwrap()
            .retain(|m| m.organization_id != org_id);
        Ok(())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>, sqlx::Error> {
        self.guard()?;
        let orgs = self.orgs.lock().unwrap();
        Ok(orgs.iter().find(|o| o.slug == slug).cloned())
    }

    async fn find_by_id(&self, org_id: Uuid) -> Result<Option<Organization>, sqlx::Error> {
        self.guard()?;
        let orgs = self.orgs.lock().unwrap();
        Ok(orgs.iter().find(|o| o.id == org_id).cloned())
    }

    async fn add_member(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<(), sqlx::Error> {
        self.guard()?;
        let mut memberships = self.memberships.lock().unwrap();
        let exists = memberships
            .iter()
            .any(|m| m.user_id == user_id && m.organization_id == organization_id);
        if !exists {
            memberships.push(Membership {
                user_id,
                organization_id,
                role,
                joined_at: OffsetDateTime::now_utc(),
            });
        }
        Ok(())
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, sqlx::Error> {
        self.guard()?;
        let memberships = self.memberships.lock().unwrap();
        Ok(memberships
            .iter()
            .find(|m| m.user_id == user_id && m.organization_id == organization_id)
            .cloned())
    }

    async fn roles_for_user(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<OrgRole>, sqlx::Error> {
        Ok(self
            .find_membership(user_id, organization_id)
            .await?
            .map(|m| vec![m.role])
            .unwrap_or_default())
    }

    async fn list_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<MembershipSummary>, sqlx::Error> {
        self.guard()?;
        let memberships = self.memberships.lock().unwrap();
        let orgs = self.orgs.lock().unwrap();

        let mut summaries: Vec<MembershipSummary> = memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                orgs.iter()
                    .find(|o| o.id == m.organization_id)
                    .map(|org| MembershipSummary {
                        organization: org.clone(),
                        role: m.role,
                        joined_at: m.joined_at,
                    })
            })
            .collect();
        summaries.sort_by_key(|s| s.joined_at);
        Ok(summaries)
    }
}

#[derive(Default)]
pub struct MockProjectRepository {
    pub projects: Mutex<Vec<Project>>,
    pub members: Mutex<Vec<(Uuid, Uuid, Uuid, OrgRole)>>,
    pub should_fail: bool,
}

impl MockProjectRepository {
    pub fn insert_project(&self, organization_id: Uuid, name: &str) -> Project {
        let now = OffsetDateTime::now_utc();
        let project = Project {
            id: Uuid::new_v4(),
            organization_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.projects.lock().unwrap().push(project.clone());
        project
    }

    fn guard(&self) -> Result<(), sqlx::Error> {
        if self.should_fail {
            Err(sqlx::Error::PoolClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProjectRepository for MockProjectRepository {
    async fn create_project(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<Project, sqlx::Error> {
        self.guard()?;
        Ok(self.insert_project(organization_id, name))
    }

    async fn list_projects(&self, organization_id: Uuid) -> Result<Vec<Project>, sqlx::Error> {
        self.guard()?;
        let projects = self.projects.lock().unwrap();
        Ok(projects
            .iter()
            .filter(|p| p.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn find_project(
        &self,
        organization_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, sqlx::Error> {
        self.guard()?;
        let projects = self.projects.lock().unwrap();
        Ok(projects
            .iter()
            .find(|p| p.organization_id == organization_id && p.id == project_id)
            .cloned())
    }

    async fn add_project_member(
        &self,
        organization_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<(), sqlx::Error> {
        self.guard()?;
        let mut members = self.members.lock().unwrap();
        let exists = members
            .iter()
            .any(|(o, p, u, _)| *o == organization_id && *p == project_id && *u == user_id);
        if !exists {
            members.push((organization_id, project_id, user_id, role));
        }
        Ok(())
    }
}
