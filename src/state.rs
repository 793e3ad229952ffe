use std::sync::Arc;

use crate::config::Config;
use crate::db::{
    organization_repository::OrganizationRepository, project_repository::ProjectRepository,
    user_repository::UserRepository,
};
use crate::utils::jwt::JwtKeys;
use crate::worker::EmailQueue;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub orgs: Arc<dyn OrganizationRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub email_queue: EmailQueue,
    pub jwt: JwtKeys,
    pub config: Arc<Config>,
}
