use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct SignupPayload {
    pub org_name: String,
    #[serde(default)]
    pub org_slug: Option<String>,
    pub email: String,
    pub username: String,
    pub password: String,
}
