pub mod organization;
pub mod project;
pub mod signup;
pub mod user;
