use serde::{Deserialize, Serialize};

/// Authenticated principal as returned by the login and identity endpoints.
///
/// `role_id`/`is_hr` drive role-scoped views; `department_*` link hiring
/// managers to their department and are null for HR staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role_id: i64,
    pub department_id: Option<i64>,
    pub department_name: Option<String>,
    pub is_hr: bool,
}
