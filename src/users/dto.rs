use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::users::repo_types::User;

/// Request body for user creation.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for a partial update. Absent or `null` fields are left as they are.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Raw pagination query; anything unparsable falls back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserResponse>,
    pub total_count: i64,
    pub page: i64,
    pub per_page: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_response_never_carries_password() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: 7,
            username: "johndoe".into(),
            email: "john@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let row_json = serde_json::to_value(&user).unwrap();
        assert!(row_json.get("password_hash").is_none());

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 5);
        assert!(!json.to_string().contains("argon2"));
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn update_request_tracks_presence() {
        let req: UpdateUserRequest =
            serde_json::from_str(r#"{"email":"new@example.com","username":null}"#).unwrap();
        assert_eq!(req.email.as_deref(), Some("new@example.com"));
        assert!(req.username.is_none());
        assert!(req.password.is_none());
    }
}
