use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub nickname: String,
    pub birthday: String,
    pub introduction: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileUpdate {
    pub nickname: String,
    pub birthday: String,
    pub introduction: String,
}

/// Public view of a user, as returned by the profile endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub email: String,
    #[serde(rename = "nickName")]
    pub nickname: String,
    pub birthday: String,
    pub introduction: String,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            nickname: user.nickname,
            birthday: user.birthday,
            introduction: user.introduction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: i64,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: i64, token_hash: String, max_age: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            created_at: now,
            last_activity: now,
            expires_at: now + max_age,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry() {
        let session = Session::new(7, "hash".into(), chrono::Duration::seconds(60));
        assert!(!session.is_expired_at(Utc::now()));
        assert!(session.is_expired_at(session.expires_at + chrono::Duration::seconds(1)));
        assert_eq!(session.created_at, session.last_activity);
    }

    #[test]
    fn test_profile_field_names() {
        let now = Utc::now();
        let user = User {
            id: 3,
            email: "alice@example.com".into(),
            password_hash: "secret-hash".into(),
            nickname: "alice".into(),
            birthday: "1990-01-02".into(),
            introduction: "hi".into(),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(Profile::from(user)).unwrap();
        assert_eq!(json["userId"], 3);
        assert_eq!(json["nickName"], "alice");
        assert_eq!(json["birthday"], "1990-01-02");
        assert!(json.get("password_hash").is_none());
    }
}
