use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::user::{Role, UserProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    exp: usize,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub club: bool,
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

pub fn verify_password(password: &str, hashed: &str) -> bool {
    verify(password, hashed).unwrap_or(false)
}

pub fn create_jwt(
    user_id: &str,
    role: Role,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(24))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_owned(),
        exp: expiration,
        admin: role == Role::Admin,
        club: role == Role::Club,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

/// Role precedence: token claims win; the profile document is the fallback
/// for roles granted after the token was minted; everyone else is a student.
pub fn resolve_role(claims: &Claims, profile: Option<&UserProfile>) -> Role {
    if claims.admin {
        return Role::Admin;
    }
    if claims.club {
        return Role::Club;
    }
    match profile.map(|p| p.role) {
        Some(Role::Admin) => Role::Admin,
        Some(Role::Club) => Role::Club,
        _ => Role::Student,
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub claims: Claims,
}

impl AuthUser {
    /// Role as far as the token alone can tell. Handlers that must honor a
    /// freshly granted role pass the profile document to `resolve_role`.
    pub fn claimed_role(&self) -> Role {
        resolve_role(&self.claims, None)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match request.rocket().state::<Config>() {
            Some(c) => c,
            None => return Outcome::Error((Status::InternalServerError, ())),
        };

        if let Some(auth_header) = request.headers().get_one("Authorization") {
            if let Some(token) = auth_header.strip_prefix("Bearer ") {
                let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
                if let Ok(token_data) = decode::<Claims>(
                    token,
                    &DecodingKey::from_secret(config.jwt_secret.as_ref()),
                    &validation,
                ) {
                    return Outcome::Success(AuthUser {
                        uid: token_data.claims.sub.clone(),
                        claims: token_data.claims,
                    });
                }
            }
        }

        Outcome::Error((Status::Unauthorized, ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(admin: bool, club: bool) -> Claims {
        Claims {
            sub: "uid".to_string(),
            exp: 0,
            admin,
            club,
        }
    }

    fn profile(role: Role) -> UserProfile {
        UserProfile {
            id: None,
            email: "u@example.edu".to_string(),
            password_hash: String::new(),
            name: "U".to_string(),
            department: "CSE".to_string(),
            year: 2,
            role,
            push_token: None,
            points: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn claims_take_precedence_over_profile() {
        let p = profile(Role::Student);
        assert_eq!(resolve_role(&claims(true, false), Some(&p)), Role::Admin);
        assert_eq!(resolve_role(&claims(false, true), Some(&p)), Role::Club);
    }

    #[test]
    fn profile_is_the_fallback() {
        assert_eq!(
            resolve_role(&claims(false, false), Some(&profile(Role::Club))),
            Role::Club
        );
        assert_eq!(
            resolve_role(&claims(false, false), Some(&profile(Role::Admin))),
            Role::Admin
        );
        assert_eq!(
            resolve_role(&claims(false, false), Some(&profile(Role::Student))),
            Role::Student
        );
        assert_eq!(resolve_role(&claims(false, false), None), Role::Student);
    }

    #[test]
    fn password_roundtrip() {
        let hashed = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hashed));
        assert!(!verify_password("hunter3", &hashed));
    }
}
