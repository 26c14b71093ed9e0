use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    db::admin::Admin,
    mongodb::{Coll, Id},
};

use super::{AdminRole, Capability};

pub const SESSION_COOKIE: &str = "admin_session";

/// An authenticated admin session, carried in a signed cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminSession {
    pub id: Id,
    #[serde(rename = "unm")]
    pub username: String,
    #[serde(rename = "rol")]
    pub role: AdminRole,
}

impl AdminSession {
    /// Create a new session for the given admin.
    pub fn for_admin(admin: &Admin) -> Self {
        Self {
            id: admin.id,
            username: admin.username.clone(),
            role: admin.role,
        }
    }

    /// Does this session permit the given action?
    pub fn permits(&self, capability: Capability) -> bool {
        self.role.capabilities().contains(capability)
    }

    /// Reject with 403 unless this session permits the given action.
    pub fn require(&self, capability: Capability) -> Result<(), Error> {
        if self.permits(capability) {
            Ok(())
        } else {
            Err(Error::Status(
                Status::Forbidden,
                format!("This action requires the {capability:?} capability."),
            ))
        }
    }

    #[allow(clippy::missing_panics_doc)]
    /// Serialize this session into a cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            session: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build((SESSION_COOKIE, token))
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    /// Deserialize a session from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, Error> {
        let session = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.session)?;
        Ok(session)
    }
}

/// Cookie claims: the session itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    session: AdminSession,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminSession {
    type Error = Error;

    /// Get an [`AdminSession`] from the cookie, rejecting the request outright
    /// if it is missing, expired or forged, or if the admin no longer exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = match req.cookies().get(SESSION_COOKIE) {
            Some(cookie) => cookie,
            None => {
                return Outcome::Error((
                    Status::Unauthorized,
                    Error::Status(
                        Status::Unauthorized,
                        "This endpoint requires admin authentication.".to_string(),
                    ),
                ));
            }
        };

        let session = match Self::from_cookie(cookie, config) {
            Ok(session) => session,
            Err(err) => return Outcome::Error((Status::Unauthorized, err)),
        };

        // Check the admin account still exists.
        let db = req.guard::<&State<mongodb::Database>>().await.unwrap();
        let admin = Coll::<Admin>::from_db(db)
            .find_one(session.id.as_doc(), None)
            .await;
        match admin {
            Ok(Some(_)) => Outcome::Success(session),
            Ok(None) => Outcome::Error((
                Status::Unauthorized,
                Error::Status(
                    Status::Unauthorized,
                    "The authenticated admin no longer exists.".to_string(),
                ),
            )),
            Err(e) => Outcome::Error((Status::InternalServerError, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_round_trip() {
        let config = Config::example();
        let session = AdminSession {
            id: Id::new(),
            username: "coordinator".to_string(),
            role: AdminRole::SuperAdmin,
        };
        let id = session.id;

        let cookie = session.into_cookie(&config);
        assert_eq!(SESSION_COOKIE, cookie.name());
        assert_eq!(Some(SameSite::Strict), cookie.same_site());
        assert_eq!(Some(true), cookie.http_only());

        let decoded = AdminSession::from_cookie(&cookie, &config).unwrap();
        assert_eq!(id, decoded.id);
        assert_eq!("coordinator", decoded.username);
        assert_eq!(AdminRole::SuperAdmin, decoded.role);
    }

    #[test]
    fn forged_cookie_is_rejected() {
        let config = Config::example();
        let session = AdminSession {
            id: Id::new(),
            username: "coordinator".to_string(),
            role: AdminRole::Viewer,
        };

        let mut cookie = session.into_cookie(&config);
        let mut forged = cookie.value().to_string();
        // Flip a character in the signature.
        let tail = forged.pop().unwrap();
        forged.push(if tail == 'A' { 'B' } else { 'A' });
        cookie.set_value(forged);

        assert!(AdminSession::from_cookie(&cookie, &config).is_err());
    }

    #[test]
    fn require_enforces_capabilities() {
        let session = AdminSession {
            id: Id::new(),
            username: "observer".to_string(),
            role: AdminRole::Viewer,
        };

        assert!(session.require(Capability::ViewResults).is_ok());
        assert!(matches!(
            session.require(Capability::ManageVoters),
            Err(Error::Status(Status::Forbidden, _))
        ));
    }
}
