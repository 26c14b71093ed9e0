use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            admin::{AdminCredentials, SessionInfo},
            auth::{AdminSession, SESSION_COOKIE},
        },
        db::Admin,
        mongodb::Coll,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![authenticate, session_info, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<Json<SessionInfo>> {
    let with_username = doc! {
        "username": &credentials.username
    };

    let admin = admins
        .find_one(with_username, None)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No admin found with the provided username and password combination.".to_string(),
            )
        })?;

    let session = AdminSession::for_admin(&admin);
    let info = SessionInfo::from(&session);
    cookies.add(session.into_cookie(config));

    Ok(Json(info))
}

/// Describe the logged-in admin, so clients can tailor what they offer.
#[get("/auth/session")]
pub fn session_info(session: AdminSession) -> Json<SessionInfo> {
    Json(SessionInfo::from(&session))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(SESSION_COOKIE));
    Status::Ok
}
