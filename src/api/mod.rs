use rocket::Route;

mod admin;
mod auth;
mod ballot;
mod common;
mod results;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(ballot::routes());
    routes.extend(results::routes());
    routes.extend(admin::routes());
    routes
}
