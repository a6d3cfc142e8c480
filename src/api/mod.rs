use rocket::Route;

mod common;
pub mod comments;
pub mod likes;
pub mod posts;
pub mod users;
pub mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(users::routes());
    routes.extend(posts::routes());
    routes.extend(votes::routes());
    routes.extend(comments::routes());
    routes.extend(likes::routes());
    routes
}
