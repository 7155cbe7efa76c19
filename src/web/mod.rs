pub mod admin;
pub mod auth;
pub mod challenge;
pub mod comments;
pub mod content;
pub mod error;
pub mod leaderboard;
pub mod points;
pub mod stranger;
pub mod votes;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Route resolution will stop at the first match.
    auth::configure(conf);
    content::configure(conf);
    votes::configure(conf);
    comments::configure(conf);
    points::configure(conf);
    challenge::configure(conf);
    leaderboard::configure(conf);
    stranger::configure(conf);
    admin::configure(conf);
}
