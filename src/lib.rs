pub mod auth;
pub mod db;
pub mod notify;
pub mod routes;

use notify::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub db: db::Db,
    pub mailer: Mailer,
}
