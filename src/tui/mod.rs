//! Terminal user interface: live token list with refresh, revoke and delete

mod app;
mod ui;

pub use app::run;
