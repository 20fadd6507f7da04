pub mod app;
pub mod commands;
pub mod context;
pub mod credentials;
pub mod dispatch;
pub mod env;
pub mod exercise;
pub mod info;
pub mod policy;
pub mod profiles;
pub mod runtime;

pub use app::run;
