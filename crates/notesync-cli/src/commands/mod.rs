pub mod common;
pub mod history;
pub mod mode;
pub mod pull;
pub mod restore;
pub mod save;
pub mod show;
pub mod write;
