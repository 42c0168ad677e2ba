pub mod cancel;
pub mod models;
pub mod resume;
pub mod status;
pub mod train;
pub mod watch;
