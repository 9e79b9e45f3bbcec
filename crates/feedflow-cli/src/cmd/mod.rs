pub mod plan;
pub mod status;
pub mod sync;
pub mod watch;
