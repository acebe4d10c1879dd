pub mod diff;
pub mod init;
pub mod status;
pub mod sync;
