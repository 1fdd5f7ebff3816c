pub mod init;
pub mod practice;
pub mod validate;
