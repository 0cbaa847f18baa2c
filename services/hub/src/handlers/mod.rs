pub mod attendance;
pub mod qrcode;
pub mod registration;
pub mod response;
pub mod user;
