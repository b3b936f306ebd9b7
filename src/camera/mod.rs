pub mod onvif;
pub mod port;
pub mod session;
