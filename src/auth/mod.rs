pub mod handlers;
pub mod profiles;
pub mod session;
pub mod users;
