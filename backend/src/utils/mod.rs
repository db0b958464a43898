pub mod cookies;
pub mod password;
pub mod secret;
pub mod time;

pub use password::*;
pub use secret::*;
pub use time::*;
