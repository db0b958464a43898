pub mod idp_client;
pub mod liveness;
pub mod local_login;
pub mod oauth_exchange;
pub mod orchestrator;
pub mod session_lifecycle;
