pub mod auth;
pub mod delivery;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod export;
pub mod gateway;
pub mod rate;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
