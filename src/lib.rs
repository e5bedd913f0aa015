pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod ledger;
pub mod memory;
pub mod surface;
pub mod types;
pub mod wallet;

pub mod test_helpers;

pub use controller::{
    SessionController,
    SessionEvent,
    SessionHandle,
    UserAction,
};
pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
