pub mod database;
pub mod error;
pub mod password;
pub mod schema;
pub mod users;
pub mod validation;

pub use database::Database;
pub use error::StoreError;
pub use users::{NewUser, User, UserRepo};
pub use validation::{RegistrationForm, ValidationError};
