pub mod password;
pub mod secret;
pub mod validation;

pub use password::{hash_password, verify_password, Password};
pub use secret::{constant_time_eq, generate_otp, hash_token};
pub use validation::{non_blank, ValidatedJson};
