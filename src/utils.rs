pub mod confirmation_code;
pub mod rating;
pub mod token;
