pub mod password;
pub mod resolver;
pub mod token_issuer;

pub use resolver::authenticate;
pub use token_issuer::{TokenError, TokenIssuer};
