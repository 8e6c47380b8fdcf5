/// Authentication module
///
/// Generation of the opaque access/refresh token pair handed out on rotation.

mod token;

pub use token::fingerprint;
pub use token::SecureTokenGenerator;
pub use token::TokenGenerator;
