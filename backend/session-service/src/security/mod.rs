/// Security primitives for session-service
///
/// - **password**: Argon2id password hashing
/// - **token**: bearer token minting and decoding (HS256)
/// - **totp**: time-based one-time codes with skew tolerance
pub mod password;
pub mod token;
pub mod totp;

pub use password::{hash_password, verify_password};
pub use token::{Claims, IssuedToken, TokenSigner};
pub use totp::TotpGenerator;
