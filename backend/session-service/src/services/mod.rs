/// Business logic for the session and trust lifecycle
pub mod lockout;
pub mod revocation;
pub mod rotation;
pub mod session;
pub mod tokens;
pub mod two_factor;

pub use lockout::{BruteForceGuard, LockoutChannel, LockoutPolicy};
pub use revocation::{RetryPolicy, RevocationRegistry};
pub use rotation::RotationService;
pub use session::SessionService;
pub use tokens::{IssuedPair, TokenService};
pub use two_factor::{TotpEnrollment, TwoFactorService};
