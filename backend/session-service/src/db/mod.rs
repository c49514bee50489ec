/// Database repositories
pub mod principals;
pub mod token_revocation;
