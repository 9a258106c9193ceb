pub mod credentials;
pub mod extractors;
pub mod token;

pub use credentials::{ClientKey, SponsorCredentials};
pub use extractors::AdminAuth;
pub use token::generate_idempotency_key;
