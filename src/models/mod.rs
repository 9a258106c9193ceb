pub mod access_token;
pub mod charge;
pub mod owner;
pub mod rate_limit;
pub mod usage;

pub use access_token::AccessToken;
pub use charge::{Charge, ChargeOutcome, NewCharge};
pub use owner::{InitializeOwner, Owner, OwnerProfile};
pub use rate_limit::{RateLimitCheck, RateLimitHeaders, RateLimitOptions, RateLimitState};
pub use usage::UsageEntry;
