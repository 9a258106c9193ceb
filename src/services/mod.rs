pub mod ledger;
pub mod rate_limit;
pub mod sponsor;
pub mod usage;

pub use ledger::LedgerService;
pub use rate_limit::{now_ms, RateLimitService};
pub use sponsor::{ChargePolicy, SponsorService, SponsorStatus};
pub use usage::{aggregate_usage, source_hostname};
