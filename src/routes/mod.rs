pub mod health;
pub mod ledger;
pub mod ratelimit;
pub mod sponsor;
