mod balance;
mod currency;
mod ids;
mod ledger;
mod money;

pub use balance::*;
pub use currency::*;
pub use ids::*;
pub use ledger::*;
pub use money::*;
