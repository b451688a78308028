pub mod account;
pub mod money;
pub mod pattern;
pub mod period;
pub mod result;
pub mod transaction;

pub use account::{account_code, AccountType, GATEWAY_ACCOUNTS};
pub use money::{Money, MoneyError};
pub use pattern::{KnownPattern, NewPattern};
pub use period::{MonthKey, PeriodError};
pub use result::ProcessingResult;
pub use transaction::{
    NaturalKey, NewTransaction, RawTransaction, Transaction, TransferType, UNCATEGORIZED,
};
