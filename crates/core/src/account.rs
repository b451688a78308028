use serde::{Deserialize, Serialize};
use std::fmt;

/// Bank gateway name → short account code. Several names may map to the same code.
pub const GATEWAY_ACCOUNTS: &[(&str, &str)] = &[
    ("Vietcombank", "VCB"),
    ("BIDV", "BIDV"),
    ("MB", "MB"),
    ("MBBank", "MB"),
    ("Techcombank", "TCB"),
    ("VPBank", "VPB"),
    ("ACB", "ACB"),
    ("Sacombank", "STB"),
    ("Agribank", "AGB"),
    ("VietinBank", "CTG"),
];

/// Short account code for a gateway. Unknown gateways pass through unchanged.
pub fn account_code(gateway: &str) -> &str {
    GATEWAY_ACCOUNTS
        .iter()
        .find(|(name, _)| *name == gateway)
        .map(|(_, code)| *code)
        .unwrap_or(gateway)
}

/// Budget grouping used by the `category_mapping` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Need,
    Fun,
    Invest,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [AccountType::Need, AccountType::Fun, AccountType::Invest];

    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Need => "Need",
            AccountType::Fun => "Fun",
            AccountType::Invest => "Invest",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "need" => Ok(AccountType::Need),
            "fun" => Ok(AccountType::Fun),
            "invest" => Ok(AccountType::Invest),
            other => Err(format!("Unknown account type: '{other}'")),
        }
    }
}
