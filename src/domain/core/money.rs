use std::fmt::Display;

use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};

/// 通貨
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    EUR,
}

impl Currency {
    /// 補助単位の桁数
    pub fn exponent(&self) -> u32 {
        match self {
            Currency::EUR => 2,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::EUR => "€",
        }
    }
}

/// 金額（補助単位で保持する）
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money {
    amount: u64,
    currency: Currency,
}

impl Money {
    pub fn new(amount: u64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn eur(amount: u64) -> Self {
        Self::new(amount, Currency::EUR)
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = 10u64.pow(self.currency.exponent());
        let major = (self.amount / unit).to_formatted_string(&Locale::es);
        let minor = self.amount % unit;
        write!(
            f,
            "{},{:0width$} {}",
            major,
            minor,
            self.currency.symbol(),
            width = self.currency.exponent() as usize
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display() {
        assert_eq!(Money::eur(4500).to_string(), "45,00 €");
        assert_eq!(Money::eur(4999).to_string(), "49,99 €");
        assert_eq!(Money::eur(5).to_string(), "0,05 €");
    }
}
