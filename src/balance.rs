//! Pure helpers for classifying and displaying signed client balances.
//!
//! The sign convention across the whole crate: a negative balance is money the
//! client still owes the company, a positive balance is credit held for the
//! client, and zero is fully settled.

use std::{fmt::Display, str::FromStr, sync::OnceLock};

use numfmt::{Formatter, Precision};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    translation::{Lang, translate},
};

/// A currency in which client balances are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Chinese renminbi.
    Rmb,
    /// United States dollar.
    Usd,
    /// Sudanese pound.
    Sdg,
    /// United Arab Emirates dirham.
    Aed,
}

impl Currency {
    /// All supported currencies, in display order.
    pub const ALL: [Currency; 4] = [Currency::Rmb, Currency::Usd, Currency::Sdg, Currency::Aed];

    /// The uppercase currency code, as stored in the database.
    pub fn code(self) -> &'static str {
        match self {
            Currency::Rmb => "RMB",
            Currency::Usd => "USD",
            Currency::Sdg => "SDG",
            Currency::Aed => "AED",
        }
    }

    /// The display prefix for amounts in this currency.
    ///
    /// RMB and USD have conventional symbols; the other currencies use their
    /// uppercase code followed by a space.
    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Rmb => "¥",
            Currency::Usd => "$",
            Currency::Sdg => "SDG ",
            Currency::Aed => "AED ",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RMB" => Ok(Currency::Rmb),
            "USD" => Ok(Currency::Usd),
            "SDG" => Ok(Currency::Sdg),
            "AED" => Ok(Currency::Aed),
            other => Err(Error::InvalidCurrency(other.to_owned())),
        }
    }
}

/// The category a signed balance falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceType {
    /// The client still owes the company money (negative balance).
    Debt,
    /// The company holds credit for the client (positive balance).
    Credit,
    /// The balance is fully settled.
    Zero,
}

/// Classify `balance` by its sign.
pub fn balance_type(balance: f64) -> BalanceType {
    if balance < 0.0 {
        BalanceType::Debt
    } else if balance > 0.0 {
        BalanceType::Credit
    } else {
        BalanceType::Zero
    }
}

/// The positive amount the client must still pay, or zero when nothing is
/// owed.
pub fn outstanding_amount(balance: f64) -> f64 {
    if balance < 0.0 { balance.abs() } else { 0.0 }
}

/// Whether a payment of `amount` can be accepted against `balance`.
///
/// A payment must be strictly positive and no larger than the outstanding
/// amount.
pub fn can_make_payment(balance: f64, amount: f64) -> bool {
    amount > 0.0 && outstanding_amount(balance) >= amount
}

/// Format a signed balance for display.
///
/// The magnitude is rendered to two decimal places, prefixed with the currency
/// symbol when `show_symbol` is set. Nonzero balances carry a localized suffix
/// naming the side of the ledger they fall on; zero renders as `0.00` with no
/// suffix.
pub fn format_balance(balance: f64, currency: Currency, show_symbol: bool, lang: Lang) -> String {
    let symbol = if show_symbol { currency.symbol() } else { "" };
    let magnitude = format_magnitude(balance.abs());

    match balance_type(balance) {
        BalanceType::Zero => format!("{symbol}{magnitude}"),
        BalanceType::Debt => {
            format!("{symbol}{magnitude} {}", translate(lang, "balance.debt"))
        }
        BalanceType::Credit => {
            format!("{symbol}{magnitude} {}", translate(lang, "balance.credit"))
        }
    }
}

fn format_magnitude(magnitude: f64) -> String {
    static MAGNITUDE_FMT: OnceLock<Formatter> = OnceLock::new();

    let fmt = MAGNITUDE_FMT.get_or_init(|| {
        Formatter::currency("")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    if magnitude == 0.0 {
        // Zero is hardcoded as "0", so we must specify the formatted string for zero
        return "0.00".to_owned();
    }

    let mut formatted = fmt.fmt_string(magnitude);

    // numfmt omits trailing zeros, so pad the string back out to two decimals.
    // For example, "12.30" is rendered as "12.3".
    match formatted.rfind('.') {
        None => formatted.push_str(".00"),
        Some(index) if formatted.len() - index == 2 => formatted.push('0'),
        _ => {}
    }

    formatted
}

#[cfg(test)]
mod balance_type_tests {
    use super::{BalanceType, balance_type, outstanding_amount};

    #[test]
    fn negative_balance_is_debt() {
        assert_eq!(balance_type(-250.75), BalanceType::Debt);
        assert_eq!(balance_type(-0.01), BalanceType::Debt);
    }

    #[test]
    fn positive_balance_is_credit() {
        assert_eq!(balance_type(100.0), BalanceType::Credit);
        assert_eq!(balance_type(0.01), BalanceType::Credit);
    }

    #[test]
    fn zero_balance_is_zero() {
        assert_eq!(balance_type(0.0), BalanceType::Zero);
    }

    #[test]
    fn outstanding_amount_is_magnitude_of_debt() {
        assert_eq!(outstanding_amount(-250.75), 250.75);
    }

    #[test]
    fn outstanding_amount_is_zero_for_credit_and_zero() {
        assert_eq!(outstanding_amount(100.0), 0.0);
        assert_eq!(outstanding_amount(0.0), 0.0);
    }
}


#[cfg(test)]
mod format_balance_tests {
    use crate::translation::Lang;

    use super::{Currency, format_balance};

    /// Strip the symbol and suffix from a formatted balance and parse the
    /// two-decimal magnitude back out.
    fn parse_magnitude(formatted: &str) -> f64 {
        let digits: String = formatted
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        digits.parse().expect("formatted balance contains a number")
    }

    #[test]
    fn debt_has_symbol_and_localized_suffix() {
        let formatted = format_balance(-1250.5, Currency::Usd, true, Lang::En);

        assert_eq!(formatted, "$1,250.50 outstanding debt");
    }

    #[test]
    fn credit_has_localized_suffix() {
        let formatted = format_balance(300.0, Currency::Rmb, true, Lang::En);

        assert_eq!(formatted, "¥300.00 credit");
    }

    #[test]
    fn arabic_suffixes_are_used_for_arabic() {
        let debt = format_balance(-10.0, Currency::Aed, true, Lang::Ar);
        let credit = format_balance(10.0, Currency::Aed, true, Lang::Ar);

        assert_eq!(debt, "AED 10.00 دين مستحق");
        assert_eq!(credit, "AED 10.00 رصيد دائن");
    }

    #[test]
    fn zero_renders_without_suffix() {
        assert_eq!(format_balance(0.0, Currency::Sdg, true, Lang::En), "SDG 0.00");
        assert_eq!(format_balance(0.0, Currency::Usd, true, Lang::Ar), "$0.00");
    }

    #[test]
    fn symbol_can_be_omitted() {
        let formatted = format_balance(-42.5, Currency::Usd, false, Lang::En);

        assert_eq!(formatted, "42.50 outstanding debt");
    }

    #[test]
    fn magnitude_round_trips_for_every_currency() {
        for currency in Currency::ALL {
            for balance in [-123.45, -0.01, 0.0, 7.5, 999.99] {
                let formatted = format_balance(balance, currency, true, Lang::En);
                let magnitude = parse_magnitude(&formatted);

                assert!(
                    (magnitude - balance.abs()).abs() < 0.005,
                    "want {} from {formatted:?}, got {magnitude}",
                    balance.abs()
                );
            }
        }
    }

    #[test]
    fn currency_codes_round_trip() {
        for currency in Currency::ALL {
            let parsed: Currency = currency.code().parse().unwrap();
            assert_eq!(parsed, currency);
        }
    }

    #[test]
    fn unknown_currency_code_is_rejected() {
        assert!("EUR".parse::<Currency>().is_err());
    }
}
