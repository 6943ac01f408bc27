use rust_decimal::Decimal;
use std::fmt::{self, Display};
use std::ops::Neg;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Largest denominator GnuCash gets to see in `split:value` / `split:quantity`.
pub const MAX_DENOMINATOR: i128 = 1000;

/// Number formatting conventions of a CSV export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    /// `1,234.56`
    Us,
    /// `1.234,56`
    German,
}

impl Locale {
    fn thousands_separator(self) -> char {
        match self {
            Locale::Us => ',',
            Locale::German => '.',
        }
    }

    fn decimal_separator(self) -> char {
        match self {
            Locale::Us => '.',
            Locale::German => ',',
        }
    }
}

impl FromStr for Locale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "us" | "en" | "en_us" => Ok(Locale::Us),
            "de" | "german" | "de_de" => Ok(Locale::German),
            _ => Err(Error::InvalidLocale(s.to_string())),
        }
    }
}

/// Parse a locale formatted amount into an exact decimal.
///
/// Exports put the minus sign in odd places (`EUR -12,00`, `- 12.00`), so anything
/// up to and including the first `-` is dropped and the result is negated.
pub fn parse_amount(text: &str, locale: Locale) -> Result<Decimal> {
    let malformed = || Error::MalformedAmount {
        text: text.to_string(),
    };

    let trimmed = text.trim();
    let (negative, body) = match trimmed.find('-') {
        Some(index) => (true, trimmed[index + 1..].trim()),
        None => (false, trimmed),
    };
    let body: String = body
        .chars()
        .filter(|c| *c != locale.thousands_separator())
        .collect();

    let mut parts = body.split(locale.decimal_separator());
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next();
    if parts.next().is_some() {
        return Err(malformed());
    }

    let is_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if integer.is_empty() || !is_digits(integer) || !fraction.map_or(true, is_digits) {
        return Err(malformed());
    }

    let normalized = match fraction {
        Some(fraction) if !fraction.is_empty() => format!("{integer}.{fraction}"),
        _ => integer.to_string(),
    };
    let amount = Decimal::from_str_exact(&normalized).map_err(|_| malformed())?;
    Ok(if negative { -amount } else { amount })
}

/// An exact fraction as stored in a GnuCash split, e.g. `30864/25`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    numerator: i64,
    denominator: i64,
}

impl Rational {
    /// Returns `None` for a zero denominator. The fraction is reduced and the sign
    /// moved to the numerator.
    pub fn new(numerator: i64, denominator: i64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let divisor = gcd(numerator as i128, denominator as i128) as i64;
        let sign = denominator.signum();
        Some(Self {
            numerator: sign * numerator / divisor,
            denominator: sign * denominator / divisor,
        })
    }

    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    pub fn denominator(&self) -> i64 {
        self.denominator
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.numerator) / Decimal::from(self.denominator)
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        Rational {
            numerator: -self.numerator,
            denominator: self.denominator,
        }
    }
}

impl Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for Rational {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::MalformedAmount {
            text: s.to_string(),
        };
        let (numerator, denominator) = s.trim().split_once('/').ok_or_else(malformed)?;
        let numerator = numerator.parse().map_err(|_| malformed())?;
        let denominator = denominator.parse().map_err(|_| malformed())?;
        Rational::new(numerator, denominator).ok_or_else(malformed)
    }
}

/// Closest fraction to `amount` with a denominator of at most [MAX_DENOMINATOR].
///
/// Continued fraction best approximation. The magnitude is approximated and the sign
/// re-applied afterwards, so `x` and `-x` always map to exactly opposite fractions
/// and the splits of a posting keep summing to zero.
pub fn to_ledger_rational(amount: Decimal) -> Result<Rational> {
    let out_of_range = || Error::MalformedAmount {
        text: amount.to_string(),
    };
    let amount = amount.normalize();
    let numerator = amount.mantissa().abs();
    let denominator = 10i128.pow(amount.scale());
    let divisor = gcd(numerator, denominator);

    let (numerator, denominator) = limit_denominator(
        numerator / divisor,
        denominator / divisor,
        MAX_DENOMINATOR,
    );
    let numerator = if amount.is_sign_negative() {
        -numerator
    } else {
        numerator
    };
    Ok(Rational {
        numerator: i64::try_from(numerator).map_err(|_| out_of_range())?,
        denominator: i64::try_from(denominator).map_err(|_| out_of_range())?,
    })
}

/// `numerator / denominator` must be non-negative and reduced.
fn limit_denominator(numerator: i128, denominator: i128, max_denominator: i128) -> (i128, i128) {
    if denominator <= max_denominator {
        return (numerator, denominator);
    }

    let (mut p0, mut q0, mut p1, mut q1) = (0i128, 1i128, 1i128, 0i128);
    let (mut n, mut d) = (numerator, denominator);
    loop {
        let a = n / d;
        let q2 = q0 + a * q1;
        if q2 > max_denominator {
            break;
        }
        (p0, q0, p1, q1) = (p1, q1, p0 + a * p1, q2);
        (n, d) = (d, n - a * d);
    }

    let k = (max_denominator - q0) / q1;
    let bound1 = (p0 + k * p1, q0 + k * q1);
    let bound2 = (p1, q1);

    // |p/q - numerator/denominator|, scaled by denominator
    let distance_times = |(p, q): (i128, i128), other_q: i128| {
        (p * denominator - numerator * q).abs() * other_q
    };
    let best = if distance_times(bound2, bound1.1) <= distance_times(bound1, bound2.1) {
        bound2
    } else {
        bound1
    };
    let divisor = gcd(best.0, best.1);
    (best.0 / divisor, best.1 / divisor)
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    if a == 0 {
        1
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Locale::German, "1.234,56", Decimal::new(123456, 2))]
    #[case(Locale::Us, "1,234.56", Decimal::new(123456, 2))]
    #[case(Locale::German, "12,5", Decimal::new(125, 1))]
    #[case(Locale::Us, "12.5", Decimal::new(125, 1))]
    #[case(Locale::Us, "12", Decimal::new(12, 0))]
    #[case(Locale::Us, "12.", Decimal::new(12, 0))]
    #[case(Locale::German, "-0,99", Decimal::new(-99, 2))]
    #[case(Locale::Us, " -1,000.00 ", Decimal::new(-100000, 2))]
    #[case(Locale::Us, "EUR -5.10", Decimal::new(-510, 2))]
    #[case(Locale::German, "- 3,00", Decimal::new(-300, 2))]
    fn test_parse_amount(#[case] locale: Locale, #[case] input: &str, #[case] expected: Decimal) {
        assert_eq!(expected, parse_amount(input, locale).unwrap());
    }

    #[rstest]
    #[case(Locale::Us, "1.2.3")]
    #[case(Locale::German, "1,2,3")]
    #[case(Locale::Us, "")]
    #[case(Locale::Us, "-")]
    #[case(Locale::Us, "abc")]
    #[case(Locale::Us, ".50")]
    #[case(Locale::German, "12,5x")]
    fn malformed_amount(#[case] locale: Locale, #[case] input: &str) {
        assert!(matches!(
            parse_amount(input, locale),
            Err(Error::MalformedAmount { .. })
        ));
    }

    #[test]
    fn locale_from_str() {
        assert_eq!(Locale::Us, "us".parse().unwrap());
        assert_eq!(Locale::German, "DE".parse().unwrap());
        assert!(matches!(
            "fr".parse::<Locale>(),
            Err(Error::InvalidLocale(_))
        ));
    }

    #[rstest]
    #[case(Decimal::new(123456, 2), "30864/25")]
    #[case(Decimal::new(-123456, 2), "-30864/25")]
    #[case(Decimal::new(100, 0), "100/1")]
    #[case(Decimal::new(0, 2), "0/1")]
    #[case(Decimal::new(5, 1), "1/2")]
    #[case(Decimal::new(1, 3), "1/1000")]
    // 0.0001 is closer to 0/1 than to 1/1000
    #[case(Decimal::new(1, 4), "0/1")]
    #[case(Decimal::new(3333, 4), "1/3")]
    #[case(Decimal::new(31415926, 7), "355/113")]
    fn test_to_ledger_rational(#[case] input: Decimal, #[case] expected: &str) {
        assert_eq!(expected, to_ledger_rational(input).unwrap().to_string());
    }

    #[test]
    fn ledger_rational_is_within_a_thousandth() {
        let inputs = [
            ("1.234,56", Locale::German),
            ("1,234.56", Locale::Us),
            ("0,001", Locale::German),
            ("-99.999", Locale::Us),
            ("12345,6789", Locale::German),
            ("0.3333", Locale::Us),
            ("-7,77777", Locale::German),
        ];
        let tolerance = Decimal::new(1, 3);
        for (text, locale) in inputs {
            let amount = parse_amount(text, locale).unwrap();
            let rational = to_ledger_rational(amount).unwrap();
            assert!(rational.denominator() <= MAX_DENOMINATOR as i64);
            assert!(
                (rational.to_decimal() - amount).abs() <= tolerance,
                "{text} -> {rational}"
            );
        }
    }

    #[test]
    fn ledger_rational_is_symmetric() {
        for amount in [Decimal::new(123457, 4), Decimal::new(2, 3), Decimal::new(99995, 4)] {
            assert_eq!(
                -to_ledger_rational(amount).unwrap(),
                to_ledger_rational(-amount).unwrap()
            );
        }
    }

    #[test]
    fn rational_from_str() {
        assert_eq!(Rational::new(-3, 2).unwrap(), "-3/2".parse().unwrap());
        assert_eq!(Rational::new(1, 2).unwrap(), "50/100".parse().unwrap());
        assert_eq!("-1/2", Rational::new(1, -2).unwrap().to_string());
        assert!("1/0".parse::<Rational>().is_err());
        assert!("12".parse::<Rational>().is_err());
    }
}
