use rust_decimal::{Decimal, RoundingStrategy};

fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency.to_uppercase().as_str() {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        _ => None,
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn format_grouped(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.*}", decimals as usize, rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut out = String::new();
    if rounded.is_sign_negative() && !rounded.is_zero() {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Fiat display: `$0.1200`, `€1,234.50`, `12.00 CHF`. Sub-dollar USD amounts
/// get four fractional digits, everything else two.
pub fn format_price(price: Decimal, currency: &str) -> String {
    let decimals = if currency.eq_ignore_ascii_case("USD") && price < Decimal::ONE {
        4
    } else {
        2
    };
    let amount = format_grouped(price, decimals);

    match currency_symbol(currency) {
        Some(symbol) => match amount.strip_prefix('-') {
            Some(unsigned) => format!("-{}{}", symbol, unsigned),
            None => format!("{}{}", symbol, amount),
        },
        None => format!("{} {}", amount, currency.to_uppercase()),
    }
}

pub fn format_price_change(change: Decimal) -> String {
    let rounded = change.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded >= Decimal::ZERO {
        return format!("+{:.2}%", rounded);
    }

    format!("{:.2}%", rounded)
}

/// Fiat value of `asset_amount` at `asset_price`, formatted for `currency`.
/// `None` when the product does not fit in a `Decimal`.
pub fn price_in_currency(asset_amount: Decimal, asset_price: Decimal, currency: &str) -> Option<String> {
    asset_amount
        .checked_mul(asset_price)
        .map(|value| format_price(value, currency))
}
