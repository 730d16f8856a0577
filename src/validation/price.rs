//! Quote sanity checks applied before any comparison

use alloy::primitives::Address;
use rust_decimal::Decimal;
use crate::errors::{BotError, BotResult};
use crate::types::PriceQuote;

pub fn validate_quote(quote: &PriceQuote, token_in: Address, token_out: Address) -> BotResult<()> {
    let malformed = |reason: String| BotError::MalformedQuote {
        venue: quote.venue.clone(),
        reason,
    };

    if quote.price <= Decimal::ZERO {
        return Err(malformed(format!("price is zero or negative: {}", quote.price)));
    }

    if quote.available_liquidity == 0 {
        return Err(malformed("no available liquidity".to_string()));
    }

    if quote.token_in != token_in || quote.token_out != token_out {
        return Err(malformed(format!(
            "orientation mismatch: got {}->{}, expected {}->{}",
            quote.token_in, quote.token_out, token_in, token_out
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use crate::types::{NetworkId, VenueId};

    fn quote(price: Decimal, liquidity: u128) -> PriceQuote {
        PriceQuote {
            network: NetworkId::from("mainnet"),
            venue: VenueId::from("x"),
            venue_address: Address::ZERO,
            token_in: Address::repeat_byte(1),
            token_out: Address::repeat_byte(2),
            price,
            available_liquidity: liquidity,
            observed_at_block: 1,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_degenerate_quotes() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        assert!(validate_quote(&quote(dec!(1.5), 10), a, b).is_ok());
        assert!(validate_quote(&quote(dec!(0), 10), a, b).is_err());
        assert!(validate_quote(&quote(dec!(1.5), 0), a, b).is_err());
        assert!(validate_quote(&quote(dec!(1.5), 10), b, a).is_err());
    }
}
