//! Price-feed payload decoder
//!
//! Fixed little-endian layout, discriminator already stripped by the caller:
//!
//! | offset | field             | type     |
//! |--------|-------------------|----------|
//! | 0      | feed_id           | [u8; 32] |
//! | 32     | price             | i64      |
//! | 40     | conf              | u64      |
//! | 48     | exponent          | i32      |
//! | 52     | publish_time      | i64      |
//! | 60     | prev_publish_time | i64      |
//! | 68     | ema_price         | i64      |
//! | 76     | ema_conf          | u64      |
//!
//! The true price is `price * 10^exponent` (exponent typically negative).
//! A zero price means "feed reporting nothing" and normalizes the whole
//! record to zero sub-fields; callers treat that as missing data.

use rust_decimal::Decimal;

use super::{read_i32_le, read_i64_le, read_u64_le, scale_by_exponent};
use crate::errors::DecodeError;
use crate::oracle::cap_confidence;
use crate::types::{OraclePriceRecord, Price};

/// Minimum payload length after the discriminator is stripped.
pub const PRICE_FEED_MIN_LEN: usize = 84;

/// Decode one raw price-feed payload into an oracle price record.
///
/// Fatal only to this feed; batch callers degrade decode errors to unknown
/// and continue with the rest.
pub fn decode_price_feed(
    payload: &[u8],
    max_confidence_ratio: Decimal,
) -> Result<OraclePriceRecord, DecodeError> {
    if payload.len() < PRICE_FEED_MIN_LEN {
        return Err(DecodeError::Truncated {
            expected: PRICE_FEED_MIN_LEN,
            actual: payload.len(),
        });
    }

    let price_raw = read_i64_le(payload, 32, PRICE_FEED_MIN_LEN)?;
    let conf_raw = read_u64_le(payload, 40, PRICE_FEED_MIN_LEN)?;
    let exponent = read_i32_le(payload, 48, PRICE_FEED_MIN_LEN)?;
    let publish_time = read_i64_le(payload, 52, PRICE_FEED_MIN_LEN)?;
    let ema_price_raw = read_i64_le(payload, 68, PRICE_FEED_MIN_LEN)?;
    let ema_conf_raw = read_u64_le(payload, 76, PRICE_FEED_MIN_LEN)?;

    if price_raw < 0 {
        return Err(DecodeError::NegativePrice(price_raw));
    }
    if ema_price_raw < 0 {
        return Err(DecodeError::NegativePrice(ema_price_raw));
    }

    // Zero price: feed reporting nothing, not "asset worth zero".
    if price_raw == 0 {
        return Ok(OraclePriceRecord {
            realtime: Price::zero(),
            weighted: Price::zero(),
            timestamp: Some(publish_time),
        });
    }

    let price = scale_by_exponent(price_raw as i128, exponent)?;
    let confidence = scale_by_exponent(conf_raw as i128, exponent)?;
    let realtime = Price::with_confidence(
        price,
        cap_confidence(price, confidence, max_confidence_ratio),
    );

    let ema_price = scale_by_exponent(ema_price_raw as i128, exponent)?;
    let ema_confidence = scale_by_exponent(ema_conf_raw as i128, exponent)?;
    let weighted = Price::with_confidence(
        ema_price,
        cap_confidence(ema_price, ema_confidence, max_confidence_ratio),
    );

    Ok(OraclePriceRecord {
        realtime,
        weighted,
        timestamp: Some(publish_time),
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::build_payload;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decodes_scaled_price_and_ema() {
        // 12_345_678_900 * 10^-8 = 123.456789
        let payload = build_payload(12_345_678_900, 5_000_000, -8, 1_700_000_000, 12_000_000_000, 4_000_000);
        let record = decode_price_feed(&payload, dec!(0.05)).unwrap();

        assert_eq!(record.realtime.price, dec!(123.456789));
        assert_eq!(record.realtime.confidence, dec!(0.05));
        assert_eq!(record.weighted.price, dec!(120));
        assert_eq!(record.weighted.confidence, dec!(0.04));
        assert_eq!(record.timestamp, Some(1_700_000_000));
    }

    #[test]
    fn band_stays_symmetric_after_capping() {
        // Confidence way above the cap: 50 raw vs 2% of price
        let payload = build_payload(100, 50, 0, 0, 100, 50);
        let record = decode_price_feed(&payload, dec!(0.02)).unwrap();

        assert_eq!(record.realtime.confidence, dec!(2));
        assert_eq!(record.realtime.lowest_price, dec!(98));
        assert_eq!(record.realtime.highest_price, dec!(102));
        assert_eq!(
            record.realtime.highest_price - record.realtime.price,
            record.realtime.price - record.realtime.lowest_price
        );
    }

    #[test]
    fn zero_price_normalizes_entire_record() {
        // EMA fields populated, but the realtime zero wins for both tracks
        let payload = build_payload(0, 10, -2, 1_700_000_001, 5_000, 10);
        let record = decode_price_feed(&payload, dec!(0.05)).unwrap();

        assert!(record.realtime.is_zero());
        assert!(record.weighted.is_zero());
        assert_eq!(record.realtime.confidence, Decimal::ZERO);
        assert_eq!(record.weighted.highest_price, Decimal::ZERO);
    }

    #[test]
    fn undersized_payload_is_a_decode_error() {
        let err = decode_price_feed(&[0u8; 40], dec!(0.05)).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                expected: PRICE_FEED_MIN_LEN,
                actual: 40
            }
        );
    }

    #[test]
    fn negative_price_is_a_decode_error() {
        let payload = build_payload(-5, 10, 0, 0, 5, 10);
        assert!(matches!(
            decode_price_feed(&payload, dec!(0.05)),
            Err(DecodeError::NegativePrice(-5))
        ));
    }
}
