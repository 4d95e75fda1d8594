use crate::data_sync::client::StorageLocator;
use crate::data_sync::reader::RetryingReader;
use crate::error::{Result, SyncError};
use crate::logic::fixed_point::{Slot0, compose_cross_price, unpack_slot0};
use alloy_primitives::U256;
use tracing::debug;

/// Two pools sharing a middle token: `base_leg` prices the tracked token in
/// the middle token, `quote_leg` prices the middle token in the quote
/// currency. `decimal_exponent` corrects the quote leg's decimal mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRoute {
    pub base_leg: StorageLocator,
    pub quote_leg: StorageLocator,
    pub decimal_exponent: i32,
}

impl PoolRoute {
    pub fn decimal_scale(&self) -> f64 {
        10f64.powi(self.decimal_exponent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub block: u64,
    pub base: Slot0,
    pub quote: Slot0,
    pub price: f64,
}

/// Reads both legs of a [`PoolRoute`] at a block and composes the price.
#[derive(Clone)]
pub struct PriceFeed {
    reader: RetryingReader,
    route: PoolRoute,
}

impl PriceFeed {
    pub fn new(reader: RetryingReader, route: PoolRoute) -> Self {
        Self { reader, route }
    }

    pub fn route(&self) -> &PoolRoute {
        &self.route
    }

    pub async fn price_at(&self, block: u64) -> Result<PriceQuote> {
        let base = unpack_slot0(self.reader.read_storage(&self.route.base_leg, block).await?);
        let quote = unpack_slot0(self.reader.read_storage(&self.route.quote_leg, block).await?);

        if base.sqrt_price_x96 == U256::ZERO {
            return Err(SyncError::Malformed(format!("pool {} has no price at block {}", self.route.base_leg, block)));
        }

        let base_price = base.price();
        let quote_price = quote.price();
        let price = compose_cross_price(base_price, quote_price, self.route.decimal_scale());
        debug!(
            "Block {}: base tick {} price {:e}, quote tick {} price {:e}, composed {:.8}",
            block, base.tick, base_price, quote.tick, quote_price, price
        );

        Ok(PriceQuote { block, base, quote, price })
    }
}
