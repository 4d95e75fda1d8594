use alloy_primitives::U256;

const SQRT_PRICE_BITS: usize = 160;
const TICK_OFFSET: usize = 160;
const PROTOCOL_FEE_OFFSET: usize = 184;
const LP_FEE_OFFSET: usize = 208;
const FIELD24_BITS: usize = 24;
const FIELD24_MASK: u64 = (1 << FIELD24_BITS) - 1;
const TICK_SIGN_BIT: u64 = 1 << 23;

/// Decoded pool `slot0` word.
///
/// Layout, least significant bits first: `sqrtPriceX96` (160), `tick`
/// (int24), `protocolFee` (uint24), `lpFee` (uint24). The top 24 bits are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot0 {
    /// Only the low 160 bits are ever set.
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub protocol_fee: u32,
    pub lp_fee: u32,
}

impl Slot0 {
    pub fn price(&self) -> f64 {
        sqrt_price_x96_to_price(self.sqrt_price_x96)
    }
}

fn sqrt_price_mask() -> U256 {
    (U256::from(1u8) << SQRT_PRICE_BITS) - U256::from(1u8)
}

fn field24(word: U256, offset: usize) -> u64 {
    (word >> offset).as_limbs()[0] & FIELD24_MASK
}

/// Splits a packed 256-bit word into its sub-fields. Total for any input.
pub fn unpack_slot0(word: U256) -> Slot0 {
    let raw_tick = field24(word, TICK_OFFSET);
    let tick = if raw_tick & TICK_SIGN_BIT != 0 { raw_tick as i64 - (1i64 << FIELD24_BITS) } else { raw_tick as i64 };

    Slot0 {
        sqrt_price_x96: word & sqrt_price_mask(),
        tick: tick as i32,
        protocol_fee: field24(word, PROTOCOL_FEE_OFFSET) as u32,
        lp_fee: field24(word, LP_FEE_OFFSET) as u32,
    }
}

/// Inverse of [`unpack_slot0`]. Fields wider than their slot are truncated,
/// so callers must keep them in range for the round trip to hold.
pub fn pack_slot0(slot0: &Slot0) -> U256 {
    let tick_bits = (slot0.tick as i64 as u64) & FIELD24_MASK;
    (slot0.sqrt_price_x96 & sqrt_price_mask())
        | (U256::from(tick_bits) << TICK_OFFSET)
        | (U256::from(slot0.protocol_fee as u64 & FIELD24_MASK) << PROTOCOL_FEE_OFFSET)
        | (U256::from(slot0.lp_fee as u64 & FIELD24_MASK) << LP_FEE_OFFSET)
}

/// `sqrtPriceX96^2 / 2^192`
pub fn sqrt_price_x96_to_price(sqrt_price_x96: U256) -> f64 {
    let ratio = f64::from(sqrt_price_x96) / 2f64.powi(96);
    ratio * ratio
}

/// Composes two pool prices sharing a middle token into one price:
/// `price_leg2 * decimal_scale / price_leg1`.
pub fn compose_cross_price(price_leg1: f64, price_leg2: f64, decimal_scale: f64) -> f64 {
    price_leg2 * decimal_scale / price_leg1
}
