/// Logic Layer
///
/// Pure computations with no I/O: fixed-point price decoding, the anchor
/// schedule, and folding mint logs into the mined event list.

pub mod anchors;
pub mod fixed_point;
pub mod mined_event;

pub use anchors::{AnchorSchedule, format_utc};
pub use fixed_point::{Slot0, compose_cross_price, pack_slot0, sqrt_price_x96_to_price, unpack_slot0};
pub use mined_event::{CHALLENGE_MARKER_AMOUNT, MinedEvent, MinedEventLog, MintLayout};
