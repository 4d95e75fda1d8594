use alloy_primitives::{Address, B256, address, b256};

// Price snapshots (Base mainnet, Uniswap v4 pool manager)
pub const DEFAULT_PRICE_RPC_URL: &str = "https://mainnet.base.org";
pub const POOL_MANAGER: Address = address!("0x498581fF718922c3f8e6A244956aF099B2652b2b");
pub const BWORK_WETH_SLOT0: B256 = b256!("0xd66bf39be2869094cf8d2d31edffab51dc8326eadf3c7611d397d156993996da");
pub const WETH_USD_SLOT0: B256 = b256!("0xe570f6e770bf85faa3d1dbee2fa168b56036a048a7939edbcd02d7ebddf3f948");
/// WETH has 18 decimals, USD 6.
pub const WETH_USD_DECIMAL_EXPONENT: i32 = 12;

// Mined block scan (Base Sepolia)
pub const DEFAULT_SCANNER_RPC_URL: &str = "https://sepolia.base.org";
pub const BWORK_CONTRACT: Address = address!("0x7aDf1927aa0c75Fd054804E9fc6574A56C211AbB");
pub const MINT_TOPIC: B256 = b256!("0xcf6fbb9dcea7d07263ab4f5c3a92f53af33dffc421d9d121e1c74b307e68189d");
pub const SCAN_START_BLOCK: u64 = 30_111_966;

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
pub const DEFAULT_SECONDS_PER_BLOCK: f64 = 2.0;
pub const DEFAULT_ANCHOR_HOURS: [u32; 4] = [0, 6, 12, 18];
