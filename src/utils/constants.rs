/// Bancor V3 hub token (BNT) on mainnet
pub const BANCOR_V3_HUB: &str = "0x1F573D6Fb3F13d689FF844B4cE37794d79a7FF1C";
/// Circuit lengths searched by default
pub const DEFAULT_HOPS: &[usize] = &[2, 3];
/// Optimizer iteration cap
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
