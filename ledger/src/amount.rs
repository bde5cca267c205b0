//! Fixed-precision amount arithmetic
//!
//! Amounts are 256-bit unsigned integers in base units (wei for the native
//! asset). Fee products are formed in a 512-bit intermediate so
//! `gross * fee_bps` can never wrap.

use alloy_primitives::{ruint::UintTryFrom, U256, U512};

use crate::error::{LedgerError, Result};

pub type Amount = U256;

/// Basis-point denominator: 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// One whole unit of an 18-decimal asset.
pub const ONE_ETHER: Amount = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Deposit floor: 0.01 of an 18-decimal base unit.
pub const MINIMUM_DEPOSIT: Amount = U256::from_limbs([10_000_000_000_000_000, 0, 0, 0]);

/// `whole` units of an 18-decimal asset.
pub fn ether(whole: u64) -> Amount {
    U256::from(whole) * ONE_ETHER
}

/// `gross * fee_bps / 10_000`, rounded down.
///
/// Fails with `Overflow` only if the quotient does not fit back into 256
/// bits, which requires `fee_bps > 10_000`.
pub fn fee(gross: Amount, fee_bps: u64) -> Result<Amount> {
    let wide = U512::from(gross) * U512::from(fee_bps) / U512::from(BPS_DENOMINATOR);
    Amount::uint_try_from(wide).map_err(|_| LedgerError::Overflow)
}

/// What is left of `gross` after the fee.
pub fn net_of(gross: Amount, fee_bps: u64) -> Result<Amount> {
    gross
        .checked_sub(fee(gross, fee_bps)?)
        .ok_or(LedgerError::Overflow)
}

/// Floor of the square root, exact for every 256-bit input.
///
/// Newton iteration from a power-of-two guess that is never below the root;
/// the sequence decreases strictly until it reaches the floor.
pub fn isqrt(n: U256) -> U256 {
    if n < U256::from(2) {
        return n;
    }

    let mut x = U256::from(1) << ((n.bit_len() + 1) / 2);
    loop {
        let y = (x + n / x) >> 1usize;
        if y >= x {
            return x;
        }
        x = y;
    }
}
