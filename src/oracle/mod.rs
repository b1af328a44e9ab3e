//! NFT ownership lookups across two chains.

mod chain;
mod ownership;

pub use chain::{
    balance_of_calldata, is_valid_address, parse_quantity, BalanceSource, OracleError, RpcChain,
};
pub use ownership::{ChainBalance, Ownership, OwnershipOracle};
