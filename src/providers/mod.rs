//! Gas price provider implementations

pub mod etherscan;

pub use etherscan::EtherscanProvider;
