pub mod client;
pub mod transport;

pub use client::{AlloyChainClient, ChainClient, SendTxOpts, SentTx, TxOutcome};
pub use transport::derive_ws_url;
