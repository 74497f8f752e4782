pub mod mock_chain_client;

pub use mock_chain_client::MockChainClient;
