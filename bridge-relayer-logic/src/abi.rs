use alloy::sol;

sol! {
    /// Intent emitted by the L1 bridge contract when a user locks an asset to
    /// buy the wrapped representation on L2.
    #[derive(Debug)]
    event AssetsBuy(
        address indexed user,
        address assetIn,
        uint256 amountIn,
        address l2TargetToken,
        uint256 deadline,
        uint256 nonce
    );

    /// Intent emitted by the L2 bridge contract when a user redeems a wrapped
    /// asset for withdrawal back to L1.
    #[derive(Debug)]
    event AssetsSold(
        address indexed user,
        address tokenToSell,
        uint256 amountIn,
        address targetL1Asset,
        uint256 deadline,
        uint256 nonce
    );

    /// Minimal read surface consumed on both bridge contracts.
    interface IBridgeReads {
        function DOMAIN_SEPARATOR() external view returns (bytes32);
        function usedNonces(address user) external view returns (uint256);
        function getUserLpShare(address user, address asset) external view returns (uint256);
    }

    /// ERC-20 surface needed to normalize source-chain amounts.
    interface IErc20 {
        function decimals() external view returns (uint8);
    }

    /// Write surface for executing a relayed Buy on L2.
    interface IL2Bridge {
        function executeBuy(
            address user,
            address l2Token,
            uint256 amount,
            uint256 minOut,
            uint256 nonce,
            uint256 deadline,
            bytes calldata sig
        ) external;
    }

    /// Write surface for executing a relayed withdrawal on L1.
    interface IL1Bridge {
        function withdraw(
            address user,
            address asset,
            uint256 lpShare,
            uint256 nonce,
            uint256 deadline,
            bytes calldata sig
        ) external;
    }

    /// EIP-712 typed-data struct for the Buy relay signature.
    ///
    /// Field order and names are load-bearing: they determine the on-the-wire
    /// type string `ASSETS_BUY(address user,address l2Token,address assetIn,uint256 amount,uint256 nonce,uint256 deadline)`.
    #[derive(Debug)]
    struct AssetsBuyTypedData {
        address user;
        address l2Token;
        address assetIn;
        uint256 amount;
        uint256 nonce;
        uint256 deadline;
    }

    /// EIP-712 typed-data struct for the Sell (withdraw) relay signature.
    ///
    /// Type string: `ASSETS_SOLD(address user,address assetToWithdraw,uint256 nonce,uint256 deadline)`.
    #[derive(Debug)]
    struct AssetsSoldTypedData {
        address user;
        address assetToWithdraw;
        uint256 nonce;
        uint256 deadline;
    }
}
