//! Token transferrer bindings.
//!
//! Mirrors the inputs of an Avalanche ICTT-style token transferrer: `send`
//! moves tokens to a recipient on another chain, `sendAndCall` additionally
//! invokes a recipient contract with a payload.

use alloy_sol_types::sol;

sol! {
    /// Input for a plain cross-chain transfer.
    #[derive(Debug, PartialEq, Eq)]
    struct SendTokensInput {
        bytes32 destinationBlockchainID;
        address destinationTokenTransferrerAddress;
        address recipient;
        address primaryFeeTokenAddress;
        uint256 primaryFee;
        uint256 secondaryFee;
        uint256 requiredGasLimit;
        address multiHopFallback;
    }

    /// Input for a transfer that calls a recipient contract on arrival.
    #[derive(Debug, PartialEq, Eq)]
    struct SendAndCallInput {
        bytes32 destinationBlockchainID;
        address destinationTokenTransferrerAddress;
        address recipientContract;
        bytes recipientPayload;
        uint256 requiredGasLimit;
        uint256 recipientGasLimit;
        address multiHopFallback;
        address fallbackRecipient;
        address primaryFeeTokenAddress;
        uint256 primaryFee;
        uint256 secondaryFee;
    }
}
