//! Cell payload bindings.
//!
//! These structs are the wire form of the routing plan. A `CellPayload` is
//! ABI-encoded into every `sendAndCall` message and decoded by the engine on
//! the receiving chain.

use alloy_sol_types::sol;

sol! {
    /// Where and how tokens move for one hop.
    #[derive(Debug, PartialEq, Eq)]
    struct BridgePath {
        address bridgeSourceChain;
        bool sourceBridgeIsNative;
        address bridgeDestinationChain;
        address cellDestinationChain;
        bytes32 destinationBlockchainID;
        uint256 teleporterFee;
        uint256 secondaryTeleporterFee;
    }

    /// One step of the plan. `action` is the numeric action tag.
    #[derive(Debug, PartialEq, Eq)]
    struct Hop {
        uint8 action;
        uint256 requiredGasLimit;
        uint256 recipientGasLimit;
        bytes trade;
        BridgePath bridgePath;
    }

    /// Referrer fee descriptor. An all-zero value means "no third-party fee".
    #[derive(Debug, PartialEq, Eq)]
    struct ThirdPartyFee {
        address feeCollector;
        uint256 fixedFee;
        uint64 baseFeeBips;
        bool exemptSingleHop;
    }

    /// The complete plan of an operation.
    #[derive(Debug, PartialEq, Eq)]
    struct Instructions {
        uint64 sourceId;
        address receiver;
        bool payableReceiver;
        address rollbackReceiver;
        uint256 rollbackTeleporterFee;
        uint256 rollbackGasLimit;
        Hop[] hops;
        ThirdPartyFee thirdPartyFee;
    }

    /// Continuation state threaded through every cross-chain message.
    #[derive(Debug, PartialEq, Eq)]
    struct CellPayload {
        Instructions instructions;
        uint256 hop;
        bytes32 sourceBlockchainID;
        address rollbackDestination;
        bytes32 operationId;
    }

    /// Preimage of an operation identifier.
    struct OperationSeed {
        bytes32 sourceBlockchainID;
        address cell;
        address sender;
        uint256 nonce;
    }
}
