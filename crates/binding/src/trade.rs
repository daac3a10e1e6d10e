//! Encoded trade formats of the bundled swap strategies.
//!
//! `Hop.trade` is opaque to the routing engine; only the strategy that produced
//! it during planning knows how to decode it.

use alloy_sol_types::sol;

sol! {
    /// Constant-product route: `path[i] -> path[i + 1]` through `pools[i]`.
    #[derive(Debug, PartialEq, Eq)]
    struct ConstantProductTrade {
        uint256 amountIn;
        uint256 minAmountOut;
        address[] path;
        address[] pools;
    }

    /// Planner hints for the constant-product router.
    #[derive(Debug, PartialEq, Eq)]
    struct ConstantProductParams {
        uint16 slippageBips;
    }

    /// The signed part of an RFQ order.
    #[derive(Debug, PartialEq, Eq)]
    struct Order {
        address maker;
        address takerToken;
        address makerToken;
        uint256 takerAmount;
        uint256 makerAmount;
        uint64 expiry;
        uint256 nonce;
    }

    /// An RFQ order plus the maker's 65-byte `r || s || v` signature.
    #[derive(Debug, PartialEq, Eq)]
    struct SignedOrderTrade {
        Order order;
        bytes signature;
    }

    /// Identity trade: the expected output token.
    #[derive(Debug, PartialEq, Eq)]
    struct PassthroughTrade {
        address tokenOut;
    }
}
