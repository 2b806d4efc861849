//! Function names of the allocation NFT and the confidential token.

/// Allocation NFT (`ZamaNFT`).
pub mod nft {
    /// `totalMinted() -> uint256`; ids are dense in `1..=totalMinted`.
    pub const TOTAL_MINTED: &str = "totalMinted";
    /// `ownerOf(uint256) -> address`
    pub const OWNER_OF: &str = "ownerOf";
    /// `getEncryptedAllocation(uint256) -> bytes32`
    pub const ENCRYPTED_ALLOCATION: &str = "getEncryptedAllocation";
    /// `isRewardClaimed(uint256) -> bool`
    pub const IS_REWARD_CLAIMED: &str = "isRewardClaimed";
    /// `mint()`
    pub const MINT: &str = "mint";
    /// `mintToken(uint256)`: claims the allocation of a token into the confidential balance.
    pub const CLAIM: &str = "mintToken";
    /// `Transfer(address indexed from, address indexed to, uint256 indexed tokenId)`
    pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";
}

/// Confidential token (`ConfidentialZama`).
pub mod token {
    /// `confidentialBalanceOf(address) -> bytes32`
    pub const CONFIDENTIAL_BALANCE_OF: &str = "confidentialBalanceOf";
}
