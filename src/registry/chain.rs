//! Chain descriptors.

use url::Url;

/// An immutable network description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDescriptor {
    pub chain_id: u64,
    pub name: String,
    /// RPC endpoints, primary first. Never empty once registered.
    pub rpc_urls: Vec<Url>,
}

impl ChainDescriptor {
    pub fn new(chain_id: u64, name: String, rpc_urls: Vec<Url>) -> Self {
        Self { chain_id, name, rpc_urls }
    }

    /// The primary RPC endpoint.
    pub fn primary_rpc(&self) -> Option<&Url> {
        self.rpc_urls.first()
    }

    /// `0x`-prefixed hex chain id, as used by EIP-1193 wallet methods.
    pub fn hex_id(&self) -> String {
        format!("{:#x}", self.chain_id)
    }
}

impl std::fmt::Display for ChainDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.chain_id)
    }
}
