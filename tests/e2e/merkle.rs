//! Membership tree fixture matching the published commitment tree construction: keccak256 leaves,
//! sorted hash pairs and zero-padded odd layers.

use alloy::primitives::{Address, B256, Bytes, keccak256};
use issuer::eligibility::hash_pair;

/// A small membership tree over a fixed set of wallets.
pub struct MembershipTree {
    layers: Vec<Vec<B256>>,
    wallets: Vec<Address>,
}

impl MembershipTree {
    pub fn new(wallets: &[Address]) -> Self {
        assert!(!wallets.is_empty(), "tree needs at least one wallet");

        let mut layers = vec![wallets.iter().map(keccak256).collect::<Vec<_>>()];
        while layers.last().unwrap().len() > 1 {
            let prev = layers.last().unwrap();
            let next = prev
                .chunks(2)
                .map(|pair| hash_pair(pair[0], pair.get(1).copied().unwrap_or(B256::ZERO)))
                .collect();
            layers.push(next);
        }

        Self { layers, wallets: wallets.to_vec() }
    }

    pub fn root(&self) -> B256 {
        self.layers.last().unwrap()[0]
    }

    /// Membership proof for `wallet`: concatenated sibling hashes from the leaf up.
    pub fn proof(&self, wallet: Address) -> Bytes {
        let mut index =
            self.wallets.iter().position(|w| *w == wallet).expect("wallet not in tree");

        let mut proof = Vec::new();
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling = if index % 2 == 0 {
                layer.get(index + 1).copied().unwrap_or(B256::ZERO)
            } else {
                layer[index - 1]
            };
            proof.extend_from_slice(sibling.as_slice());
            index /= 2;
        }
        proof.into()
    }
}
