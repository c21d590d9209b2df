//! Merkle tree over transaction identities
//!
//! # Design
//!
//! - Binary Merkle tree, interior nodes hashed as `SHA-256(0x01 || left || right)`
//! - Leaves are transaction id-hashes, used as-is
//! - An odd node at the end of a level is promoted unchanged, so no leaf is
//!   ever duplicated and batches of different lengths never share a root
//! - All levels are built once at construction; proofs are O(log n)

use crate::hasher::{hash_node, Digest};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Direction of sibling in Merkle tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Sibling is on the left
    Left,
    /// Sibling is on the right
    Right,
}

/// Merkle proof (path from leaf to root)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Leaf hash being proven
    pub leaf_hash: Digest,
    /// Sibling hashes along the path to root (promoted levels contribute none)
    pub siblings: Vec<(Direction, Digest)>,
    /// Root hash
    pub root_hash: Digest,
}

impl MerkleProof {
    /// Verify proof against its root hash
    pub fn verify(&self) -> bool {
        self.computed_root() == self.root_hash
    }

    /// Verify proof against an externally trusted root
    pub fn verify_against(&self, root: &Digest) -> bool {
        self.root_hash == *root && self.verify()
    }

    fn computed_root(&self) -> Digest {
        self.siblings
            .iter()
            .fold(self.leaf_hash, |current, (direction, sibling)| match direction {
                Direction::Left => hash_node(sibling, &current),
                Direction::Right => hash_node(&current, sibling),
            })
    }
}

/// Immutable Merkle tree
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// `levels[0]` are the leaves, the last level holds only the root
    levels: Vec<Vec<Digest>>,
}

#[allow(clippy::len_without_is_empty)] // never empty, see from_leaves
impl MerkleTree {
    /// Build tree from leaves
    ///
    /// Fails with [`Error::EmptyBatch`] when `leaves` is empty.
    pub fn from_leaves(leaves: Vec<Digest>) -> Result<Self> {
        if leaves.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let mut levels = vec![leaves];
        while levels[levels.len() - 1].len() > 1 {
            let next_level: Vec<Digest> = levels[levels.len() - 1]
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_node(left, right),
                    _ => pair[0],
                })
                .collect();
            levels.push(next_level);
        }

        Ok(Self { levels })
    }

    /// Get number of leaves
    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    /// Merkle root
    pub fn root(&self) -> Digest {
        self.levels[self.levels.len() - 1][0]
    }

    /// Generate Merkle proof for a leaf at given index
    pub fn generate_proof(&self, leaf_index: usize) -> Option<MerkleProof> {
        let leaf_hash = *self.levels[0].get(leaf_index)?;
        let mut siblings = Vec::new();
        let mut index = leaf_index;

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = if index % 2 == 0 {
                level.get(index + 1).map(|hash| (Direction::Right, *hash))
            } else {
                Some((Direction::Left, level[index - 1]))
            };
            siblings.extend(sibling);
            index /= 2;
        }

        Some(MerkleProof {
            leaf_hash,
            siblings,
            root_hash: self.root(),
        })
    }

    /// Verify that a leaf exists in the tree at `leaf_index`
    pub fn verify_leaf(&self, leaf_index: usize, leaf_hash: Digest) -> bool {
        match self.generate_proof(leaf_index) {
            Some(proof) => proof.leaf_hash == leaf_hash && proof.verify(),
            None => false,
        }
    }
}

/// Compute the Merkle root of `leaves`
pub fn merkle_root(leaves: &[Digest]) -> Result<Digest> {
    MerkleTree::from_leaves(leaves.to_vec()).map(|tree| tree.root())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::{hash_fields, Field};

    fn hash_data(data: &str) -> Digest {
        hash_fields(&[Field::from(data)])
    }

    fn leaves(n: usize) -> Vec<Digest> {
        (0..n).map(|i| hash_data(&format!("leaf{}", i))).collect()
    }

    #[test]
    fn test_empty_tree() {
        assert!(matches!(MerkleTree::from_leaves(vec![]), Err(Error::EmptyBatch)));
        assert!(matches!(merkle_root(&[]), Err(Error::EmptyBatch)));
    }

    #[test]
    fn test_single_leaf() {
        let leaf = hash_data("leaf1");
        let tree = MerkleTree::from_leaves(vec![leaf]).unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root(), leaf);
    }

    #[test]
    fn test_two_leaves() {
        let leaves = leaves(2);
        let tree = MerkleTree::from_leaves(leaves.clone()).unwrap();

        assert_eq!(tree.root(), hash_node(&leaves[0], &leaves[1]));
    }

    #[test]
    fn test_four_leaves() {
        let leaves = leaves(4);
        let tree = MerkleTree::from_leaves(leaves.clone()).unwrap();

        let h01 = hash_node(&leaves[0], &leaves[1]);
        let h23 = hash_node(&leaves[2], &leaves[3]);
        assert_eq!(tree.root(), hash_node(&h01, &h23));
    }

    #[test]
    fn test_odd_leaf_promoted() {
        let leaves = leaves(3);
        let tree = MerkleTree::from_leaves(leaves.clone()).unwrap();

        let h01 = hash_node(&leaves[0], &leaves[1]);
        assert_eq!(tree.root(), hash_node(&h01, &leaves[2]));
    }

    #[test]
    fn test_no_duplication_collision() {
        // [a, b, c] and [a, b, c, c] must not share a root
        let three = leaves(3);
        let mut four = three.clone();
        four.push(three[2]);

        assert_ne!(merkle_root(&three).unwrap(), merkle_root(&four).unwrap());
    }

    #[test]
    fn test_order_matters() {
        let forward = leaves(5);
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_ne!(merkle_root(&forward).unwrap(), merkle_root(&reversed).unwrap());
    }

    #[test]
    fn test_proof_generation_two_leaves() {
        let leaves = leaves(2);
        let tree = MerkleTree::from_leaves(leaves.clone()).unwrap();

        let proof0 = tree.generate_proof(0).unwrap();
        assert_eq!(proof0.siblings, vec![(Direction::Right, leaves[1])]);
        assert!(proof0.verify());

        let proof1 = tree.generate_proof(1).unwrap();
        assert_eq!(proof1.siblings, vec![(Direction::Left, leaves[0])]);
        assert!(proof1.verify());
    }

    #[test]
    fn test_proofs_for_every_leaf() {
        for n in 1..=11 {
            let leaves = leaves(n);
            let tree = MerkleTree::from_leaves(leaves.clone()).unwrap();

            for (i, leaf) in leaves.iter().enumerate() {
                let proof = tree.generate_proof(i).unwrap();
                assert_eq!(proof.leaf_hash, *leaf);
                assert!(proof.verify_against(&tree.root()), "n={} i={}", n, i);
            }
            assert!(tree.generate_proof(n).is_none());
        }
    }

    #[test]
    fn test_proof_verification_invalid() {
        let tree = MerkleTree::from_leaves(leaves(4)).unwrap();
        let mut proof = tree.generate_proof(0).unwrap();

        // Tamper with root
        proof.root_hash = hash_data("fake_root");
        assert!(!proof.verify());

        // Tamper with leaf
        let mut proof = tree.generate_proof(1).unwrap();
        proof.leaf_hash = hash_data("fake_leaf");
        assert!(!proof.verify());
    }

    #[test]
    fn test_verify_leaf() {
        let leaves = leaves(3);
        let tree = MerkleTree::from_leaves(leaves.clone()).unwrap();

        assert!(tree.verify_leaf(0, leaves[0]));
        assert!(tree.verify_leaf(2, leaves[2]));

        // Invalid index
        assert!(!tree.verify_leaf(3, leaves[0]));

        // Wrong hash
        assert!(!tree.verify_leaf(0, leaves[1]));
    }
}
