//! In-memory ordered set of watched contract addresses

use super::address::{validate, TokenAddress, ValidationError};

/// Ordered, duplicate-free list of validated addresses.
///
/// Insertion order is display order. `revision` increases on every
/// mutation so dependents can tell when to re-derive their view of it.
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    entries: Vec<TokenAddress>,
    revision: u64,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `input` and append it.
    ///
    /// Malformed input and exact duplicates are both rejected and leave
    /// the list untouched.
    pub fn add(&mut self, input: &str) -> Result<TokenAddress, ValidationError> {
        let address = validate(input)?;
        if self.contains(&address) {
            return Err(ValidationError::Duplicate { address });
        }
        self.entries.push(address.clone());
        self.revision += 1;
        Ok(address)
    }

    /// Remove `address`. Returns false (and changes nothing) when absent.
    pub fn remove(&mut self, address: &TokenAddress) -> bool {
        let Some(index) = self.entries.iter().position(|entry| entry == address) else {
            return false;
        };
        self.entries.remove(index);
        self.revision += 1;
        true
    }

    /// Remove the entry at display position `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<TokenAddress> {
        if index >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(index);
        self.revision += 1;
        Some(removed)
    }

    /// Read-only view of the current entries
    pub fn list(&self) -> &[TokenAddress] {
        &self.entries
    }

    /// Owned copy detached from further mutation
    pub fn snapshot(&self) -> Vec<TokenAddress> {
        self.entries.clone()
    }

    pub fn contains(&self, address: &TokenAddress) -> bool {
        self.entries.iter().any(|entry| entry == address)
    }

    pub fn get(&self, index: usize) -> Option<&TokenAddress> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
