//! Bidirectional row position ↔ item identity index, built once per run.

use std::collections::HashMap;

use recofine_core::{Error, ItemIdentity, Result};

#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    by_position: Vec<ItemIdentity>,
    by_identity: HashMap<ItemIdentity, usize>,
}

impl IdentityIndex {
    /// Build the index from identities in corpus row order. Duplicate
    /// identities are rejected: a row position must map to exactly one item.
    pub fn new(identities: Vec<ItemIdentity>) -> Result<Self> {
        let mut by_identity = HashMap::with_capacity(identities.len());
        for (pos, identity) in identities.iter().enumerate() {
            if let Some(prev) = by_identity.insert(identity.clone(), pos) {
                return Err(Error::Identity(format!(
                    "{} appears at rows {} and {}",
                    identity, prev, pos
                )));
            }
        }
        Ok(Self {
            by_position: identities,
            by_identity,
        })
    }

    pub fn len(&self) -> usize {
        self.by_position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_position.is_empty()
    }

    pub fn identity(&self, position: usize) -> Result<&ItemIdentity> {
        self.by_position
            .get(position)
            .ok_or_else(|| Error::Identity(format!("no item at row {}", position)))
    }

    pub fn position(&self, identity: &ItemIdentity) -> Option<usize> {
        self.by_identity.get(identity).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recofine_core::ContentType;

    #[test]
    fn test_round_trip_positions() {
        let index = IdentityIndex::new(vec![
            ItemIdentity::new(10, ContentType::Game),
            ItemIdentity::new(10, ContentType::Movie),
            ItemIdentity::new("0451524934", ContentType::Book),
        ])
        .unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.identity(1).unwrap().content_type, ContentType::Movie);
        assert_eq!(
            index.position(&ItemIdentity::new("0451524934", ContentType::Book)),
            Some(2)
        );
        assert!(index.identity(3).is_err());
    }

    #[test]
    fn test_duplicates_rejected() {
        let result = IdentityIndex::new(vec![
            ItemIdentity::new(1, ContentType::Track),
            ItemIdentity::new(1, ContentType::Track),
        ]);
        assert!(matches!(result, Err(Error::Identity(_))));
    }
}
