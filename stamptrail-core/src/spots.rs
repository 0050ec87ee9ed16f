//! Static catalog of check-in spots.

use crate::{Result, StampTrailError};

/// A physical location the user can check into.
///
/// `id` is the stable backend identifier (also the stamp id); `local_key`
/// is the client-side selection key used by the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spot {
    pub id: String,
    pub local_key: String,
    pub display_name: String,
    pub image_ref: String,
    pub description: String,
}

impl Spot {
    pub fn new(
        id: impl Into<String>,
        local_key: impl Into<String>,
        display_name: impl Into<String>,
        image_ref: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            local_key: local_key.into(),
            display_name: display_name.into(),
            image_ref: image_ref.into(),
            description: description.into(),
        }
    }
}

/// Immutable spot catalog, defined once at startup.
///
/// Both the backend ids and the local keys must be unique, so the
/// local-key to backend-id mapping is total by construction.
#[derive(Debug, Clone)]
pub struct SpotCatalog {
    spots: Vec<Spot>,
}

impl SpotCatalog {
    pub fn new(spots: Vec<Spot>) -> Result<Self> {
        for (i, spot) in spots.iter().enumerate() {
            for other in &spots[i + 1..] {
                if spot.id == other.id {
                    return Err(StampTrailError::Config(format!(
                        "duplicate spot id: {}",
                        spot.id
                    )));
                }
                if spot.local_key == other.local_key {
                    return Err(StampTrailError::Config(format!(
                        "duplicate spot key: {}",
                        spot.local_key
                    )));
                }
            }
        }
        Ok(Self { spots })
    }

    /// Catalog of the spots deployed with the rally.
    pub fn default_catalog() -> Self {
        let spots = vec![
            Spot::new(
                "YIL-001",
                "yil",
                "YIL Entrance",
                "assets/images/stamps/yil.png",
                "Innovation lab entrance hall",
            ),
            Spot::new(
                "STATUE-001",
                "statue",
                "Mr. Fujiwara Statue",
                "assets/images/stamps/statue.png",
                "Bronze statue on the main plaza",
            ),
            Spot::new(
                "BLD14-RM213",
                "bld14",
                "Building 14 Room 213",
                "assets/images/stamps/bld14213.png",
                "Seminar room on the second floor",
            ),
            Spot::new(
                "test",
                "test",
                "Test Spot",
                "assets/images/stamps/test.png",
                "Verification spot for rehearsals",
            ),
        ];
        Self::new(spots).expect("default catalog is statically unique")
    }

    pub fn by_local_key(&self, local_key: &str) -> Option<&Spot> {
        self.spots.iter().find(|s| s.local_key == local_key)
    }

    pub fn by_id(&self, id: &str) -> Option<&Spot> {
        self.spots.iter().find(|s| s.id == id)
    }

    pub fn spots(&self) -> &[Spot] {
        &self.spots
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }
}
