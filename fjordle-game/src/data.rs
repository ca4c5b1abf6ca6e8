use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;
use crate::state::HintKind;

/// A fjord as delivered with a puzzle, including hint material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fjord {
    pub id: u32,
    pub name: String,
    pub svg_filename: String,
    pub center_lat: f64,
    pub center_lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satellite_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub municipalities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub counties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia_url_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia_url_en: Option<String>,
}

impl Fjord {
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.center_lat, self.center_lng)
    }

    /// First letter of the display name, for the first-letter hint.
    #[must_use]
    pub fn first_letter(&self) -> Option<char> {
        self.name.chars().next().map(|c| c.to_uppercase().next().unwrap_or(c))
    }

    /// Whether the puzzle carries the material a hint needs.
    #[must_use]
    pub fn hint_available(&self, kind: HintKind) -> bool {
        match kind {
            HintKind::FirstLetter | HintKind::Weather => true,
            HintKind::Satellite => self.satellite_filename.is_some(),
            HintKind::Municipalities => !self.municipalities.is_empty(),
            HintKind::Counties => !self.counties.is_empty(),
            HintKind::Measurements => {
                self.length_km.is_some() || self.width_km.is_some() || self.depth_m.is_some()
            }
        }
    }
}

/// One daily challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: u32,
    pub date: NaiveDate,
    pub puzzle_number: u32,
    pub fjord: Fjord,
}

impl Puzzle {
    /// Parse a puzzle record as returned by the puzzle lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a puzzle.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Lightweight autocomplete entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FjordOption {
    pub id: u32,
    pub name: String,
    pub center_lat: f64,
    pub center_lng: f64,
}

impl FjordOption {
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.center_lat, self.center_lng)
    }
}

impl From<&Fjord> for FjordOption {
    fn from(fjord: &Fjord) -> Self {
        Self {
            id: fjord.id,
            name: fjord.name.clone(),
            center_lat: fjord.center_lat,
            center_lng: fjord.center_lng,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate fjord id {0} in catalog")]
    DuplicateId(u32),
}

/// Read-only fjord catalog loaded once per session. Serialized as a plain
/// array; deserializing goes through [`FjordCatalog::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(try_from = "Vec<FjordOption>", into = "Vec<FjordOption>")]
pub struct FjordCatalog {
    fjords: Vec<FjordOption>,
}

impl TryFrom<Vec<FjordOption>> for FjordCatalog {
    type Error = CatalogError;

    fn try_from(fjords: Vec<FjordOption>) -> Result<Self, Self::Error> {
        Self::new(fjords)
    }
}

impl From<FjordCatalog> for Vec<FjordOption> {
    fn from(catalog: FjordCatalog) -> Self {
        catalog.fjords
    }
}

impl FjordCatalog {
    /// Build a catalog, rejecting duplicate ids.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateId`] if two entries share an id.
    pub fn new(fjords: Vec<FjordOption>) -> Result<Self, CatalogError> {
        let mut seen = std::collections::HashSet::with_capacity(fjords.len());
        for fjord in &fjords {
            if !seen.insert(fjord.id) {
                return Err(CatalogError::DuplicateId(fjord.id));
            }
        }
        Ok(Self { fjords })
    }

    /// Load a catalog from a JSON array of fjord options.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or ids repeat.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let fjords: Vec<FjordOption> = serde_json::from_str(json)?;
        Self::new(fjords)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fjords.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fjords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FjordOption> {
        self.fjords.iter()
    }

    #[must_use]
    pub fn find_by_id(&self, id: u32) -> Option<&FjordOption> {
        self.fjords.iter().find(|fjord| fjord.id == id)
    }

    /// Case-insensitive exact name match.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&FjordOption> {
        let needle = name.trim().to_lowercase();
        self.fjords
            .iter()
            .find(|fjord| fjord.name.to_lowercase() == needle)
    }

    /// Autocomplete: case-insensitive substring match in catalog order.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<&FjordOption> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.fjords
            .iter()
            .filter(|fjord| fjord.name.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> FjordCatalog {
        FjordCatalog::from_json(
            r#"[
                {"id": 1, "name": "Geirangerfjorden", "center_lat": 62.1049, "center_lng": 7.2067},
                {"id": 2, "name": "Nærøyfjorden", "center_lat": 60.875, "center_lng": 6.75},
                {"id": 3, "name": "Sognefjorden", "center_lat": 61.1, "center_lng": 6.3}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn puzzle_from_json_reads_optional_hint_material() {
        let json = r#"{
            "id": 42,
            "date": "2025-06-02",
            "puzzle_number": 17,
            "fjord": {
                "id": 1,
                "name": "Geirangerfjorden",
                "svg_filename": "geiranger.svg",
                "center_lat": 62.1049,
                "center_lng": 7.2067,
                "municipalities": ["Stranda"],
                "length_km": 15.0
            }
        }"#;

        let puzzle = Puzzle::from_json(json).unwrap();
        assert_eq!(puzzle.puzzle_number, 17);
        assert_eq!(puzzle.date, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        assert_eq!(puzzle.fjord.first_letter(), Some('G'));
        assert!(puzzle.fjord.hint_available(HintKind::Municipalities));
        assert!(puzzle.fjord.hint_available(HintKind::Measurements));
        assert!(!puzzle.fjord.hint_available(HintKind::Satellite));
        assert!(!puzzle.fjord.hint_available(HintKind::Counties));
    }

    #[test]
    fn catalog_lookups_ignore_case() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.find_by_name("nærøyfjorden").map(|f| f.id), Some(2));
        assert_eq!(catalog.find_by_id(3).map(|f| f.name.as_str()), Some("Sognefjorden"));
        assert!(catalog.find_by_id(99).is_none());
    }

    #[test]
    fn catalog_search_matches_substrings_in_order() {
        let catalog = catalog();
        let hits: Vec<u32> = catalog.search("FJORD", 10).iter().map(|f| f.id).collect();
        assert_eq!(hits, vec![1, 2, 3]);
        assert_eq!(catalog.search("fjord", 2).len(), 2);
        assert!(catalog.search("  ", 10).is_empty());
        assert_eq!(catalog.search("sogn", 10)[0].id, 3);
    }

    #[test]
    fn catalog_rejects_duplicate_ids() {
        let option = FjordOption {
            id: 7,
            name: "Lysefjorden".to_string(),
            center_lat: 59.0,
            center_lng: 6.2,
        };
        let err = FjordCatalog::new(vec![option.clone(), option.clone()]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(7)));

        let json = serde_json::to_string(&vec![option.clone(), option]).unwrap();
        let err = serde_json::from_str::<FjordCatalog>(&json).unwrap_err();
        assert!(err.to_string().contains("duplicate fjord id 7"));
    }

    #[test]
    fn catalog_serializes_as_a_plain_array() {
        let catalog = catalog();
        let value = serde_json::to_value(&catalog).unwrap();
        assert!(value.is_array());
        assert_eq!(serde_json::from_value::<FjordCatalog>(value).unwrap(), catalog);
    }
}
