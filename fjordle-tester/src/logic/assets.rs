use chrono::{Days, NaiveDate};
use fjordle_game::{CatalogError, Fjord, FjordCatalog, FjordOption, Puzzle, PuzzleLoader};

const BUNDLED_FJORDS: &str = include_str!("../../data/fjords.json");

/// Puzzle ids are offset from puzzle numbers so the two never get confused.
pub const PUZZLE_ID_OFFSET: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("bundled fjord data is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("bundled fjord data is empty")]
    Empty,
}

/// Fjords embedded in the binary, served as a rotating daily puzzle.
///
/// Puzzle `n` targets fjord `(n - 1) % len` and is dated `n - 1` days after
/// the first puzzle.
#[derive(Debug, Clone)]
pub struct TesterAssets {
    fjords: Vec<Fjord>,
    first_date: NaiveDate,
}

impl TesterAssets {
    /// # Errors
    ///
    /// Returns an error if the embedded JSON does not parse or is empty.
    pub fn load_default() -> Result<Self, AssetError> {
        Self::from_json(BUNDLED_FJORDS)
    }

    /// # Errors
    ///
    /// Returns an error if `json` does not parse or lists no fjords.
    pub fn from_json(json: &str) -> Result<Self, AssetError> {
        let fjords: Vec<Fjord> = serde_json::from_str(json)?;
        if fjords.is_empty() {
            return Err(AssetError::Empty);
        }
        let first_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default();
        Ok(Self { fjords, first_date })
    }

    #[must_use]
    pub fn fjords(&self) -> &[Fjord] {
        &self.fjords
    }

    #[must_use]
    pub fn puzzle_count(&self) -> u32 {
        u32::try_from(self.fjords.len()).unwrap_or(u32::MAX)
    }

    /// Puzzle number whose target is the named fjord.
    #[must_use]
    pub fn puzzle_number_for(&self, fjord_name: &str) -> Option<u32> {
        let index = self
            .fjords
            .iter()
            .position(|fjord| fjord.name.eq_ignore_ascii_case(fjord_name))?;
        u32::try_from(index).ok().map(|index| index + 1)
    }

    #[must_use]
    pub fn puzzle(&self, puzzle_number: u32) -> Option<Puzzle> {
        let offset = puzzle_number.checked_sub(1)?;
        let index = usize::try_from(offset).ok()? % self.fjords.len();
        let fjord = self.fjords.get(index)?.clone();
        let date = self.first_date.checked_add_days(Days::new(u64::from(offset)))?;
        Some(Puzzle {
            id: PUZZLE_ID_OFFSET + puzzle_number,
            date,
            puzzle_number,
            fjord,
        })
    }

    /// # Errors
    ///
    /// Returns an error if two bundled fjords share an id.
    pub fn catalog(&self) -> Result<FjordCatalog, CatalogError> {
        FjordCatalog::new(self.fjords.iter().map(FjordOption::from).collect())
    }
}

impl PuzzleLoader for TesterAssets {
    type Error = AssetError;

    fn load_puzzle(&self, puzzle_number: u32) -> Result<Option<Puzzle>, Self::Error> {
        Ok(self.puzzle(puzzle_number))
    }

    fn load_catalog(&self) -> Result<FjordCatalog, Self::Error> {
        Ok(self.catalog()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn puzzles_rotate_through_bundled_fjords() {
        let assets = TesterAssets::load_default().unwrap();
        let count = assets.puzzle_count();
        assert!(count >= 20);

        let first = assets.puzzle(1).unwrap();
        assert_eq!(first.id, 1001);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        let wrapped = assets.puzzle(count + 1).unwrap();
        assert_eq!(wrapped.fjord, first.fjord);
        assert_eq!(wrapped.puzzle_number, count + 1);
        assert!(wrapped.date > first.date);

        assert!(assets.puzzle(0).is_none());
    }

    #[test]
    fn puzzle_numbers_resolve_by_name() {
        let assets = TesterAssets::load_default().unwrap();
        let number = assets.puzzle_number_for("geirangerfjorden").unwrap();
        assert_eq!(assets.puzzle(number).unwrap().fjord.name, "Geirangerfjorden");
        assert!(assets.puzzle_number_for("Atlantis").is_none());
    }

    #[test]
    fn rejects_empty_data() {
        assert!(matches!(
            TesterAssets::from_json("[]"),
            Err(AssetError::Empty)
        ));
        assert!(matches!(
            TesterAssets::from_json("{"),
            Err(AssetError::Json(_))
        ));
    }

    #[test]
    fn loader_exposes_catalog() {
        let assets = TesterAssets::load_default().unwrap();
        let catalog = assets.load_catalog().unwrap();
        assert_eq!(catalog.len(), assets.fjords().len());
    }
}
