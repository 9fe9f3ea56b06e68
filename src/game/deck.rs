//! Shuffled board generation.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use tracing::{debug, instrument};

use crate::game::{DeckError, Difficulty, TILE_ALPHABET, Tile, TileValue, TierTable};

/// Builds boards of paired tile values.
///
/// Values are drawn without replacement from [`TILE_ALPHABET`], duplicated,
/// and Fisher–Yates shuffled, so every ordering of the multiset is equally
/// likely.
#[derive(Debug, Clone)]
pub struct DeckGenerator {
    tiers: TierTable,
    rng: StdRng,
}

impl DeckGenerator {
    /// Creates a generator seeded from the operating system.
    #[instrument(skip(tiers))]
    pub fn new(tiers: TierTable) -> Self {
        Self {
            tiers,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Creates a reproducible generator.
    #[instrument(skip(tiers))]
    pub fn seeded(tiers: TierTable, seed: u64) -> Self {
        Self {
            tiers,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Tier table in use.
    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    /// Generates a board for `tier`.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError`] with `InvalidTier` if the tier is not configured
    /// or asks for more pairs than the alphabet holds.
    #[instrument(skip(self))]
    pub fn generate(&mut self, tier: Difficulty) -> Result<Vec<Tile>, DeckError> {
        let pairs = self.tiers.pair_count(tier)?;
        if pairs == 0 || pairs > TILE_ALPHABET.len() {
            return Err(DeckError::invalid_tier(format!(
                "{tier} requests {pairs} pairs, alphabet holds {}",
                TILE_ALPHABET.len()
            )));
        }

        let alphabet: Vec<u8> = (0..TILE_ALPHABET.len() as u8).collect();
        let mut values: Vec<TileValue> = alphabet
            .choose_multiple(&mut self.rng, pairs)
            .flat_map(|&raw| [TileValue::new(raw), TileValue::new(raw)])
            .collect();
        values.shuffle(&mut self.rng);

        let tiles: Vec<Tile> = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| Tile::new(index, value))
            .collect();

        debug!(tiles = tiles.len(), "Deck generated");
        Ok(tiles)
    }

    /// Generates a board from a wire tier code.
    ///
    /// # Errors
    ///
    /// Returns [`DeckError`] with `InvalidTier` for unknown codes.
    pub fn generate_code(&mut self, code: u64) -> Result<Vec<Tile>, DeckError> {
        let tier = Difficulty::from_code(code)?;
        self.generate(tier)
    }
}
