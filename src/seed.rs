//! Первичное заполнение справочников: фильмы с ценами и залы с местами.
//!
//! Файл ссылается на сущности по именам, поэтому не зависит от того, какие id
//! выдаст хранилище. Засев идет одной атомарной операцией хранилища и только в
//! пустой каталог: повторный старт с тем же `SEED_FILE` ничего не дублирует.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::error::{CinemaError, CinemaResult};
use crate::models::SeatType;
use crate::store::CinemaStore;

#[derive(Debug, Clone, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub movies: Vec<SeedMovie>,
    #[serde(default)]
    pub halls: Vec<SeedHall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedMovie {
    pub name: String,
    #[serde(default)]
    pub prices: Vec<SeedPrice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPrice {
    pub seat_type: SeatType,
    pub price_in_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedHall {
    pub name: String,
    #[serde(default)]
    pub seats: Vec<SeedSeat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSeat {
    pub label: String,
    #[serde(default)]
    pub seat_type: SeatType,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub movies: usize,
    pub prices: usize,
    pub halls: usize,
    pub seats: usize,
}

impl SeedData {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("seed data is not valid JSON")
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Проверки, которые иначе всплыли бы посреди записи.
    pub fn validate(&self) -> CinemaResult<()> {
        for movie in &self.movies {
            if movie.name.trim().is_empty() {
                return Err(CinemaError::validation("movie name must not be empty"));
            }
            if let Some(price) = movie.prices.iter().find(|p| p.price_in_cents < 0) {
                return Err(CinemaError::validation(format!(
                    "{} price for '{}' must be >= 0",
                    price.seat_type, movie.name
                )));
            }
        }
        for hall in &self.halls {
            let mut labels = HashSet::new();
            if let Some(seat) = hall.seats.iter().find(|s| !labels.insert(s.label.as_str())) {
                return Err(CinemaError::validation(format!(
                    "seat '{}' already exists in hall '{}'",
                    seat.label, hall.name
                )));
            }
        }
        Ok(())
    }

    /// `None` — каталог уже заполнен, засев пропущен.
    pub async fn apply(&self, store: &dyn CinemaStore) -> Result<Option<SeedReport>> {
        let report = store
            .load_seed(self)
            .await
            .context("failed to apply seed data")?;

        match &report {
            Some(report) => info!(
                "Seeded {} movies, {} prices, {} halls, {} seats",
                report.movies, report.prices, report.halls, report.seats
            ),
            None => info!("Catalog is not empty, seed skipped"),
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CatalogStore, HallLayoutStore, MemoryStore};

    const SEED: &str = r#"{
        "movies": [
            { "name": "Stalker", "prices": [
                { "seat_type": "base", "price_in_cents": 1000 },
                { "seat_type": "vip", "price_in_cents": 1500 }
            ] }
        ],
        "halls": [
            { "name": "Red", "seats": [
                { "label": "A1" },
                { "label": "A2", "seat_type": "couple" }
            ] }
        ]
    }"#;

    #[tokio::test]
    async fn applies_seed_to_store() {
        let store = MemoryStore::new();
        let report = SeedData::from_json(SEED).unwrap().apply(&store).await.unwrap();
        assert_eq!(
            report,
            Some(SeedReport { movies: 1, prices: 2, halls: 1, seats: 2 })
        );

        let seats = store.hall_seats(1).await.unwrap();
        assert_eq!(seats[0].seat_type, SeatType::Base);
        assert_eq!(seats[1].seat_type, SeatType::Couple);
    }

    #[tokio::test]
    async fn second_start_does_not_duplicate_catalog() {
        let store = MemoryStore::new();
        let seed = SeedData::from_json(SEED).unwrap();
        seed.apply(&store).await.unwrap();

        assert_eq!(seed.apply(&store).await.unwrap(), None);
        assert!(store.hall(2).await.unwrap().is_none());
        assert!(store.movie(2).await.unwrap().is_none());
        assert_eq!(store.hall_seats(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_seat_label_fails_the_seed_without_writes() {
        let json = r#"{
            "movies": [ { "name": "Mirror" } ],
            "halls": [
                { "name": "Green", "seats": [ { "label": "A1" } ] },
                { "name": "Blue", "seats": [ { "label": "A1" }, { "label": "A1" } ] }
            ]
        }"#;
        let store = MemoryStore::new();
        let err = SeedData::from_json(json).unwrap().apply(&store).await.unwrap_err();
        assert!(format!("{:#}", err).contains("A1"));

        // Ничего не записано, следующий старт с исправленным файлом засеет каталог
        assert!(store.movie(1).await.unwrap().is_none());
        assert!(store.hall(1).await.unwrap().is_none());
        let report = SeedData::from_json(SEED).unwrap().apply(&store).await.unwrap();
        assert!(report.is_some());
    }

    #[test]
    fn negative_price_is_rejected_up_front() {
        let json = r#"{ "movies": [ { "name": "Mirror", "prices": [ { "seat_type": "vip", "price_in_cents": -5 } ] } ] }"#;
        let err = SeedData::from_json(json).unwrap().validate().unwrap_err();
        assert!(matches!(err, CinemaError::Validation(_)));
    }
}
