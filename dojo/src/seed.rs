//! Seed roster.
//!
//! The in-repo store starts empty; deployments that want a pre-populated
//! roster ship it as a JSON file, loadable from disk or fetched from a
//! remote export at startup.

use std::fs;
use std::path::Path;

use anyhow::Error;
use reqwest::get;
use serde::{Deserialize, Serialize};

use crate::model::{Profile, StudentKey};
use crate::store::MemoryStore;

pub const SEED_PATH: &str = "seed.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct SeedStudent {
    pub key: StudentKey,
    pub profile: Profile,
}

pub fn load_seed(path: impl AsRef<Path>) -> Result<Vec<SeedStudent>, Error> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

pub fn write_seed(path: impl AsRef<Path>, seed: &[SeedStudent]) -> Result<(), Error> {
    Ok(fs::write(path, serde_json::to_vec_pretty(seed)?)?)
}

pub async fn fetch_seed_remote(url: &str) -> Result<Vec<SeedStudent>, Error> {
    let response = get(url).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Records first, then profiles, so a live roster subscription sees the
/// same record-then-profile order the admin UI produces.
pub fn apply_seed(store: &MemoryStore, seed: Vec<SeedStudent>) {
    for student in &seed {
        store.put_student(student.key.clone());
    }
    for student in seed {
        store.put_profile(student.key, student.profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_seed_populates_the_store() {
        let store = MemoryStore::new();
        let seed = vec![
            SeedStudent {
                key: StudentKey::from("a"),
                profile: Profile {
                    full_name: "Ana".to_string(),
                    ..Profile::default()
                },
            },
            SeedStudent {
                key: StudentKey::from("b"),
                profile: Profile {
                    full_name: "Bia".to_string(),
                    ..Profile::default()
                },
            },
        ];

        apply_seed(&store, seed);

        assert!(store.has_student(&StudentKey::from("a")));
        assert!(store.has_student(&StudentKey::from("b")));
    }

    #[test]
    fn test_seed_round_trips_through_json() {
        let seed = vec![SeedStudent {
            key: StudentKey::from("a"),
            profile: Profile {
                full_name: "Ana".to_string(),
                belt: Some("orange".to_string()),
                ..Profile::default()
            },
        }];
        let json = serde_json::to_string(&seed).unwrap();
        let back: Vec<SeedStudent> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0].key, StudentKey::from("a"));
        assert_eq!(back[0].profile.belt.as_deref(), Some("orange"));
    }
}
