//! # Meilisearch
//!
//! Search engine behind the admin roster search box.
//!
//! ## Schema
//! - One index for all students
//! - Fields: key (**string**, primary), name (**string**), status
//!   (**string**), belt (**string**), city (**string**)
//!
//! ## Sync
//! The index is refreshed from every roster emission, so it trails the live
//! projection by one Meilisearch task. The index is upsert-only (as the
//! roster is append-mostly); the search proxy drops hits that have left the
//! roster, so departures never need index deletes.
//!
//! ## Proxy
//! The frontend never talks to Meilisearch directly. Search queries go
//! through the backend, which keeps the admin key server-side and lets the
//! proxy filter results against the live roster.
use std::sync::Arc;

use dojo::model::StudentRecord;
use meilisearch_sdk::{
    client::Client,
    errors::Error,
    settings::{MinWordSizeForTypos, Settings, TypoToleranceSettings},
};
use serde::{Deserialize, Serialize};

pub const STUDENT_INDEX: &str = "students";
pub const STUDENT_KEY: &str = "key";
pub const STUDENT_NAME: &str = "name";
pub const STUDENT_STATUS: &str = "status";
pub const STUDENT_BELT: &str = "belt";
pub const STUDENT_CITY: &str = "city";

#[derive(Serialize, Deserialize)]
pub struct MeiliStudent {
    pub key: String,
    pub name: String,
    pub status: String,
    pub belt: String,
    pub city: String,
}

pub async fn init_meilisearch(meili_url: &str, meili_admin_key: &str) -> Result<Arc<Client>, Error> {
    let meili_client = Arc::new(Client::new(meili_url, Some(meili_admin_key))?);

    meili_client
        .index(STUDENT_INDEX)
        .set_settings(&init_settings())
        .await?;

    Ok(meili_client)
}

pub async fn upsert_students(
    meili_client: &Arc<Client>,
    records: &[StudentRecord],
) -> Result<(), Error> {
    let meili_students: Vec<MeiliStudent> = records
        .iter()
        .map(|record| MeiliStudent {
            key: record.key.to_string(),
            name: record.profile.full_name.clone(),
            status: record.profile.status.as_str().to_string(),
            belt: record.profile.belt.clone().unwrap_or_default(),
            city: record.profile.city.clone().unwrap_or_default(),
        })
        .collect();

    upsert_items(meili_client, STUDENT_INDEX, &meili_students, STUDENT_KEY).await
}

pub async fn search_students(
    meili_client: &Arc<Client>,
    query: &str,
) -> Result<Vec<MeiliStudent>, Error> {
    let results = meili_client
        .index(STUDENT_INDEX)
        .search()
        .with_query(query)
        .with_limit(50)
        .execute::<MeiliStudent>()
        .await?;

    Ok(results.hits.into_iter().map(|hit| hit.result).collect())
}

async fn upsert_items<T>(
    meili_client: &Arc<Client>,
    index_name: &str,
    items: &[T],
    id_name: &str,
) -> Result<(), Error>
where
    T: Serialize + Send + Sync,
{
    meili_client
        .index(index_name)
        .add_or_update(items, Some(id_name))
        .await?
        .wait_for_completion(meili_client, None, None)
        .await?;

    Ok(())
}

fn init_settings() -> Settings {
    Settings::new()
        .with_ranking_rules([
            "words",
            "typo",
            "proximity",
            "exactness",
            "attribute",
            "sort",
        ])
        .with_distinct_attribute(Some(STUDENT_KEY))
        .with_filterable_attributes([STUDENT_STATUS, STUDENT_BELT, STUDENT_CITY])
        .with_searchable_attributes([STUDENT_NAME])
        .with_sortable_attributes([STUDENT_NAME])
        .with_typo_tolerance(TypoToleranceSettings {
            enabled: Some(true),
            disable_on_attributes: None,
            disable_on_words: None,
            min_word_size_for_typos: Some(MinWordSizeForTypos {
                one_typo: Some(5),
                two_typos: Some(9),
            }),
        })
}
