use std::sync::{Arc, RwLock};

use dojo::accounts::{AccountResolver, MemorySelections, SelectionStore};
use dojo::model::StudentRecord;
use dojo::remote::{BillingClient, PaymentsClient};
use dojo::roster::{RosterSub, RosterSync};
use dojo::seed::{self, SEED_PATH};
use dojo::store::MemoryStore;
use meilisearch_sdk::client::Client;
use tracing::{error, info, warn};

use super::{
    config::Config,
    database::{RedisSelections, init_redis},
    search::{init_meilisearch, upsert_students},
};

pub struct AppState {
    pub config: Config,
    pub store: MemoryStore,
    pub resolver: AccountResolver,
    pub payments: PaymentsClient,
    pub billing: BillingClient,
    pub meili_client: Option<Arc<Client>>,
    /// Latest roster emission, what GET /roster serves.
    pub roster: Arc<RwLock<Vec<StudentRecord>>>,
    _roster_sub: RosterSub,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store = MemoryStore::new();
        match &config.seed_url {
            Some(url) => match seed::fetch_seed_remote(url).await {
                Ok(students) => {
                    info!("Seeding roster with {} students from {url}", students.len());
                    seed::apply_seed(&store, students);
                }
                Err(e) => warn!("Failed to fetch seed roster, starting empty: {e}"),
            },
            None => {
                if let Ok(students) = seed::load_seed(SEED_PATH) {
                    info!("Seeding roster with {} students from {SEED_PATH}", students.len());
                    seed::apply_seed(&store, students);
                }
            }
        }

        let selections: Arc<dyn SelectionStore> = match init_redis(&config.redis_url).await {
            Ok(connection) => Arc::new(RedisSelections::new(connection)),
            Err(e) => {
                warn!("Redis unavailable, account selections will not survive restarts: {e}");
                Arc::new(MemorySelections::new())
            }
        };

        let meili_client = match init_meilisearch(&config.meili_url, &config.meili_key).await {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Meilisearch unavailable, roster search disabled: {e}");
                None
            }
        };

        let resolver = AccountResolver::new(Arc::new(store.clone()), selections);
        let payments = PaymentsClient::new(config.payments_url.clone(), config.payments_token.clone());
        let billing = BillingClient::new(config.billing_url.clone());

        let roster = Arc::new(RwLock::new(Vec::new()));
        let latest = roster.clone();
        let meili = meili_client.clone();
        let roster_sub = RosterSync::subscribe(
            Arc::new(store.clone()),
            Arc::new(move |records: Vec<StudentRecord>| {
                *latest.write().unwrap() = records.clone();
                if let Some(client) = meili.clone() {
                    // index refresh rides on its own task, roster updates
                    // never wait on Meilisearch
                    tokio::spawn(async move {
                        if let Err(e) = upsert_students(&client, &records).await {
                            warn!("Roster search index update failed: {e}");
                        }
                    });
                }
            }),
            Arc::new(|err| error!("Roster subscription failed, roster is frozen: {err}")),
        );

        Arc::new(Self {
            config,
            store,
            resolver,
            payments,
            billing,
            meili_client,
            roster,
            _roster_sub: roster_sub,
        })
    }
}
