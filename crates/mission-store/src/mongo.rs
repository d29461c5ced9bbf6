use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use futures::TryStreamExt;
use mission_proto::{Coordinates, Mission, Parameters};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, Credential, IndexOptions, UpdateModifications};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::{MissionStore, StoreError};

pub const DATABASE: &str = "DronePlatform";
pub const COLLECTION: &str = "mission";

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    /// "mongodb+srv" for Atlas clusters, "mongodb" for a plain host list.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Cluster host (or host:port list for plain "mongodb").
    pub host: String,

    /// Database named in the connection string. Default "myFirstDatabase".
    pub auth_db: Option<String>,

    /// Environment variables holding the credentials.
    /// Default MONGOUSER / MONGOPASS.
    pub user_env: Option<String>,
    pub pass_env: Option<String>,

    pub app_name: Option<String>,
}

fn default_scheme() -> String {
    "mongodb+srv".into()
}

impl MongoConfig {
    pub fn uri(&self) -> String {
        format!(
            "{}://{}/{}?retryWrites=true&w=majority",
            self.scheme,
            self.host,
            self.auth_db.as_deref().unwrap_or("myFirstDatabase")
        )
    }

    fn user_var(&self) -> &str {
        self.user_env.as_deref().unwrap_or("MONGOUSER")
    }

    fn pass_var(&self) -> &str {
        self.pass_env.as_deref().unwrap_or("MONGOPASS")
    }
}

#[derive(Clone)]
pub struct MongoCredentials {
    pub user: String,
    pub pass: Zeroizing<String>,
}

impl MongoCredentials {
    pub fn from_env(cfg: &MongoConfig) -> Result<Self, StoreError> {
        let read = |var: &str| {
            std::env::var(var).map_err(|_| StoreError::Config(format!("environment variable {} not set", var)))
        };
        Ok(Self { user: read(cfg.user_var())?, pass: Zeroizing::new(read(cfg.pass_var())?) })
    }
}

impl fmt::Debug for MongoCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoCredentials").field("user", &self.user).field("pass", &"<redacted>").finish()
    }
}

/// Mission as laid out in the collection: ObjectId key, BSON datetimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MissionDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    #[serde(rename = "missionID")]
    mission_id: String,
    #[serde(rename = "droneID")]
    drone_id: String,
    #[serde(rename = "dateCreated")]
    date_created: bson::DateTime,
    #[serde(rename = "lastUpdated")]
    last_updated: bson::DateTime,
    #[serde(rename = "inProgress")]
    in_progress: bool,
    waypoints: Vec<WaypointDocument>,
    parameters: Parameters,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct WaypointDocument {
    lat: f64,
    lng: f64,
}

impl MissionDocument {
    fn from_mission(m: &Mission, id: ObjectId) -> Self {
        Self {
            id,
            mission_id: m.mission_id.clone(),
            drone_id: m.drone_id.clone(),
            date_created: bson::DateTime::from_time_0_3(m.date_created),
            last_updated: bson::DateTime::from_time_0_3(m.last_updated),
            in_progress: m.in_progress,
            waypoints: m.waypoints.iter().map(|w| WaypointDocument { lat: w.lat, lng: w.lng }).collect(),
            parameters: m.parameters.clone(),
        }
    }

    fn into_mission(self) -> Mission {
        Mission {
            id: self.id.to_hex(),
            mission_id: self.mission_id,
            drone_id: self.drone_id,
            date_created: self.date_created.to_time_0_3(),
            last_updated: self.last_updated.to_time_0_3(),
            in_progress: self.in_progress,
            waypoints: self.waypoints.into_iter().map(|w| Coordinates { lat: w.lat, lng: w.lng }).collect(),
            parameters: self.parameters,
        }
    }
}

/// MongoDB-backed gateway. Holds one pooled client for the whole process,
/// created on first use.
pub struct MongoStore {
    cfg: MongoConfig,
    creds: MongoCredentials,
    op_timeout: Duration,
    client: OnceCell<Client>,
}

impl MongoStore {
    pub fn new(cfg: MongoConfig, creds: MongoCredentials, op_timeout: Duration) -> Self {
        Self { cfg, creds, op_timeout, client: OnceCell::new() }
    }

    async fn client(&self) -> Result<&Client, StoreError> {
        self.client
            .get_or_try_init(|| async {
                let mut opts = ClientOptions::parse(self.cfg.uri()).await.map_err(transport)?;
                let mut cred = Credential::default();
                cred.username = Some(self.creds.user.clone());
                cred.password = Some(self.creds.pass.to_string());
                opts.credential = Some(cred);
                opts.connect_timeout = Some(self.op_timeout);
                opts.server_selection_timeout = Some(self.op_timeout);
                opts.app_name = self.cfg.app_name.clone();
                let client = Client::with_options(opts).map_err(transport)?;
                info!(host = %self.cfg.host, db = DATABASE, "mongo: client ready");
                Ok::<Client, StoreError>(client)
            })
            .await
    }

    async fn missions(&self) -> Result<Collection<MissionDocument>, StoreError> {
        Ok(self.client().await?.database(DATABASE).collection(COLLECTION))
    }

    /// Runs one store operation under the per-operation deadline.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(res) => {
                if let Err(e) = &res {
                    debug!(op, "mongo: {}", e);
                }
                res
            }
            Err(_) => {
                warn!(op, timeout_ms = self.op_timeout.as_millis() as u64, "mongo: operation timed out");
                Err(StoreError::Timeout(self.op_timeout))
            }
        }
    }
}

fn transport(e: mongodb::error::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(*e.kind, ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY)
}

/// Pipeline update that sets `fields` and moves `lastUpdated` to
/// `max(now, lastUpdated + 1ms)` in the same server-side write.
fn advance_last_updated(now: OffsetDateTime, mut fields: bson::Document) -> UpdateModifications {
    fields.insert(
        "lastUpdated",
        doc! { "$max": [bson::DateTime::from_time_0_3(now), { "$add": ["$lastUpdated", 1_i64] }] },
    );
    UpdateModifications::Pipeline(vec![doc! { "$set": fields }])
}

#[async_trait]
impl MissionStore for MongoStore {
    async fn insert(&self, mission: &Mission) -> Result<String, StoreError> {
        self.bounded("insert", async {
            let id = ObjectId::parse_str(&mission.id).unwrap_or_else(|_| ObjectId::new());
            let doc = MissionDocument::from_mission(mission, id);
            self.missions().await?.insert_one(&doc, None).await.map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::Duplicate(mission.mission_id.clone())
                } else {
                    transport(e)
                }
            })?;
            Ok(id.to_hex())
        })
        .await
    }

    async fn update_parameters(
        &self,
        mission_id: &str,
        last_updated: OffsetDateTime,
        parameters: &Parameters,
    ) -> Result<(), StoreError> {
        self.bounded("update_parameters", async {
            let parameters = bson::to_bson(parameters).map_err(|e| StoreError::Codec(e.to_string()))?;
            let update = advance_last_updated(last_updated, doc! { "parameters": { "$literal": parameters } });
            let res = self
                .missions()
                .await?
                .update_one(doc! { "missionID": mission_id }, update, None)
                .await
                .map_err(transport)?;
            if res.matched_count == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn set_in_progress(
        &self,
        mission_id: &str,
        last_updated: OffsetDateTime,
        in_progress: bool,
    ) -> Result<(), StoreError> {
        self.bounded("set_in_progress", async {
            let update = advance_last_updated(last_updated, doc! { "inProgress": { "$literal": in_progress } });
            let res = self
                .missions()
                .await?
                .update_one(doc! { "missionID": mission_id }, update, None)
                .await
                .map_err(transport)?;
            if res.matched_count == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn find_by_mission_id(&self, mission_id: &str) -> Result<Mission, StoreError> {
        self.bounded("find_by_mission_id", async {
            self.missions()
                .await?
                .find_one(doc! { "missionID": mission_id }, None)
                .await
                .map_err(transport)?
                .map(MissionDocument::into_mission)
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn find_by_drone_id(&self, drone_id: &str) -> Result<Vec<Mission>, StoreError> {
        self.bounded("find_by_drone_id", async {
            let cursor =
                self.missions().await?.find(doc! { "droneID": drone_id }, None).await.map_err(transport)?;
            let docs: Vec<MissionDocument> = cursor.try_collect().await.map_err(transport)?;
            if docs.is_empty() {
                return Err(StoreError::NotFound);
            }
            Ok(docs.into_iter().map(MissionDocument::into_mission).collect())
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("ping", async {
            let admin = self.client().await?.database("admin");
            admin.run_command(doc! { "ping": 1 }, None).await.map_err(transport)?;
            Ok(())
        })
        .await
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        self.bounded("ensure_indexes", async {
            let indexes = vec![
                IndexModel::builder()
                    .keys(doc! { "missionID": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                IndexModel::builder().keys(doc! { "droneID": 1 }).build(),
            ];
            self.missions().await?.create_indexes(indexes, None).await.map_err(transport)?;
            info!(collection = COLLECTION, "mongo: indexes ensured");
            Ok(())
        })
        .await
    }
}
