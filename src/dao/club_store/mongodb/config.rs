use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE_NAME: &str = "padel_club";
const APP_NAME: &str = "padel-club-back";
const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;
const FIRST_RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);
// Below the ledger commit timeout, so an unreachable server fails the commit instead of
// stalling it.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Connection settings for [`super::MongoClubStore`].
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed driver options.
    pub options: ClientOptions,
    /// Database holding the club collections.
    pub database_name: String,
    /// Pings attempted before a connection is given up.
    pub connect_attempts: u32,
}

impl MongoConfig {
    /// Parse `uri` and pick `db_name` (or the default database).
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());
        options
            .server_selection_timeout
            .get_or_insert(SERVER_SELECTION_TIMEOUT);

        Ok(Self {
            options,
            database_name: db_name.unwrap_or(DEFAULT_DATABASE_NAME).to_owned(),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        })
    }

    /// Build a client and wait until the database answers a ping.
    pub(super) async fn connect(&self) -> MongoResult<(Client, Database)> {
        let client = Client::with_options(self.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&self.database_name);

        let mut delay = FIRST_RETRY_DELAY;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match database.run_command(doc! { "ping": 1 }).await {
                Ok(_) => return Ok((client, database)),
                Err(source) if attempts >= self.connect_attempts.max(1) => {
                    return Err(MongoDaoError::InitialPing { attempts, source });
                }
                Err(err) => {
                    debug!(
                        attempts,
                        database = %self.database_name,
                        error = %err,
                        "club database ping failed; retrying"
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    }
}
