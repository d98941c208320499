//! The NSQLited engine
//!
//! Owns the pool pair, the transaction manager, the stats registry and the
//! two background tasks (transaction reaper, stats pruner). All SQL enters
//! through [`Engine::query`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::classifier::{sniff_transaction_control, StatementKind};
use crate::error::EngineError;
use crate::executor::{run_statement, ExecOutput};
use crate::pool::Pools;
use crate::stats::{StatsRegistry, PRUNE_INTERVAL};
use crate::transaction::TxnManager;
use crate::value::{Cell, Param};

/// Name of the database file inside the data directory.
pub const DATABASE_FILE: &str = "database.sqlite";

/// Options for opening an engine.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Parent directory for the database file; created if missing.
    pub data_directory: PathBuf,
    /// Idle window after which the reaper rolls back the current
    /// transaction. Also the reaper's tick interval.
    pub transaction_idle_timeout: Duration,
}

impl EngineOptions {
    pub fn new(data_directory: impl Into<PathBuf>) -> Self {
        Self { data_directory: data_directory.into(), transaction_idle_timeout: Duration::from_secs(10) }
    }

    pub fn transaction_idle_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_idle_timeout = timeout;
        self
    }
}

/// A statement to execute.
#[derive(Clone, Debug, Default)]
pub struct Query {
    /// Opaque id of the interactive transaction this statement belongs to;
    /// empty when outside any transaction.
    pub tx_id: String,
    pub sql: String,
    pub params: Vec<Param>,
}

impl Query {
    /// A plain statement with no parameters and no transaction id.
    pub fn statement(sql: impl Into<String>) -> Self { Self { sql: sql.into(), ..Self::default() } }
}

/// What one statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Read { columns: Vec<String>, types: Vec<String>, values: Option<Vec<Vec<Cell>>> },
    Write { last_insert_id: i64, rows_affected: i64 },
    Begin { tx_id: String },
    Commit { tx_id: String },
    Rollback { tx_id: String },
    /// A statement that neither read nor wrote rows (DDL, silent pragmas).
    Ok,
}

/// An [`Outcome`] plus the monotonic execution duration.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub outcome: Outcome,
    pub elapsed: Duration,
}

/// The engine over one database file.
pub struct Engine {
    pools: Pools,
    txns: Arc<TxnManager>,
    stats: Arc<StatsRegistry>,
    // Serializes writes outside the interactive transaction. Redundant with
    // the capacity-1 writer pool, but makes the single-writer intent local.
    write_lock: Mutex<()>,
    stop: watch::Sender<bool>,
}

impl Engine {
    /// Open (creating if needed) the database under the data directory,
    /// build both pools, and start the background tasks.
    pub async fn open(options: EngineOptions) -> Result<Engine, EngineError> {
        std::fs::create_dir_all(&options.data_directory)?;
        let database_path = options.data_directory.join(DATABASE_FILE);

        let pools = Pools::open(&database_path).await?;
        let txns = Arc::new(TxnManager::new(pools.writer().clone(), options.transaction_idle_timeout));
        let stats = Arc::new(StatsRegistry::new());

        let (stop, _) = watch::channel(false);
        spawn_transaction_reaper(txns.clone(), stats.clone(), stop.subscribe(), options.transaction_idle_timeout);
        spawn_stats_pruner(stats.clone(), stop.subscribe());

        info!(path = %database_path.display(), "database started");
        Ok(Engine { pools, txns, stats, write_lock: Mutex::new(()), stop })
    }

    pub fn stats(&self) -> &StatsRegistry { &self.stats }

    /// Execute one statement, routing it by classification. Failures of any
    /// kind count into the `errors` bucket.
    pub async fn query(&self, query: Query) -> Result<QueryOutput, EngineError> {
        let result = self.dispatch(query).await;
        if result.is_err() {
            self.stats.inc_errors();
        }
        result
    }

    async fn dispatch(&self, query: Query) -> Result<QueryOutput, EngineError> {
        let started = Instant::now();
        let kind = self.classify(&query.sql).await?;
        debug!(kind = ?kind, sql = %query.sql, "dispatching statement");

        let outcome = match kind {
            StatementKind::Begin => {
                let _queued = self.stats.queued_transactions_guard();
                let tx_id = self.txns.begin(&query.tx_id).await?;
                self.stats.inc_begins();
                Outcome::Begin { tx_id }
            }
            StatementKind::Commit => {
                let _queued = self.stats.queued_transactions_guard();
                self.txns.commit(&query.tx_id).await?;
                self.stats.inc_commits();
                Outcome::Commit { tx_id: query.tx_id }
            }
            StatementKind::Rollback => {
                let _queued = self.stats.queued_transactions_guard();
                self.txns.rollback(&query.tx_id).await?;
                self.stats.inc_rollbacks();
                Outcome::Rollback { tx_id: query.tx_id }
            }
            StatementKind::Read => {
                let outcome = self.execute_read(&query, kind).await?;
                self.stats.inc_reads();
                outcome
            }
            StatementKind::Write => {
                let outcome = self.execute_write(&query, kind).await?;
                self.stats.inc_writes();
                outcome
            }
        };

        Ok(QueryOutput { outcome, elapsed: started.elapsed() })
    }

    /// Reads inside the current transaction see its uncommitted state by
    /// running on the transaction's writer connection; all other reads use
    /// the reader pool.
    async fn execute_read(&self, query: &Query, kind: StatementKind) -> Result<Outcome, EngineError> {
        let output = match self.txns.checkout(&query.tx_id).await? {
            Some(conn) => self.run_on(&conn, query, kind).await?,
            None => {
                let conn = self.pools.reader().get().await.map_err(EngineError::pool)?;
                self.run_on(&conn, query, kind).await?
            }
        };
        Ok(match output {
            ExecOutput::Rows { columns, types, values } => Outcome::Read { columns, types, values: Some(values) },
            _ => Outcome::Ok,
        })
    }

    /// Writes inside the current transaction run on its connection; writes
    /// outside take the write lock and then the writer pool, which blocks
    /// them for as long as an interactive transaction holds the writer.
    async fn execute_write(&self, query: &Query, kind: StatementKind) -> Result<Outcome, EngineError> {
        let output = match self.txns.checkout(&query.tx_id).await? {
            Some(conn) => self.run_on(&conn, query, kind).await?,
            None => {
                let _queued = self.stats.queued_writes_guard();
                let _write = self.write_lock.lock().await;
                let conn = self.pools.writer().get().await.map_err(EngineError::pool)?;
                self.run_on(&conn, query, kind).await?
            }
        };
        Ok(match output {
            ExecOutput::Write { last_insert_id, rows_affected } => Outcome::Write { last_insert_id, rows_affected },
            _ => Outcome::Ok,
        })
    }

    async fn run_on(&self, conn: &crate::connection::DbConn, query: &Query, kind: StatementKind) -> Result<ExecOutput, EngineError> {
        let sql = query.sql.clone();
        let params = query.params.clone();
        conn.with_connection(move |c| run_statement(c, &sql, &params, kind)).await
    }

    /// Classify a SQL text without executing it: transaction-control prefix
    /// first, otherwise prepare on a reader and inspect the engine's
    /// read-only flag.
    async fn classify(&self, sql: &str) -> Result<StatementKind, EngineError> {
        if let Some(kind) = sniff_transaction_control(sql) {
            return Ok(kind);
        }

        let conn = self.pools.reader().get().await.map_err(EngineError::pool)?;
        let sql = sql.to_string();
        let read_only = conn
            .with_connection(move |c| {
                let stmt = c.prepare(&sql).map_err(EngineError::DetectQueryType)?;
                Ok(stmt.readonly())
            })
            .await?;

        Ok(if read_only { StatementKind::Read } else { StatementKind::Write })
    }

    /// Graceful shutdown: stop the background tasks and roll back any live
    /// transaction so the database file is left clean.
    pub async fn close(&self) {
        let _ = self.stop.send(true);
        self.txns.shutdown().await;
        info!("database stopped");
    }
}

fn spawn_transaction_reaper(txns: Arc<TxnManager>, stats: Arc<StatsRegistry>, mut stop: watch::Receiver<bool>, timeout: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(timeout);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => match txns.reap_idle().await {
                    Ok(true) => {
                        stats.inc_rollbacks();
                        warn!("rolled back idle transaction");
                    }
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "failed to roll back idle transaction"),
                },
            }
        }
    });
}

fn spawn_stats_pruner(stats: Arc<StatsRegistry>, mut stop: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => stats.prune(Utc::now()),
            }
        }
    });
}
