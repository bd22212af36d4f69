//! DeltaSync: diffs two MySQL database snapshots and synthesizes an
//! incremental deployment script
//!
//! DeltaSync captures the schema and row data of a source and a target
//! database, computes what the target is missing or holds stale, and renders
//! the result as an executable SQL script — idempotent on replay — which it
//! can also apply statement by statement.

pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod script;
pub mod snapshot;
pub mod utils;

// Re-export main types for easier access
pub use config::Config;
pub use db::executor::{DeployReport, ScriptExecutor};
pub use db::session::{DatabaseSession, MySqlSession};
pub use diff::DiffReport;
pub use error::{Error, Result};
pub use script::synthesizer::ScriptSynthesizer;
pub use script::{Statement, StatementKind};
pub use snapshot::reader::SnapshotReader;
pub use snapshot::types::Snapshot;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::script::extract::{extract_keyed_inserts, KeyedInsert};
use crate::script::{tokenizer, write_script_file};
use crate::snapshot::types::RowKey;

/// Initialize DeltaSync with the specified configuration file
pub async fn init(config_path: &str) -> Result<DeltaSyncClient> {
    let config = config::load_from_file(config_path)?;
    DeltaSyncClient::connect(config).await
}

/// The main client for interacting with DeltaSync
pub struct DeltaSyncClient {
    config: Config,
    source: MySqlSession,
    target: MySqlSession,
    cancel: Option<Arc<AtomicBool>>,
}

impl DeltaSyncClient {
    /// Connect both sessions from configuration
    pub async fn connect(config: Config) -> Result<Self> {
        let source = MySqlSession::connect(&config.source).await?;
        let target = MySqlSession::connect(&config.target).await?;

        Ok(Self {
            config,
            source,
            target,
            cancel: None,
        })
    }

    /// Attach a cancellation flag, checked between deploy statements.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    /// Capture both snapshots. The two reads touch independent data and run
    /// concurrently.
    pub async fn read_snapshots(&self) -> Result<(Snapshot, Snapshot)> {
        let source_reader = SnapshotReader::new(&self.source, &self.config.sync);
        let target_reader = SnapshotReader::new(&self.target, &self.config.sync);

        futures::try_join!(
            source_reader.read(self.source.database()),
            target_reader.read(self.target.database()),
        )
    }

    /// Diff the two databases and render the incremental script. An empty
    /// string means the target is already in sync.
    pub async fn generate_script(&self) -> Result<String> {
        let (source, target) = self.read_snapshots().await?;
        let report = DiffReport::generate(&source, &target);

        if report.is_empty() {
            tracing::info!("Target is already in sync with source");
            return Ok(String::new());
        }

        let synthesizer = ScriptSynthesizer::new(&self.config.script);
        Ok(synthesizer.synthesize_diff(&report, &source))
    }

    /// Complete workflow: snapshot both sides, diff, synthesize, persist,
    /// and deploy against the target.
    pub async fn sync_databases(&self) -> Result<DeployReport> {
        let script = self.generate_script().await?;
        if script.is_empty() {
            return Ok(DeployReport { applied: 0 });
        }

        if let Some(path) = &self.config.script.output_file {
            write_script_file(path, &script)?;
        }

        let statements = tokenizer::harden_script(&tokenizer::tokenize(&script));

        if self.config.sync.dry_run {
            for (i, statement) in statements.iter().enumerate() {
                tracing::info!(
                    statement_number = i + 1,
                    sql = statement.text.as_str(),
                    "Statement (dry run)"
                );
            }
            return Ok(DeployReport { applied: 0 });
        }

        self.deploy(&statements).await
    }

    /// Export the source database as a full dump script.
    pub async fn export_dump(&self) -> Result<String> {
        let reader = SnapshotReader::new(&self.source, &self.config.sync);
        let snapshot = reader.read(self.source.database()).await?;

        let synthesizer = ScriptSynthesizer::new(&self.config.script);
        let script = synthesizer.synthesize_dump(&snapshot);

        if let Some(path) = &self.config.script.output_file {
            write_script_file(path, &script)?;
        }
        Ok(script)
    }

    /// Rebuild an incremental script from a previously exported dump: keep
    /// only the INSERTs whose keys the target does not have yet.
    pub async fn incremental_from_script(&self, script_text: &str) -> Result<String> {
        let statements = tokenizer::tokenize(script_text);
        let inserts = extract_keyed_inserts(&statements, &self.config.sync)?;
        tracing::info!(total = inserts.len(), "Recovered keyed inserts from script");

        let mut existing: HashMap<String, HashSet<RowKey>> = HashMap::new();
        let mut missing: Vec<KeyedInsert> = Vec::new();

        for insert in inserts {
            if !existing.contains_key(&insert.table) {
                let keys = self.existing_keys(&insert.table).await?;
                existing.insert(insert.table.clone(), keys);
            }
            let known = existing
                .get(&insert.table)
                .map(|keys| keys.contains(&insert.key))
                .unwrap_or(false);
            if !known {
                tracing::info!(
                    table = insert.table.as_str(),
                    key = %insert.key,
                    "Row missing from target"
                );
                missing.push(insert);
            }
        }

        if missing.is_empty() {
            tracing::info!("Target already has every row in the script");
            return Ok(String::new());
        }

        let synthesizer = ScriptSynthesizer::new(&self.config.script);
        Ok(synthesizer.synthesize_inserts(&missing, self.target.database()))
    }

    /// Tokenize, harden, and deploy a stored script against the target.
    pub async fn deploy_script(&self, script_text: &str) -> Result<DeployReport> {
        let statements = tokenizer::harden_script(&tokenizer::tokenize(script_text));
        self.deploy(&statements).await
    }

    async fn deploy(&self, statements: &[Statement]) -> Result<DeployReport> {
        let mut executor = ScriptExecutor::new(&self.target);
        if let Some(flag) = &self.cancel {
            executor = executor.with_cancel_flag(flag.clone());
        }
        executor.deploy(statements).await
    }

    /// Keys already present in one target table. A table that cannot be read
    /// or keyed contributes an empty set, so all of its rows count as
    /// missing.
    async fn existing_keys(&self, table: &str) -> Result<HashSet<RowKey>> {
        let columns = match self.target.describe_columns(table).await {
            Ok(columns) => columns,
            Err(e) => {
                tracing::warn!(table, error = %e, "Cannot describe target table");
                return Ok(HashSet::new());
            }
        };

        let key_column = self
            .config
            .sync
            .key_columns
            .get(table)
            .cloned()
            .or_else(|| {
                let mut primary = columns.iter().filter(|c| c.primary_key);
                match (primary.next(), primary.next()) {
                    (Some(column), None) => Some(column.name.clone()),
                    _ => None,
                }
            });
        let Some(key_column) = key_column else {
            tracing::warn!(table, "Target table has no usable key; treating all rows as missing");
            return Ok(HashSet::new());
        };

        match self.target.fetch_rows(table).await {
            Ok(rows) => Ok(rows
                .iter()
                .filter_map(|row| row.get(&key_column).and_then(RowKey::from_value))
                .collect()),
            Err(e) => {
                tracing::warn!(table, error = %e, "Cannot read existing rows; treating all as missing");
                Ok(HashSet::new())
            }
        }
    }
}
