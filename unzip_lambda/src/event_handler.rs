use aws_lambda_events::event::s3::{S3Event, S3EventRecord};
use chrono::Local;
use lambda_runtime::{tracing, Error, LambdaEvent};

use crate::archive::{extract_archive, ArchiveEntry};
use crate::config::{ErrorPolicy, UnpackConfig};
use crate::error::UnpackError;
use crate::keys::{backup_key, decode_key, destination_prefix};
use crate::storage::{ObjectStorage, PutObject};

const CONTENT_ENCODING: &str = "utf-8";

/// Upload result for a single extracted entry.
#[derive(Debug)]
pub struct EntryOutcome {
    pub destination: String,
    pub result: Result<(), UnpackError>,
}

#[derive(Debug)]
pub struct RecordReport {
    pub bucket: String,
    pub key: String,
    pub backup_key: Option<String>,
    pub entries: Vec<EntryOutcome>,
}

impl RecordReport {
    pub fn failed_uploads(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_err()).count()
    }
}

#[derive(Debug)]
pub enum RecordOutcome {
    Unpacked(RecordReport),
    Skipped { key: String, reason: &'static str },
    Failed {
        key: Option<String>,
        error: UnpackError,
    },
}

impl RecordOutcome {
    /// One line naming what went wrong, or `None` when nothing failed.
    fn failure_summary(&self) -> Option<String> {
        match self {
            RecordOutcome::Unpacked(report) if report.failed_uploads() > 0 => {
                let failed: Vec<String> = report
                    .entries
                    .iter()
                    .filter_map(|e| match &e.result {
                        Err(err) => Some(format!("{} ({})", e.destination, err)),
                        Ok(()) => None,
                    })
                    .collect();
                Some(format!("{}: uploads failed: {}", report.key, failed.join(", ")))
            }
            RecordOutcome::Failed { key, error } => Some(format!(
                "{}: {}",
                key.as_deref().unwrap_or("<no key>"),
                error
            )),
            _ => None,
        }
    }
}

fn get_record_location(record: &S3EventRecord) -> Result<(String, String), UnpackError> {
    let bucket = record
        .s3
        .bucket
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| UnpackError::ParameterValidation("No bucket name found in S3 record".into()))?;
    let key = record
        .s3
        .object
        .key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| UnpackError::ParameterValidation("No object key found in S3 record".into()))?;
    Ok((bucket.to_string(), key.to_string()))
}

/// Copies the archive into the backup folder when it still exists under
/// exactly `key`. Returns the backup key that was written, if any.
async fn backup_archive(
    storage: &dyn ObjectStorage,
    config: &UnpackConfig,
    bucket: &str,
    key: &str,
) -> Result<Option<String>, UnpackError> {
    let listing = storage.list_objects(bucket, key, 1).await?;
    if listing.count == 0 || listing.first_key.as_deref() != Some(key) {
        tracing::info!(bucket, key, "Archive not found by listing, skipping backup");
        return Ok(None);
    }

    let Some(folder) = config.backup_folder.as_deref() else {
        tracing::warn!(bucket, key, "No backup folder configured, skipping backup");
        return Ok(None);
    };

    let copied_key = backup_key(folder, key, &Local::now().naive_local());
    storage.copy_object(bucket, bucket, key, &copied_key).await?;
    tracing::info!(bucket, key, backup_key = %copied_key, "Backed up archive");
    Ok(Some(copied_key))
}

async fn upload_entries(
    storage: &dyn ObjectStorage,
    config: &UnpackConfig,
    bucket: &str,
    destination: &str,
    entries: Vec<ArchiveEntry>,
) -> Vec<EntryOutcome> {
    let mut outcomes = Vec::with_capacity(entries.len());
    for entry in entries {
        let target = format!("{}{}", destination, entry.name);
        let content_type = entry.content_type;
        let result = storage
            .put_object(
                bucket,
                PutObject {
                    key: target.clone(),
                    body: entry.content,
                    content_type: content_type.clone(),
                    content_encoding: CONTENT_ENCODING.to_string(),
                    acl: config.upload_acl.clone(),
                },
            )
            .await;

        match &result {
            Ok(()) => tracing::info!(bucket, destination = %target, content_type = %content_type, "Uploaded entry"),
            Err(err) => {
                tracing::error!(bucket, destination = %target, "Failed to upload entry");
                err.log();
            }
        }
        outcomes.push(EntryOutcome {
            destination: target,
            result,
        });
    }
    outcomes
}

async fn unpack_record(
    storage: &dyn ObjectStorage,
    config: &UnpackConfig,
    record: &S3EventRecord,
) -> Result<RecordOutcome, UnpackError> {
    let (bucket, raw_key) = get_record_location(record)?;
    let key = decode_key(&raw_key);

    let Some(destination) = destination_prefix(&key) else {
        return Ok(RecordOutcome::Skipped {
            key,
            reason: "object key has no .zip suffix",
        });
    };

    let backup_key = backup_archive(storage, config, &bucket, &key).await?;

    let archive = storage.get_object(&bucket, &key).await?;
    tracing::info!(bucket = %bucket, key = %key, size = archive.len(), "Fetched archive");
    let entries = extract_archive(&archive, &config.fallback_content_type)?;
    tracing::info!(bucket = %bucket, key = %key, entries = entries.len(), "Extracted archive");

    let entries = upload_entries(storage, config, &bucket, &destination, entries).await;
    Ok(RecordOutcome::Unpacked(RecordReport {
        bucket,
        key,
        backup_key,
        entries,
    }))
}

fn log_outcome(outcome: &RecordOutcome) {
    match outcome {
        RecordOutcome::Unpacked(report) => {
            let failed: Vec<&str> = report
                .entries
                .iter()
                .filter(|e| e.result.is_err())
                .map(|e| e.destination.as_str())
                .collect();
            if failed.is_empty() {
                tracing::info!(
                    bucket = %report.bucket,
                    key = %report.key,
                    backup_key = ?report.backup_key,
                    entries = report.entries.len(),
                    "Unpacked archive"
                );
            } else {
                tracing::error!(
                    bucket = %report.bucket,
                    key = %report.key,
                    backup_key = ?report.backup_key,
                    failed = ?failed,
                    "Archive partially unpacked"
                );
            }
        }
        RecordOutcome::Skipped { key, reason } => tracing::warn!(key = %key, reason, "Skipped record"),
        RecordOutcome::Failed { key, error } => {
            tracing::error!(key = ?key, error = %error, "Failed to unpack record")
        }
    }
}

/// Runs every record of the event in order. A failing record does not stop
/// the ones after it.
pub async fn process_event(
    storage: &dyn ObjectStorage,
    config: &UnpackConfig,
    event: &S3Event,
) -> Vec<RecordOutcome> {
    let mut outcomes = Vec::with_capacity(event.records.len());
    for record in &event.records {
        let outcome = match unpack_record(storage, config, record).await {
            Ok(outcome) => outcome,
            Err(err) => {
                err.log();
                RecordOutcome::Failed {
                    key: record.s3.object.key.as_deref().map(decode_key),
                    error: err,
                }
            }
        };
        log_outcome(&outcome);
        outcomes.push(outcome);
    }
    outcomes
}

/// Processes the event and applies the configured error policy to the result.
pub async fn handle_event(
    storage: &dyn ObjectStorage,
    config: &UnpackConfig,
    event: &S3Event,
) -> Result<(), Error> {
    if event.records.is_empty() {
        tracing::warn!("No records found in S3 event");
        return Ok(());
    }

    let outcomes = process_event(storage, config, event).await;
    let failures: Vec<String> = outcomes
        .iter()
        .filter_map(RecordOutcome::failure_summary)
        .collect();
    let uploaded: usize = outcomes
        .iter()
        .map(|o| match o {
            RecordOutcome::Unpacked(report) => report.entries.len() - report.failed_uploads(),
            _ => 0,
        })
        .sum();
    tracing::info!(
        records = outcomes.len(),
        failed_records = failures.len(),
        uploaded,
        "Finished processing S3 event"
    );

    match config.error_policy {
        ErrorPolicy::Propagate if !failures.is_empty() => Err(Error::from(format!(
            "{} of {} records failed to unpack: {}",
            failures.len(),
            outcomes.len(),
            failures.join("; ")
        ))),
        _ => Ok(()),
    }
}

pub(crate) async fn function_handler(
    event: LambdaEvent<S3Event>,
    storage: &dyn ObjectStorage,
) -> Result<(), Error> {
    let config = UnpackConfig::from_env().inspect_err(UnpackError::log)?;
    handle_event(storage, &config, &event.payload).await
}
