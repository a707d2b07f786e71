//! Writers for the artifacts handed to the rendering layer.
//!
//! Supports JSON logging, JSON files, the stop-location CSV and S3 upload.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::records::ResolvedStop;

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes a value as pretty-printed JSON, creating parent directories.
pub fn write_json(path: &str, value: &impl Serialize) -> Result<()> {
    create_parent(path)?;
    let file = File::create(path).with_context(|| format!("cannot create '{path}'"))?;
    serde_json::to_writer_pretty(file, value)?;
    debug!(path, "JSON written");
    Ok(())
}

#[derive(Serialize)]
struct LocationRow<'a> {
    stop_name: &'a str,
    latitude: f64,
    longitude: f64,
}

/// Writes `stop_name,latitude,longitude` rows for the map widget, replacing
/// any previous file.
pub fn write_locations(path: &str, stops: &[ResolvedStop]) -> Result<()> {
    create_parent(path)?;
    let file = File::create(path).with_context(|| format!("cannot create '{path}'"))?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for stop in stops {
        writer.serialize(LocationRow {
            stop_name: &stop.stop_name,
            latitude: stop.coordinate.latitude,
            longitude: stop.coordinate.longitude,
        })?;
    }
    writer.flush()?;

    debug!(path, rows = stops.len(), "Locations written");
    Ok(())
}

fn create_parent(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Serializes a value to JSON and uploads it to an S3 bucket with `application/json` content type.
pub async fn write_json_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    value: &impl Serialize,
) -> Result<()> {
    let body = serde_json::to_vec(value)?;

    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(body.into())
        .content_type("application/json")
        .send()
        .await
        .with_context(|| format!("S3 upload to s3://{bucket}/{key} failed"))?;

    info!(bucket, key, "Uploaded to S3");
    Ok(())
}
