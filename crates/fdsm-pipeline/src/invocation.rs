//! Trigger payloads and their canonical parameter record.
//!
//! Three payload shapes start a run:
//!
//! - a bucket upload notification with a `Records` array,
//! - an event-bus "object created" event with a `detail` object,
//! - a direct API request naming the AOI and optional overrides.
//!
//! All of them convert into one [`InvocationParams`].

use crate::config::StorageConfig;
use crate::storage::ObjectLocation;
use crate::{FoundationError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// A parsed trigger payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Invocation {
    /// Bucket upload notification.
    BucketUpload {
        /// Uploaded objects; exactly one is accepted.
        #[serde(rename = "Records")]
        records: Vec<UploadRecord>,
    },
    /// Event-bus object-created event.
    ObjectCreated {
        /// Event body.
        detail: ObjectCreatedDetail,
    },
    /// Direct API request.
    ApiRequest(ApiRequest),
}

/// One record of a bucket upload notification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadRecord {
    /// Storage entity of the record.
    pub s3: StorageEntity,
}

/// Bucket and object of an upload record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageEntity {
    /// Bucket receiving the upload.
    pub bucket: BucketRef,
    /// Uploaded object.
    pub object: ObjectRef,
}

/// Body of an object-created event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectCreatedDetail {
    /// Bucket, when the event names it.
    #[serde(default)]
    pub bucket: Option<BucketRef>,
    /// Created object.
    pub object: ObjectRef,
}

/// A bucket reference.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BucketRef {
    /// Bucket name.
    pub name: String,
}

/// An object reference. Keys in notifications are URL-encoded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectRef {
    /// Object key.
    pub key: String,
}

/// Body of a direct API request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    /// Bucket holding the AOI.
    pub aoi_bucket: String,
    /// AOI object key.
    pub aoi_file: String,
    /// Bucket of a pre-built foundation.
    #[serde(default)]
    pub fnd_bucket: Option<String>,
    /// Key of a pre-built foundation.
    #[serde(default)]
    pub fnd_file: Option<String>,
    /// Buffer factor override.
    #[serde(default)]
    pub fnd_buffer_factor: Option<f64>,
    /// Co-registration minimum resolution override.
    #[serde(default)]
    pub codem_min_resolution: Option<f64>,
    /// Co-registration scale-solving override.
    #[serde(default)]
    pub codem_solve_scale: Option<bool>,
}

/// Everything one run needs to know about its trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationParams {
    /// Bucket holding the AOI.
    pub aoi_bucket: String,
    /// AOI object key, decoded.
    pub aoi_key: String,
    /// A pre-built foundation to use instead of assembling one.
    pub foundation: Option<ObjectLocation>,
    /// Buffer factor override.
    pub buffer_factor: Option<f64>,
    /// Co-registration minimum resolution override.
    pub min_resolution: Option<f64>,
    /// Co-registration scale-solving override.
    pub solve_scale: Option<bool>,
}

impl InvocationParams {
    /// Parameters naming only an AOI.
    pub fn for_aoi(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            aoi_bucket: bucket.into(),
            aoi_key: key.into(),
            foundation: None,
            buffer_factor: None,
            min_resolution: None,
            solve_scale: None,
        }
    }

    /// Location of the AOI object.
    pub fn aoi_location(&self) -> ObjectLocation {
        ObjectLocation::new(&self.aoi_bucket, &self.aoi_key)
    }
}

impl Invocation {
    /// Parse a JSON payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| FoundationError::InvalidInvocation(e.to_string()))
    }

    /// Parse an already-decoded JSON value.
    pub fn from_value(payload: serde_json::Value) -> Result<Self> {
        serde_json::from_value(payload).map_err(|e| FoundationError::InvalidInvocation(e.to_string()))
    }

    /// Convert into canonical parameters. `storage` supplies the AOI bucket
    /// when an event names only a key.
    pub fn into_params(self, storage: &StorageConfig) -> Result<InvocationParams> {
        match self {
            Invocation::BucketUpload { records } => {
                let count = records.len();
                let [record]: [UploadRecord; 1] = records
                    .try_into()
                    .map_err(|_| FoundationError::BatchSize { count })?;
                Ok(InvocationParams::for_aoi(
                    record.s3.bucket.name,
                    decode_key(&record.s3.object.key)?,
                ))
            }
            Invocation::ObjectCreated { detail } => {
                let bucket = detail
                    .bucket
                    .map(|b| b.name)
                    .unwrap_or_else(|| storage.aoi_bucket.clone());
                Ok(InvocationParams::for_aoi(bucket, decode_key(&detail.object.key)?))
            }
            Invocation::ApiRequest(request) => request.into_params(),
        }
    }
}

impl ApiRequest {
    fn into_params(self) -> Result<InvocationParams> {
        let foundation = match (self.fnd_bucket, self.fnd_file) {
            (Some(bucket), Some(key)) => Some(ObjectLocation::new(bucket, key)),
            (None, None) => None,
            _ => {
                return Err(FoundationError::InvalidInvocation(
                    "fndBucket and fndFile must be given together".to_string(),
                ))
            }
        };
        if let Some(factor) = self.fnd_buffer_factor {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(FoundationError::InvalidInvocation(format!(
                    "fndBufferFactor must be finite and positive, got {factor}"
                )));
            }
        }

        Ok(InvocationParams {
            aoi_bucket: self.aoi_bucket,
            aoi_key: self.aoi_file,
            foundation,
            buffer_factor: self.fnd_buffer_factor,
            min_resolution: self.codem_min_resolution,
            solve_scale: self.codem_solve_scale,
        })
    }
}

/// Decode a notification object key: `+` is a space and `%XX` an escaped
/// byte.
pub fn decode_key(raw: &str) -> Result<String> {
    let mut url = Url::parse("s3://decode/")
        .map_err(|e| FoundationError::InvalidInvocation(e.to_string()))?;
    url.set_query(Some(&format!("key={}", raw.replace('&', "%26"))));
    url.query_pairs()
        .next()
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| FoundationError::InvalidInvocation(format!("cannot decode key '{raw}'")))
}
