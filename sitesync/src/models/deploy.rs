//! Deploy models

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing state of a deploy as reported by the remote side
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployState {
    /// Created, nothing submitted yet
    #[default]
    New,

    /// Async submission, the server is still preparing the file list
    Preparing,

    /// Async preparation finished, uploads can start
    Prepared,

    /// Waiting for required files
    Uploading,

    /// All required files received
    Uploaded,

    /// Zip deploy queued for extraction
    Pending,

    /// Post-processing after uploads
    Processing,

    /// Live (or ready to publish for drafts)
    Ready,

    /// Processing failed, see `error_message`
    Error,

    /// Any state this client does not know about
    #[serde(other)]
    Unknown,
}

impl DeployState {
    /// Whether the deploy has left the preparation phase successfully
    pub fn is_prepared(&self) -> bool {
        matches!(self, DeployState::Prepared | DeployState::Ready)
    }

    pub fn is_ready(&self) -> bool {
        *self == DeployState::Ready
    }

    pub fn is_error(&self) -> bool {
        *self == DeployState::Error
    }
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeployState::New => "new",
            DeployState::Preparing => "preparing",
            DeployState::Prepared => "prepared",
            DeployState::Uploading => "uploading",
            DeployState::Uploaded => "uploaded",
            DeployState::Pending => "pending",
            DeployState::Processing => "processing",
            DeployState::Ready => "ready",
            DeployState::Error => "error",
            DeployState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A specific deploy of a site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deploy {
    /// Server-assigned ID, empty until negotiation succeeds
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub site_id: String,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub state: DeployState,

    /// Cause of error if state is `error`
    #[serde(default)]
    pub error_message: Option<String>,

    /// Digests of files that must be uploaded before the deploy is ready
    #[serde(default, deserialize_with = "null_as_empty")]
    pub required: Vec<String>,

    #[serde(default)]
    pub deploy_url: Option<String>,

    #[serde(default, rename = "url")]
    pub site_url: Option<String>,

    #[serde(default)]
    pub screenshot_url: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Deploy {
    /// Error message reported by the remote side, or a generic one
    pub fn failure_message(&self) -> String {
        match self.error_message.as_deref() {
            Some(msg) if !msg.is_empty() => msg.to_string(),
            _ => format!("deploy {} entered the error state", self.id),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// File list body submitted when creating a deploy from a directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployFiles {
    /// Relative path to hex digest
    pub files: BTreeMap<String, String>,

    /// Ask the server to prepare the deploy in the background
    #[serde(rename = "async")]
    pub is_async: bool,
}

/// Body of a deploy-creation request
#[derive(Debug, Clone, PartialEq)]
pub enum DeployBody {
    /// JSON manifest of path to digest
    Files(DeployFiles),

    /// Zip archive on disk, streamed as the raw body
    Archive(PathBuf),
}

impl DeployBody {
    pub fn content_type(&self) -> &'static str {
        match self {
            DeployBody::Files(_) => "application/json",
            DeployBody::Archive(_) => "application/zip",
        }
    }
}
