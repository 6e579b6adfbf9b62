use std::path::PathBuf;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};
use unq_core::{AUTHOR, BridgeError, BridgeResult, ENDPOINTS, GITHUB_URL, TOOL_NAME, TOOL_VERSION};
use unq_fs::{
    ContentSearch, EntryKind, FileContent, Listing, SearchOptions, SearchReport, TreeNode,
    TreeWalker,
};
use unq_terminal::ExecutionResult;
use unq_tunnel::TunnelState;

use crate::error::ApiError;
use crate::state::SharedState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run a blocking filesystem operation off the async workers.
async fn blocking<T, F>(op: F) -> Result<T, ApiError>
where
    F: FnOnce() -> BridgeResult<T> + Send + 'static,
    T: Send + 'static,
{
    let joined = tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| BridgeError::Other(anyhow::anyhow!("Filesystem task failed: {e}")))?;
    Ok(joined?)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TreeQuery {
    pub max_depth: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WriteRequest {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenameRequest {
    pub old_name: String,
    pub new_name: String,
    pub overwrite: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExecuteRequest {
    pub code: String,
    pub language: String,
    pub filename: String,
}

impl Default for ExecuteRequest {
    fn default() -> Self {
        Self {
            code: String::new(),
            language: "python".into(),
            filename: "temp".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InstallRequest {
    pub package: String,
    pub manager: String,
}

impl Default for InstallRequest {
    fn default() -> Self {
        Self {
            package: String::new(),
            manager: "pip".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitRequest {
    pub command: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub query: String,
    pub file_type: String,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            file_type: "*".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub tool_name: &'static str,
    pub version: &'static str,
    pub author: &'static str,
    pub github: &'static str,
    /// Empty when no tunnel URL is known.
    pub tunnel_url: String,
    pub tunnel_state: Option<TunnelState>,
    pub status: &'static str,
    pub base_dir: PathBuf,
    pub runtime: String,
    pub available_endpoints: Vec<EndpointInfo>,
}

pub async fn status(State(state): State<SharedState>) -> Json<StatusReport> {
    Json(StatusReport {
        tool_name: TOOL_NAME,
        version: TOOL_VERSION,
        author: AUTHOR,
        github: GITHUB_URL,
        tunnel_url: state.tunnel_url().unwrap_or_default(),
        tunnel_state: state.tunnel_state(),
        status: "active",
        base_dir: state.base_dir().to_path_buf(),
        runtime: format!("{TOOL_NAME} {TOOL_VERSION} ({})", std::env::consts::OS),
        available_endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

pub async fn list_files(
    State(state): State<SharedState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Listing> {
    let Query(query) = query?;
    let files = state.files.clone();
    let listing = blocking(move || files.list(query.path.as_deref())).await?;
    Ok(Json(listing))
}

pub async fn read_file(
    State(state): State<SharedState>,
    Path(filepath): Path<String>,
) -> ApiResult<FileContent> {
    let files = state.files.clone();
    let content = blocking(move || files.read(&filepath)).await?;
    Ok(Json(content))
}

pub async fn write_file(
    State(state): State<SharedState>,
    Path(filepath): Path<String>,
    body: Result<Json<WriteRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let files = state.files.clone();
    let outcome = blocking(move || files.write(&filepath, &body.content)).await?;
    Ok(Json(json!({
        "message": "File saved successfully",
        "path": outcome.path,
        "size": outcome.size,
    })))
}

pub async fn delete_file(
    State(state): State<SharedState>,
    Path(filepath): Path<String>,
) -> ApiResult<Value> {
    let files = state.files.clone();
    let kind = blocking(move || files.delete(&filepath)).await?;
    let message = match kind {
        EntryKind::File => "File deleted successfully",
        EntryKind::Directory => "Directory deleted successfully",
    };
    Ok(Json(json!({ "message": message })))
}

pub async fn rename(
    State(state): State<SharedState>,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let overwrite = body.overwrite.unwrap_or(state.rename_overwrite);
    let files = state.files.clone();
    let outcome =
        blocking(move || files.rename(&body.old_name, &body.new_name, overwrite)).await?;
    Ok(Json(json!({
        "message": "File renamed successfully",
        "old_path": outcome.old_path,
        "new_path": outcome.new_path,
    })))
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

pub async fn execute(
    State(state): State<SharedState>,
    body: Result<Json<ExecuteRequest>, JsonRejection>,
) -> ApiResult<ExecutionResult> {
    let Json(body) = body?;
    info!(language = %body.language, "execute request");
    let result = state
        .runner
        .execute(&body.code, &body.language, &body.filename)
        .await?;
    Ok(Json(result))
}

pub async fn install(
    State(state): State<SharedState>,
    body: Result<Json<InstallRequest>, JsonRejection>,
) -> ApiResult<ExecutionResult> {
    let Json(body) = body?;
    let result = state.installer.install(&body.package, &body.manager).await?;
    Ok(Json(result))
}

pub async fn git(
    State(state): State<SharedState>,
    body: Result<Json<GitRequest>, JsonRejection>,
) -> ApiResult<ExecutionResult> {
    let Json(body) = body?;
    let result = state.git.run(&body.command).await?;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

pub async fn search(
    State(state): State<SharedState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<SearchReport> {
    let Json(body) = body?;
    let search = ContentSearch::new(state.base_dir());
    let options = SearchOptions {
        file_type: body.file_type,
        include_hidden: state.search_include_hidden,
    };
    debug!(query = %body.query, file_type = %options.file_type, "search request");
    let report = blocking(move || search.search(&body.query, &options)).await?;
    Ok(Json(report))
}

pub async fn tree(
    State(state): State<SharedState>,
    query: Result<Query<TreeQuery>, QueryRejection>,
) -> ApiResult<TreeNode> {
    let Query(query) = query?;
    let walker = query.max_depth.map(TreeWalker::new).unwrap_or(state.tree);
    let root = state.base_dir().to_path_buf();
    let node = blocking(move || Ok(walker.build(&root))).await?;
    Ok(Json(node))
}
