//! CLI command implementations
//!
//! Each command loads the configuration, opens the catalog, performs one
//! operation and returns its result. `run_command` writes the JSON envelope.

use std::fs::{self, File};
use std::path::Path;

use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::AccessPolicy;
use crate::catalog::{CatalogConfig, CatalogError, CatalogService};
use crate::file_storage::{
    FileMetadata, FileState, FileStorageGroupResponse, FileStorageQuery, FileStorageResponse,
    LocalBackend,
};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// Run a parsed command, writing its outcome to stdout
pub fn run_command(command: Command) -> CliResult<()> {
    let outcome = dispatch(command);
    match outcome {
        Ok(data) => write_response(&data),
        Err(e) => {
            write_error(&e)?;
            Err(e)
        }
    }
}

fn dispatch(command: Command) -> CliResult<Value> {
    match command {
        Command::Init { config } => init(&config),
        Command::Import {
            config,
            metadata,
            content,
            overwrite,
            caller,
        } => {
            let state = import(&config, &metadata, &content, overwrite, &caller.policy())?;
            Ok(serde_json::to_value(state)?)
        }
        Command::Get { config, id, caller } => Ok(serde_json::to_value(get(&config, id, &caller.policy())?)?),
        Command::Query { config, caller } => {
            let request: FileStorageQuery = read_request()?;
            Ok(serde_json::to_value(query(&config, &request, &caller.policy())?)?)
        }
        Command::ByPublisher { config, caller } => {
            let request: FileStorageQuery = read_request()?;
            Ok(serde_json::to_value(by_publisher(&config, &request, &caller.policy())?)?)
        }
        Command::Delete { config, id, caller } => {
            delete(&config, id, &caller.policy())?;
            Ok(json!({ "deleted": id }))
        }
        Command::Reindex { config } => {
            let documents = reindex(&config)?;
            Ok(json!({ "documents": documents }))
        }
    }
}

fn load_config(config_path: &Path) -> CliResult<CatalogConfig> {
    Ok(CatalogConfig::load(config_path)?)
}

fn open_catalog(config: &CatalogConfig) -> CliResult<CatalogService<LocalBackend>> {
    if !config.storage_path.is_dir() {
        return Err(CliError::not_initialized());
    }
    Ok(CatalogService::open(config)?)
}

/// Create the storage directory; refuses a directory that already holds data
pub fn init(config_path: &Path) -> CliResult<Value> {
    let config = load_config(config_path)?;
    let root = &config.storage_path;

    if root.is_dir() && fs::read_dir(root)?.next().is_some() {
        return Err(CliError::already_initialized());
    }

    let service = CatalogService::open(&config)?;
    let files = service.storage().len().map_err(CatalogError::from)?;
    info!(path = %root.display(), "storage initialized");

    Ok(json!({
        "storagePath": root.display().to_string(),
        "files": files
    }))
}

pub fn import(
    config_path: &Path,
    metadata_path: &Path,
    content_path: &Path,
    overwrite: bool,
    policy: &dyn AccessPolicy,
) -> CliResult<FileState> {
    let config = load_config(config_path)?;

    let metadata: FileMetadata = serde_json::from_str(&fs::read_to_string(metadata_path)?)?;
    let content = File::open(content_path)?;

    let service = open_catalog(&config)?;
    Ok(service.insert(content, metadata, overwrite, policy)?)
}

pub fn get(config_path: &Path, id: Uuid, policy: &dyn AccessPolicy) -> CliResult<FileState> {
    let service = open_catalog(&load_config(config_path)?)?;
    Ok(service.get_file_state(id, policy)?)
}

pub fn query(config_path: &Path, request: &FileStorageQuery, policy: &dyn AccessPolicy) -> CliResult<FileStorageResponse> {
    let service = open_catalog(&load_config(config_path)?)?;
    Ok(service.query(request, policy)?)
}

pub fn by_publisher(
    config_path: &Path,
    request: &FileStorageQuery,
    policy: &dyn AccessPolicy,
) -> CliResult<FileStorageGroupResponse> {
    let service = open_catalog(&load_config(config_path)?)?;
    Ok(service.query_grouped_by_publisher(request, policy)?)
}

pub fn delete(config_path: &Path, id: Uuid, policy: &dyn AccessPolicy) -> CliResult<()> {
    let service = open_catalog(&load_config(config_path)?)?;
    Ok(service.delete(id, policy)?)
}

/// Rebuild the index and report how many documents it holds
pub fn reindex(config_path: &Path) -> CliResult<usize> {
    let mut config = load_config(config_path)?;
    config.rebuild_index_on_open = false;
    let service = open_catalog(&config)?;
    Ok(service.rebuild_index()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CallerContext, DefaultAccessPolicy};
    use crate::cli::errors::CliErrorCode;
    use crate::file_storage::FileType;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("catalog-store.json");
        let storage = dir.path().join("store");
        fs::write(
            &config_path,
            json!({ "storagePath": storage.display().to_string() }).to_string(),
        )
        .unwrap();
        (dir, config_path)
    }

    fn write_metadata(dir: &TempDir, metadata: &FileMetadata) -> PathBuf {
        let path = dir.path().join(format!("{}.json", metadata.id));
        fs::write(&path, serde_json::to_string(metadata).unwrap()).unwrap();
        path
    }

    fn admin() -> DefaultAccessPolicy {
        DefaultAccessPolicy::new(CallerContext::superadmin("test"))
    }

    #[test]
    fn test_init_twice_fails() {
        let (dir, config) = setup();
        init(&config).unwrap();

        let content = dir.path().join("content.ttl");
        fs::write(&content, "<> a <Dataset> .").unwrap();
        let metadata = FileMetadata::new(Uuid::new_v4(), "Roads", FileType::DatasetRegistration)
            .with_publisher("P1")
            .public(true);
        import(&config, &write_metadata(&dir, &metadata), &content, false, &admin()).unwrap();

        let err = init(&config).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::AlreadyInitialized);
    }

    #[test]
    fn test_commands_require_init() {
        let (_dir, config) = setup();
        let err = get(&config, Uuid::new_v4(), &admin()).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::NotInitialized);
    }

    #[test]
    fn test_import_query_delete() {
        let (dir, config) = setup();
        init(&config).unwrap();

        let content = dir.path().join("content.ttl");
        fs::write(&content, "<> a <Dataset> .").unwrap();
        let metadata = FileMetadata::new(Uuid::new_v4(), "Cycling routes", FileType::DatasetRegistration)
            .with_publisher("P1")
            .public(true);
        let metadata_path = write_metadata(&dir, &metadata);

        let state = import(&config, &metadata_path, &content, false, &admin()).unwrap();
        assert_eq!(state.content.size, 16);

        let err = import(&config, &metadata_path, &content, false, &admin()).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::Conflict);

        // Index is rebuilt on open, so text search sees the imported record
        let response = query(&config, &FileStorageQuery::new().with_text("cycling"), &admin()).unwrap();
        assert_eq!(response.total_count, 1);
        assert_eq!(reindex(&config).unwrap(), 1);

        let anonymous = DefaultAccessPolicy::anonymous();
        let err = delete(&config, metadata.id, &anonymous).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::Unauthorized);

        delete(&config, metadata.id, &admin()).unwrap();
        let err = get(&config, metadata.id, &admin()).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::NotFound);
    }
}
