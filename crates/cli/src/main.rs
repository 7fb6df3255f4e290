use anyhow::{bail, Context};
use catalog_core::constants::DEFAULT_DATABASE_PATH;
use catalog_core::{
    Attributes, CoreConfig, EntityId, EntityRecord, FileChange, FileChanges, MediaCatalog,
    ObjectPath, RecordStore, SqliteRecordStore, StorageEnv,
};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Catalog media records and their stored files")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an entity, uploading its media files
    Create {
        /// Entity kind
        #[arg(long, default_value = "video")]
        kind: String,
        /// Attribute as key=value (value parsed as JSON, else taken as text)
        #[arg(long = "attr", value_parser = parse_key_value)]
        attrs: Vec<(String, String)>,
        /// File field as field=path
        #[arg(long = "file", value_parser = parse_key_value)]
        files: Vec<(String, String)>,
    },
    /// Update attributes and media files of an entity
    Update {
        /// Entity id
        #[arg(value_parser = parse_entity_id)]
        id: EntityId,
        /// Attribute as key=value
        #[arg(long = "attr", value_parser = parse_key_value)]
        attrs: Vec<(String, String)>,
        /// File field as field=path
        #[arg(long = "file", value_parser = parse_key_value)]
        files: Vec<(String, String)>,
        /// File field to unset
        #[arg(long = "clear")]
        clear: Vec<String>,
    },
    /// Print an entity with its file URLs as JSON
    Show {
        #[arg(value_parser = parse_entity_id)]
        id: EntityId,
    },
    /// Soft delete an entity (stored files are kept)
    Delete {
        #[arg(value_parser = parse_entity_id)]
        id: EntityId,
    },
    /// List stored objects of an entity and whether the record references them
    Ls {
        #[arg(value_parser = parse_entity_id)]
        id: EntityId,
    },
}

/// Command line client for the media catalog.
///
/// # Environment Variables
/// - `CATALOG_DATABASE_PATH`: SQLite database file (default: "catalog.db")
/// - `CATALOG_STORAGE_BACKEND`: `local` (default) or `cloud`
/// - `CATALOG_LOCAL_STORAGE_DIR`, `CATALOG_LOCAL_STORAGE_URL`: local backend settings
/// - `CATALOG_CLOUD_BUCKET`, `CATALOG_CLOUD_API_ENDPOINT`, `CATALOG_CLOUD_ACCESS_TOKEN`:
///   cloud backend settings
fn main() -> anyhow::Result<()> {
    let env_file = dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("catalog=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(path) = env_file {
        tracing::info!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'catalog --help' for commands");
        return Ok(());
    };

    let config = load_config()?;
    let mut catalog = MediaCatalog::open(&config)?;

    match command {
        Commands::Create { kind, attrs, files } => {
            let files = file_changes(files, Vec::new())?;
            let record = catalog.create_with_files(&kind, attributes(attrs), files)?;
            print_record(&catalog, &record)?;
        }
        Commands::Update {
            id,
            attrs,
            files,
            clear,
        } => {
            let files = file_changes(files, clear)?;
            let record = catalog.update_with_files(id, attributes(attrs), files)?;
            print_record(&catalog, &record)?;
        }
        Commands::Show { id } => match catalog.find(id)? {
            Some(record) => print_record(&catalog, &record)?,
            None => bail!("entity {} not found", id),
        },
        Commands::Delete { id } => {
            catalog.soft_delete(id)?;
            println!("Deleted entity {}", id);
        }
        Commands::Ls { id } => {
            let referenced = catalog
                .records()
                .load(id)?
                .map(|record| record.referenced_files())
                .unwrap_or_default();
            let store = catalog.store();
            let names = store.list(id)?;
            let orphans = names.iter().filter(|n| !referenced.contains(*n)).count();

            for name in names {
                let state = if referenced.contains(&name) {
                    "referenced"
                } else {
                    "orphan"
                };
                let url = store.public_url(&ObjectPath::new(id, name.clone()));
                println!("{}\t{}\t{}", name, state, url);
            }
            if orphans > 0 {
                tracing::warn!(entity_id = %id, orphans, "namespace holds unreferenced objects");
            }
        }
    }

    Ok(())
}

fn load_config() -> anyhow::Result<CoreConfig> {
    let storage = StorageEnv {
        backend: env_value("CATALOG_STORAGE_BACKEND"),
        local_dir: env_value("CATALOG_LOCAL_STORAGE_DIR"),
        local_url: env_value("CATALOG_LOCAL_STORAGE_URL"),
        cloud_bucket: env_value("CATALOG_CLOUD_BUCKET"),
        cloud_api_endpoint: env_value("CATALOG_CLOUD_API_ENDPOINT"),
        cloud_access_token: env_value("CATALOG_CLOUD_ACCESS_TOKEN"),
    }
    .resolve()?;

    let database_path = env_value("CATALOG_DATABASE_PATH")
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_PATH.into());

    Ok(CoreConfig::new(PathBuf::from(database_path), storage)?)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_entity_id(raw: &str) -> Result<EntityId, String> {
    EntityId::parse(raw.trim()).map_err(|e| e.to_string())
}

fn attributes(pairs: Vec<(String, String)>) -> Attributes {
    pairs
        .into_iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));
            (key, value)
        })
        .collect()
}

fn file_changes(uploads: Vec<(String, String)>, clear: Vec<String>) -> anyhow::Result<FileChanges> {
    let mut changes = FileChanges::new();

    for (field, path) in uploads {
        let file = File::open(&path).with_context(|| format!("cannot open {}", path))?;
        let change =
            FileChange::from_reader(file).with_context(|| format!("cannot read {}", path))?;
        if changes.insert(field.clone(), change).is_some() {
            bail!("file field '{}' given more than once", field);
        }
    }

    for field in clear {
        if changes.insert(field.clone(), FileChange::Clear).is_some() {
            bail!("file field '{}' is both uploaded and cleared", field);
        }
    }

    Ok(changes)
}

fn print_record(
    catalog: &MediaCatalog<SqliteRecordStore>,
    record: &EntityRecord,
) -> anyhow::Result<()> {
    let mut value = serde_json::to_value(record)?;
    if let Some(object) = value.as_object_mut() {
        for (key, url) in catalog.file_urls(record) {
            object.insert(key, url.into());
        }
    }
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn key_value_splits_on_first_equals() {
        assert_eq!(
            parse_key_value("description=a=b").unwrap(),
            ("description".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn attribute_values_prefer_json() {
        let attrs = attributes(vec![
            ("year_launched".into(), "1927".into()),
            ("opened".into(), "true".into()),
            ("title".into(), "Metropolis".into()),
        ]);

        assert_eq!(attrs["year_launched"], 1927);
        assert_eq!(attrs["opened"], true);
        assert_eq!(attrs["title"], "Metropolis");
    }

    #[test]
    fn clearing_an_uploaded_field_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("thumb.bin");
        std::fs::write(&path, b"bytes").unwrap();

        let result = file_changes(
            vec![("thumb_file".into(), path.display().to_string())],
            vec!["thumb_file".into()],
        );

        assert!(result.is_err());
    }

    #[test]
    fn entity_ids_must_be_canonical() {
        let id = EntityId::new();
        assert_eq!(parse_entity_id(&id.to_string()).unwrap(), id);
        assert!(parse_entity_id("not-an-id").is_err());
    }

    #[test]
    fn cli_parses_repeated_flags() {
        let cli = Cli::try_parse_from([
            "catalog",
            "create",
            "--attr",
            "title=Metropolis",
            "--attr",
            "rating=L",
            "--file",
            "video_file=movie.mp4",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Create { kind, attrs, files }) => {
                assert_eq!(kind, "video");
                assert_eq!(attrs.len(), 2);
                assert_eq!(files, vec![("video_file".to_string(), "movie.mp4".to_string())]);
            }
            _ => panic!("expected create"),
        }
    }
}
