use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dsconnect_core::{
    ConnectorAddress, ConnectorError, Dataset, HandlerCapabilities, HandlerRole, OptionMap,
    OptionValue, PersistHandler, Result, SourceHandler,
};
use tracing::debug;

use crate::FILE_SCHEME;
use crate::format::{self, CsvOptions, FileFormat};

/// Format used on load when neither the options nor the extension say.
const DEFAULT_READ_FORMAT: &str = "csv";
/// Format used on write when neither the options nor the extension say.
const DEFAULT_WRITE_FORMAT: &str = "parquet";
/// Load option reading from the address text including its query.
const USE_FULL_URI: &str = "use_full_uri";

/// Resolve the local path an address points to.
///
/// `file:///tmp/a.csv` is `/tmp/a.csv`, `file://data/a.csv` and `data/a.csv`
/// are both the relative path `data/a.csv`.
fn local_path(address: &ConnectorAddress) -> Result<PathBuf> {
    if address.scheme() != FILE_SCHEME {
        return Err(ConnectorError::SchemeMismatch {
            expected: FILE_SCHEME,
            given: address.scheme().to_string(),
        });
    }
    if address.has_explicit_scheme() {
        Ok(PathBuf::from(format!(
            "{}{}",
            address.location(),
            address.resource()
        )))
    } else {
        Ok(PathBuf::from(address.resource()))
    }
}

/// The path the address names including its raw `?...` query, for files
/// whose names contain the query text.
fn full_uri_path(address: &ConnectorAddress) -> Result<PathBuf> {
    let mut path = local_path(address)?.into_os_string();
    if let Some((_, query)) = address.raw().split_once('?') {
        path.push("?");
        path.push(query);
    }
    Ok(PathBuf::from(path))
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Extension in front of the last one, `csv` for `orders.csv.gz`.
fn inner_extension(path: &Path) -> Option<&str> {
    path.file_stem().map(Path::new).and_then(extension)
}

/// Pick the format tag: explicit `file_type` option first, then the file
/// extension, then the default.
fn format_tag(path: &Path, options: &OptionMap, default: &str) -> Result<String> {
    let tag = match options.get_str("file_type")? {
        Some(tag) => tag,
        None => extension(path).unwrap_or(default),
    };
    Ok(tag.to_string())
}

fn not_found(path: &Path) -> ConnectorError {
    ConnectorError::NotFound {
        kind: "file",
        name: path.to_string_lossy().into_owned(),
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Read only handler for local files.
///
/// Load options:
/// - `file_type`: format tag overriding the file extension.
/// - `delimiter`, `has_header`: see [`CsvOptions`].
/// - `use_full_uri` (bool): read the file named by the whole address,
///   query included. Query params then aren't applied and the format
///   defaults to csv regardless of the extension.
///
/// Files ending in `.gz` are read as gzip compressed text, the extension
/// before it picks the format.
#[derive(Debug)]
pub struct ArrowSourceHandler {
    address: ConnectorAddress,
    path: PathBuf,
    changed: bool,
    /// Modification time of the file when it was last loaded or marked seen.
    seen_modified: Option<SystemTime>,
}

impl ArrowSourceHandler {
    pub const NAME: &'static str = "ArrowSourceHandler";

    pub fn try_new(address: ConnectorAddress) -> Result<Self> {
        let path = local_path(&address)?;
        Ok(ArrowSourceHandler {
            address,
            path,
            changed: true,
            seen_modified: None,
        })
    }

    pub(crate) fn construct(address: ConnectorAddress) -> Result<Box<dyn HandlerCapabilities>> {
        Ok(Box::new(Self::try_new(address)?))
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }
}

impl SourceHandler for ArrowSourceHandler {
    fn address(&self) -> &ConnectorAddress {
        &self.address
    }

    fn supported_types(&self) -> Vec<&'static str> {
        FileFormat::SUPPORTED.to_vec()
    }

    fn load(&mut self, options: &OptionMap) -> Result<Dataset> {
        let mut base = self.address.inline_params().clone();
        base.merge(options);
        let full_uri = matches!(base.remove(USE_FULL_URI), Some(OptionValue::Bool(true)));

        let (path, options, tag) = if full_uri {
            let tag = base.get_str("file_type")?.unwrap_or(DEFAULT_READ_FORMAT).to_string();
            (full_uri_path(&self.address)?, base, tag)
        } else {
            let mut options = self.address.effective_options(options);
            options.remove(USE_FULL_URI);
            let tag = format_tag(&self.path, &options, DEFAULT_READ_FORMAT)?;
            (self.path.clone(), options, tag)
        };

        let (format, compression) = format::resolve_read(&tag, inner_extension(&path))?;
        let csv = CsvOptions::try_from_options(format, &options)?;

        if !path.is_file() {
            return Err(not_found(&path));
        }

        let dataset = format::read_dataset(&path, format, compression, &csv)?;
        self.reset_changed(false);
        debug!(?path, ?format, ?compression, rows = dataset.num_rows(), "loaded file");

        Ok(dataset)
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn has_changed(&self) -> bool {
        self.changed || modified(&self.path) != self.seen_modified
    }

    fn reset_changed(&mut self, changed: bool) {
        self.changed = changed;
        self.seen_modified = modified(&self.path);
    }
}

impl HandlerCapabilities for ArrowSourceHandler {
    fn into_role(self: Box<Self>) -> Option<HandlerRole> {
        Some(HandlerRole::Source(self))
    }
}

/// Read/write handler for local files.
///
/// Write options, on top of the load options:
/// - `file_type`: format tag overriding the target's extension. Defaults to
///   parquet when the target has no extension.
///
/// Missing parent directories of the target are created.
#[derive(Debug)]
pub struct ArrowPersistHandler {
    source: ArrowSourceHandler,
}

impl ArrowPersistHandler {
    pub const NAME: &'static str = "ArrowPersistHandler";

    pub fn try_new(address: ConnectorAddress) -> Result<Self> {
        Ok(ArrowPersistHandler {
            source: ArrowSourceHandler::try_new(address)?,
        })
    }

    pub(crate) fn construct(address: ConnectorAddress) -> Result<Box<dyn HandlerCapabilities>> {
        Ok(Box::new(Self::try_new(address)?))
    }

    pub fn file_path(&self) -> &Path {
        self.source.file_path()
    }
}

impl SourceHandler for ArrowPersistHandler {
    fn address(&self) -> &ConnectorAddress {
        self.source.address()
    }

    fn supported_types(&self) -> Vec<&'static str> {
        self.source.supported_types()
    }

    fn load(&mut self, options: &OptionMap) -> Result<Dataset> {
        self.source.load(options)
    }

    fn exists(&self) -> bool {
        self.source.exists()
    }

    fn has_changed(&self) -> bool {
        self.source.has_changed()
    }

    fn reset_changed(&mut self, changed: bool) {
        self.source.reset_changed(changed)
    }
}

impl PersistHandler for ArrowPersistHandler {
    fn backup(
        &mut self,
        dataset: &Dataset,
        address: &ConnectorAddress,
        options: &OptionMap,
    ) -> Result<bool> {
        let target = local_path(address)?;
        let options = address.effective_options(options);
        let format = FileFormat::for_write(&format_tag(&target, &options, DEFAULT_WRITE_FORMAT)?)?;
        let csv = CsvOptions::try_from_options(format, &options)?;

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        format::write_dataset(dataset, &target, format, &csv)?;
        self.source.changed = true;
        debug!(path = ?target, ?format, rows = dataset.num_rows(), "wrote file");

        Ok(true)
    }

    fn remove(&mut self) -> Result<bool> {
        if !self.source.exists() {
            return Err(not_found(&self.source.path));
        }
        fs::remove_file(&self.source.path)?;
        debug!(path = ?self.source.path, "removed file");
        Ok(true)
    }
}

impl HandlerCapabilities for ArrowPersistHandler {
    fn into_role(self: Box<Self>) -> Option<HandlerRole> {
        Some(HandlerRole::Persist(self))
    }
}
