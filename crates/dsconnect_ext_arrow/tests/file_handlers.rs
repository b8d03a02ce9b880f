//! File handlers resolved through a factory, reading and writing under a
//! temporary directory.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use dsconnect_core::arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use dsconnect_core::dataset::try_new_dataset;
use dsconnect_core::event::{EventCatalog, EventExtension};
use dsconnect_core::{
    Capability, ConnectorAddress, ConnectorError, Dataset, Handler, HandlerExtension,
    OptionMap, SourceHandler,
};
use dsconnect_ext_arrow::{
    ArrowFileExtension, ArrowPersistHandler, ArrowSourceHandler, default_factory,
};
use flate2::Compression;
use flate2::write::GzEncoder;

fn orders() -> Dataset {
    try_new_dataset([
        ("id", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
        (
            "amount",
            Arc::new(Float64Array::from(vec![9.5, 12.25, 3.75])) as ArrayRef,
        ),
        (
            "region",
            Arc::new(StringArray::from(vec!["north", "south", "east"])) as ArrayRef,
        ),
    ])
    .unwrap()
}

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn instantiate(uri: &str, handler: &str) -> Handler {
    let address = ConnectorAddress::parse(uri)
        .unwrap()
        .with_handler(ArrowFileExtension::MODULE, handler);
    default_factory().unwrap().instantiate(&address).unwrap()
}

fn column<'a, T: 'static>(dataset: &'a Dataset, name: &str) -> &'a T {
    dataset
        .column_by_name(name)
        .unwrap()
        .as_any()
        .downcast_ref::<T>()
        .unwrap()
}

/// Text formats re-infer types, compare by column name and value.
fn assert_same_values(expected: &Dataset, got: &Dataset) {
    assert_eq!(expected.num_rows(), got.num_rows());
    assert_eq!(expected.num_columns(), got.num_columns());
    assert_eq!(
        column::<Int64Array>(expected, "id"),
        column::<Int64Array>(got, "id")
    );
    assert_eq!(
        column::<Float64Array>(expected, "amount"),
        column::<Float64Array>(got, "amount")
    );
    assert_eq!(
        column::<StringArray>(expected, "region"),
        column::<StringArray>(got, "region")
    );
}

#[test]
fn binary_formats_round_trip_exactly() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();

    for name in ["orders.parquet", "orders.feather"] {
        let uri = file_uri(&dir.path().join(name));
        let mut handler = instantiate(&uri, ArrowPersistHandler::NAME);
        assert_eq!(Capability::Persist, handler.capability());
        assert!(!handler.exists());

        assert!(handler.persist(&orders(), &OptionMap::new()).unwrap());
        assert!(handler.exists());
        assert_eq!(orders(), handler.load(&OptionMap::new()).unwrap());
    }
}

#[test]
fn text_formats_round_trip() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();

    for name in ["orders.csv", "orders.tsv", "orders.json"] {
        let uri = file_uri(&dir.path().join(name));
        let mut handler = instantiate(&uri, ArrowPersistHandler::NAME);
        handler.persist(&orders(), &OptionMap::new()).unwrap();
        assert_same_values(&orders(), &handler.load(&OptionMap::new()).unwrap());
    }
}

#[test]
fn csv_options_from_address() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.txt");

    let uri = format!("{};delimiter=|", file_uri(&path));
    let mut handler = instantiate(&uri, ArrowPersistHandler::NAME);
    handler.persist(&orders(), &OptionMap::new()).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("id|amount|region"));
    assert_same_values(&orders(), &handler.load(&OptionMap::new()).unwrap());

    // Query params win over the inline delimiter.
    let mut reader = instantiate(
        &format!("{uri}?delimiter=,"),
        ArrowSourceHandler::NAME,
    );
    let loaded = reader.load(&OptionMap::new()).unwrap();
    assert_eq!(1, loaded.num_columns());
}

#[test]
fn file_type_option_overrides_extension() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let uri = file_uri(&dir.path().join("orders.data"));

    let mut handler = instantiate(&uri, ArrowPersistHandler::NAME);
    let opts = OptionMap::new().with("file_type", "parquet");
    handler.persist(&orders(), &opts).unwrap();
    assert_eq!(orders(), handler.load(&opts).unwrap());

    let err = handler.load(&OptionMap::new()).unwrap_err();
    assert_eq!(
        "The source format data is not currently supported",
        err.to_string()
    );
    let err = handler.persist(&orders(), &OptionMap::new()).unwrap_err();
    assert!(matches!(err, ConnectorError::UnsupportedWriteFormat(_)));
}

#[test]
fn schemeless_paths_are_files() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.parquet");

    let mut handler = instantiate(&path.display().to_string(), ArrowPersistHandler::NAME);
    handler.persist(&orders(), &OptionMap::new()).unwrap();
    assert!(path.is_file());
}

#[test]
fn backup_to_other_files_creates_directories() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("orders.parquet");
    let target = dir.path().join("nested/deeper/orders.csv");

    let mut handler = instantiate(&file_uri(&source), ArrowPersistHandler::NAME);
    let target_addr = ConnectorAddress::parse(file_uri(&target)).unwrap();
    assert!(handler
        .backup(&orders(), &target_addr, &OptionMap::new())
        .unwrap());

    assert!(target.is_file());
    assert!(!handler.exists());

    let mut reader = instantiate(&file_uri(&target), ArrowSourceHandler::NAME);
    assert_same_values(&orders(), &reader.load(&OptionMap::new()).unwrap());
}

#[test]
fn backup_rejects_other_schemes() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let mut handler = instantiate(
        &file_uri(&dir.path().join("orders.parquet")),
        ArrowPersistHandler::NAME,
    );

    let target = ConnectorAddress::parse("event://orders").unwrap();
    let err = handler
        .backup(&orders(), &target, &OptionMap::new())
        .unwrap_err();
    assert_eq!("The schema must be file, event given", err.to_string());
}

#[test]
fn missing_files() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.csv");

    let mut handler = instantiate(&file_uri(&path), ArrowPersistHandler::NAME);
    assert!(!handler.exists());

    let err = handler.load(&OptionMap::new()).unwrap_err();
    assert!(matches!(err, ConnectorError::NotFound { kind: "file", .. }));
    assert_eq!(
        format!("The file '{}' does not exist", path.display()),
        err.to_string()
    );
    assert!(handler.has_changed());

    let err = handler.remove().unwrap_err();
    assert!(matches!(err, ConnectorError::NotFound { .. }));
}

#[test]
fn changed_flag_follows_loads_and_writes() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let uri = file_uri(&dir.path().join("orders.parquet"));

    let mut handler = instantiate(&uri, ArrowPersistHandler::NAME);
    assert!(handler.has_changed());

    handler.persist(&orders(), &OptionMap::new()).unwrap();
    assert!(handler.has_changed());

    handler.load(&OptionMap::new()).unwrap();
    assert!(!handler.has_changed());

    handler.reset_changed(true);
    assert!(handler.has_changed());
    handler.reset_changed(false);
    assert!(!handler.has_changed());
}

#[test]
fn remove_deletes_the_file() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.feather");

    let mut handler = instantiate(&file_uri(&path), ArrowPersistHandler::NAME);
    handler.persist(&orders(), &OptionMap::new()).unwrap();
    assert!(path.is_file());

    assert!(handler.remove().unwrap());
    assert!(!path.exists());
    assert!(!handler.exists());
}

#[test]
fn source_handler_is_read_only() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let mut handler = instantiate(
        &file_uri(&dir.path().join("orders.parquet")),
        ArrowSourceHandler::NAME,
    );
    assert_eq!(Capability::Source, handler.capability());
    assert_eq!(
        vec!["parquet", "feather", "csv", "json"],
        handler.supported_types()
    );

    let err = handler.persist(&orders(), &OptionMap::new()).unwrap_err();
    assert_eq!(
        "The handler 'ArrowSourceHandler' in the module 'dsconnect_ext_arrow::file' does not provide the persist capability",
        err.to_string()
    );
}

#[test]
fn factory_resolution() {
    let factory = default_factory().unwrap();
    assert_eq!(
        vec![EventExtension::MODULE, ArrowFileExtension::MODULE],
        factory.modules().collect::<Vec<_>>()
    );

    let address = ConnectorAddress::parse("file:///tmp/orders.csv").unwrap();

    let err = factory
        .instantiate(&address.clone().with_handler("dsconnect_ext_arrow::none", "ArrowSourceHandler"))
        .unwrap_err();
    assert_eq!(
        "The module 'dsconnect_ext_arrow::none' could not be found",
        err.to_string()
    );

    let err = factory
        .instantiate(&address.clone().with_handler(ArrowFileExtension::MODULE, "NoneHandler"))
        .unwrap_err();
    assert_eq!(
        "The handler 'NoneHandler' could not be found in the module 'dsconnect_ext_arrow::file'",
        err.to_string()
    );

    let handler = factory
        .instantiate(&address.with_handler(ArrowFileExtension::MODULE, ArrowSourceHandler::NAME))
        .unwrap();
    assert_eq!("ArrowSourceHandler", handler.handler_ref());
    assert_eq!(ArrowFileExtension::MODULE, handler.module_ref());
    assert_eq!("file:///tmp/orders.csv", handler.address().path());

    assert!(factory.check_module(ArrowFileExtension::MODULE));
    assert!(!factory.check_module("dsconnect_ext_arrow::none"));
    assert!(factory.check_handler(ArrowFileExtension::MODULE, ArrowPersistHandler::NAME));
    assert!(!factory.check_handler(ArrowFileExtension::MODULE, "EventSourceHandler"));
}

#[test]
fn file_handler_rejects_event_addresses() {
    let factory = default_factory().unwrap();
    let address = ConnectorAddress::parse("event://orders")
        .unwrap()
        .with_handler(ArrowFileExtension::MODULE, ArrowSourceHandler::NAME);
    let err = factory.instantiate(&address).unwrap_err();
    assert_eq!("The schema must be file, event given", err.to_string());
}

#[test]
fn event_to_file_and_back() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let catalog: &'static EventCatalog = Box::leak(Box::new(EventCatalog::new()));
    catalog.set("orders", orders()).unwrap();

    let mut file = instantiate(
        &file_uri(&dir.path().join("orders.parquet")),
        ArrowPersistHandler::NAME,
    );
    let dataset = catalog.get("orders").unwrap();
    file.persist(&dataset, &OptionMap::new()).unwrap();

    let loaded = file.load(&OptionMap::new()).unwrap();
    catalog.update("orders_copy", loaded);
    assert_eq!(catalog.get("orders"), catalog.get("orders_copy"));
}

fn write_gzip(path: &Path, text: &str) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

const ORDERS_CSV: &str = "id,amount,region\n1,9.5,north\n2,12.25,south\n3,3.75,east\n";

#[test]
fn gzip_compressed_text() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();

    let csv = dir.path().join("orders.csv.gz");
    write_gzip(&csv, ORDERS_CSV);
    let mut reader = instantiate(&file_uri(&csv), ArrowSourceHandler::NAME);
    assert_same_values(&orders(), &reader.load(&OptionMap::new()).unwrap());

    let tsv = dir.path().join("orders.tsv.gz");
    write_gzip(&tsv, &ORDERS_CSV.replace(',', "\t"));
    let mut reader = instantiate(&file_uri(&tsv), ArrowSourceHandler::NAME);
    assert_same_values(&orders(), &reader.load(&OptionMap::new()).unwrap());

    let json = dir.path().join("orders.json.gz");
    write_gzip(
        &json,
        concat!(
            "{\"id\":1,\"amount\":9.5,\"region\":\"north\"}\n",
            "{\"id\":2,\"amount\":12.25,\"region\":\"south\"}\n",
            "{\"id\":3,\"amount\":3.75,\"region\":\"east\"}\n",
        ),
    );
    let mut reader = instantiate(&file_uri(&json), ArrowSourceHandler::NAME);
    assert_same_values(&orders(), &reader.load(&OptionMap::new()).unwrap());
}

#[test]
fn gzip_from_file_type_option() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.dump");
    write_gzip(&path, ORDERS_CSV);

    let mut reader = instantiate(
        &format!("{}?file_type=gzip", file_uri(&path)),
        ArrowSourceHandler::NAME,
    );
    assert_same_values(&orders(), &reader.load(&OptionMap::new()).unwrap());

    let mut reader = instantiate(&file_uri(&path), ArrowSourceHandler::NAME);
    let err = reader.load(&OptionMap::new()).unwrap_err();
    assert_eq!(
        "The source format dump is not currently supported",
        err.to_string()
    );
}

#[test]
fn compressed_binary_formats_rejected() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.parquet.gz");
    write_gzip(&path, "not parquet");

    let mut reader = instantiate(&file_uri(&path), ArrowSourceHandler::NAME);
    let err = reader.load(&OptionMap::new()).unwrap_err();
    assert_eq!(
        "The source format parquet.gz is not currently supported",
        err.to_string()
    );
}

#[test]
fn use_full_uri_reads_query_as_file_name() {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.parquet?version=2");
    std::fs::write(&path, ORDERS_CSV).unwrap();

    let uri = format!("{}?version=2", file_uri(&dir.path().join("orders.parquet")));
    let mut reader = instantiate(&uri, ArrowSourceHandler::NAME);

    // Without the option the query is stripped and the file doesn't exist.
    let err = reader.load(&OptionMap::new()).unwrap_err();
    assert!(matches!(err, ConnectorError::NotFound { .. }));

    // Full uri ignores the parquet extension and reads csv.
    let opts = OptionMap::new().with("use_full_uri", true);
    assert_same_values(&orders(), &reader.load(&opts).unwrap());
    assert!(!reader.has_changed());

    // Only inline params and call options can turn it on.
    let mut reader = instantiate(
        &format!("{uri}&use_full_uri=true"),
        ArrowSourceHandler::NAME,
    );
    let err = reader.load(&OptionMap::new()).unwrap_err();
    assert!(matches!(err, ConnectorError::NotFound { .. }));
}
