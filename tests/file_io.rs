use std::io::Write;

use tasc::data::value::{cells, optional_cells};
use tasc::domains::{LoadDisplacement, LOAD_DISPLACEMENT};
use tasc::{
    load_file, Column, ColumnCollection, ColumnKind, FileFormat, FormatRegistry, Metadata, OpArgs,
    OperationRegistry, ReadOptions, Scalar, TascError,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn specimen() -> ColumnCollection {
    let mut meta = Metadata::new();
    meta.insert("title".to_string(), "specimen A".into());
    ColumnCollection::new(
        vec![1.0, 2.0, 3.0, 4.0],
        vec![
            Column::detect("load", optional_cells([Some(0.0), Some(4.5), None, Some(-2.25)]))
                .with_channel("CH1")
                .with_unit("kN"),
            Column::detect("disp", cells([0.0, 0.5, 1.0, 0.25]))
                .with_channel("CH2")
                .with_unit("mm"),
            Column::detect("count", cells([1i64, 2, 3, 4])).with_channel("CH3"),
            Column::detect("valid", cells([true, true, false, true])).with_channel("CH4"),
        ],
        meta,
    )
    .unwrap()
}

#[test]
fn test_standard_text_round_trip() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("specimen.txt");
    let original = specimen();
    original.to_file(&path, "standard").unwrap();

    let back = ColumnCollection::from_file(&path, &ReadOptions::default()).unwrap();
    assert_eq!(back.step(), original.step());
    assert_eq!(back.column_names(), original.column_names());
    for column in original.columns() {
        let read = back.column(column.name()).unwrap();
        assert_eq!(read.values(), column.values(), "values of '{}'", column.name());
        assert_eq!(read.unit(), column.unit());
        assert_eq!(read.channel(), column.channel());
    }
    assert_eq!(back.column("valid").unwrap().kind(), ColumnKind::Boolean);
    assert_eq!(back.metadata()["title"].as_str(), Some("specimen A"));
    assert_eq!(back.metadata()["format"].as_str(), Some("standard"));
}

#[test]
fn test_channel_name_format_reads_back_channels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("specimen.csv");
    specimen().to_file(&path, "tasc_csv").unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.lines().nth(2).unwrap().starts_with("NAME,DATE,TIME,CH1,CH2"));

    let back = ColumnCollection::from_file(&path, &ReadOptions::format("tasc_csv").select(["CH2"]))
        .unwrap();
    assert_eq!(back.column_names(), vec!["CH2"]);
    assert_eq!(back.column("CH2").unwrap().unit(), Some("mm"));
}

#[test]
fn test_delimiter_override_and_unknown_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("semicolon.dat");
    let mut formats = FormatRegistry::with_builtin();
    formats.register(
        "semicolon",
        FileFormat {
            delimiter: ';',
            ..FileFormat::default()
        },
    );
    specimen().to_file_with(&path, "semicolon", &formats).unwrap();

    let back = ColumnCollection::from_file(&path, &ReadOptions::default().delimiter(';')).unwrap();
    assert_eq!(back.columns().len(), 4);

    let err = ColumnCollection::from_file(&path, &ReadOptions::format("nope")).unwrap_err();
    assert!(matches!(err, TascError::UnknownFormat(_)));
}

#[test]
fn test_json_round_trip_keeps_domain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("specimen.json");
    let ld = LoadDisplacement::new("load", "disp").attach(specimen()).unwrap();
    ld.write_json(&path).unwrap();

    let back = load_file(&path).unwrap();
    assert_eq!(back.domain_name(), LOAD_DISPLACEMENT);
    assert_eq!(back, ld);

    let registry = OperationRegistry::with_builtin();
    let stiffness = back
        .ops(&registry)
        .value("calculate_stiffness", OpArgs::new().arg(0.0).arg(1.0).arg("secant"))
        .unwrap();
    assert!((stiffness.as_f64().unwrap() - 9.0).abs() < 1e-12);
}

#[test]
fn test_parquet_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("specimen.parquet");
    let original = specimen();
    original.to_parquet(&path).unwrap();

    let back = load_file(&path).unwrap();
    assert_eq!(back.step(), original.step());
    assert_eq!(back.column_names(), original.column_names());
    assert_eq!(back.column("load").unwrap().values(), original.column("load").unwrap().values());
    assert_eq!(
        back.column("count").unwrap().values()[3],
        Some(Scalar::Int(4)),
        "integer columns stay integers"
    );
    assert_eq!(back.column("disp").unwrap().unit(), Some("mm"));
    assert_eq!(back.metadata()["format"].as_str(), Some("parquet"));
}

#[test]
fn test_formats_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("formats.json");
    let mut file = std::fs::File::create(&config).unwrap();
    writeln!(
        file,
        r#"{{"bare": {{"title_row": null, "ch_row": null, "name_row": 0, "unit_row": null,
             "data_start_row": 1, "date_col": null, "time_col": null,
             "data_start_col": 1, "delimiter": ","}}}}"#
    )
    .unwrap();
    let mut formats = FormatRegistry::with_builtin();
    formats.load_json(&config).unwrap();

    let data = dir.path().join("bare.csv");
    std::fs::write(&data, "step,a,b\n0.5,1,x\n1.5,2,y\n").unwrap();
    let c = ColumnCollection::from_file_with(&data, &ReadOptions::format("bare"), &formats).unwrap();
    assert_eq!(c.step(), &[0.5, 1.5]);
    assert_eq!(c.column_names(), vec!["a", "b"]);
    assert_eq!(c.column("b").unwrap().kind(), ColumnKind::String);
    assert!(!c.metadata().contains_key("date"));
}

#[test]
fn test_shift_jis_round_trip_feeds_domain_inference() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jp.txt");
    let mut formats = FormatRegistry::with_builtin();
    let tasc_txt = formats.get("tasc_txt").unwrap().clone();
    formats.register(
        "jp_names",
        FileFormat {
            use_channel_name: false,
            ..tasc_txt
        },
    );
    let record = ColumnCollection::new(
        vec![1.0, 2.0, 3.0],
        vec![
            Column::detect("荷重", cells([0.0, 5.0, 10.0])).with_channel("CH1").with_unit("kN"),
            Column::detect("変位", cells([0.0, 1.0, 2.0])).with_channel("CH2").with_unit("mm"),
        ],
        Metadata::new(),
    )
    .unwrap();
    record.to_file_with(&path, "jp_names", &formats).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(std::str::from_utf8(&bytes).is_err(), "written as Shift_JIS, not UTF-8");
    let (text, _, malformed) = encoding_rs::SHIFT_JIS.decode(&bytes);
    assert!(!malformed);
    assert!(text.contains("荷重\t変位"));

    let back = ColumnCollection::from_file_with(&path, &ReadOptions::format("jp_names"), &formats)
        .unwrap();
    assert_eq!(back.column_names(), vec!["荷重", "変位"]);
    assert_eq!(back.column("荷重").unwrap().unit(), Some("kN"));

    let registry = OperationRegistry::with_builtin();
    let ld = back
        .ops(&registry)
        .as_domain(LOAD_DISPLACEMENT, OpArgs::new())
        .unwrap()
        .end();
    assert_eq!(ld.load_column(), Some("荷重"));
    assert_eq!(ld.displacement_column(), Some("変位"));
}
