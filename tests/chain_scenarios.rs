use tasc::data::value::{cells, optional_cells};
use tasc::domains::LOAD_DISPLACEMENT;
use tasc::{
    ColumnCollection, Metadata, OpArgs, OpOutput, OperationRegistry, Scalar, TascError, Value,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn abc() -> ColumnCollection {
    ColumnCollection::from_raw(
        vec![1.0, 2.0, 3.0],
        vec![("a", cells([1.0, 2.0, 3.0]))],
        Metadata::new(),
        true,
    )
    .unwrap()
}

fn floats(c: &ColumnCollection, name: &str) -> Vec<Option<f64>> {
    c.column(name).unwrap().as_f64_options()
}

#[test]
fn test_add_column_then_index() {
    init_logging();
    let mut c = abc();
    c.add_values("b", cells([10i64, 20, 30])).unwrap();
    assert_eq!(c.columns().len(), 2);
    assert_eq!(
        c.column("b").unwrap().values(),
        &[Some(Scalar::Int(10)), Some(Scalar::Int(20)), Some(Scalar::Int(30))]
    );

    let err = c.add_values("c", cells([1.0, 2.0])).unwrap_err();
    assert!(
        matches!(err, TascError::ShapeMismatch { expected: 3, actual: 2, .. }),
        "a short column must be rejected, got {err}"
    );
    assert_eq!(c.columns().len(), 2, "a rejected column leaves the collection alone");
}

#[test]
fn test_selected_copy_is_isolated() {
    let registry = OperationRegistry::with_builtin();
    let col1 = abc();
    let mut col2 = col1
        .ops(&registry)
        .call("select", OpArgs::new().with("columns", vec!["a"]))
        .unwrap()
        .end();
    col2.column_mut("a").unwrap().values_mut()[0] = Some(Scalar::Float(99.0));

    assert_eq!(floats(&col1, "a")[0], Some(1.0));
    assert_eq!(floats(&col2, "a")[0], Some(99.0));
}

#[test]
fn test_as_domain_validates_columns() {
    let registry = OperationRegistry::with_builtin();
    let err = abc()
        .ops(&registry)
        .as_domain(
            LOAD_DISPLACEMENT,
            OpArgs::new()
                .with("load_column", "a")
                .with("displacement_column", "b"),
        )
        .unwrap_err();
    assert!(
        matches!(err, TascError::MissingRequiredColumn { ref column, .. } if column == "b"),
        "got {err}"
    );

    let mut c = abc();
    c.add_values("b", cells([0.1, 0.2, 0.3])).unwrap();
    let ld = c
        .ops(&registry)
        .as_domain(
            LOAD_DISPLACEMENT,
            OpArgs::new()
                .with("load_column", "a")
                .with("displacement_column", "b"),
        )
        .unwrap()
        .end();
    assert_eq!(ld.load_column(), Some("a"));
    assert_eq!(ld.displacement_column(), Some("b"));
    assert_eq!(c.domain_name(), "core", "the source keeps its domain");
}

#[test]
fn test_unknown_operation_leaves_source_usable() {
    let registry = OperationRegistry::with_builtin();
    let c = abc();
    let err = c
        .ops(&registry)
        .call("totally_unknown_op", OpArgs::new())
        .unwrap_err();
    assert!(matches!(err, TascError::UnknownOperation { ref name, .. } if name == "totally_unknown_op"));

    assert_eq!(c, abc());
    let doubled = c
        .ops(&registry)
        .call("multiply", OpArgs::new().arg("a").arg(2.0).arg("a2"))
        .unwrap()
        .end();
    assert_eq!(floats(&doubled, "a2"), vec![Some(2.0), Some(4.0), Some(6.0)]);
}

#[test]
fn test_add_then_remove_round_trip() {
    let registry = OperationRegistry::with_builtin();
    let c = abc();
    let back = c
        .ops(&registry)
        .call("add_column", OpArgs::new().arg("tmp").arg(vec![7, 8, 9]))
        .unwrap()
        .call("remove_column", OpArgs::new().arg("tmp"))
        .unwrap()
        .end();
    assert_eq!(back.column_names(), c.column_names());
    assert_eq!(back, c);
}

#[test]
fn test_domain_operation_shadows_core() {
    let mut registry = OperationRegistry::with_builtin();
    registry.register("core", "label", |_c: &ColumnCollection, _a: &OpArgs| {
        Ok(OpOutput::from(Value::from("core")))
    });
    registry.register(LOAD_DISPLACEMENT, "label", |_c: &ColumnCollection, _a: &OpArgs| {
        Ok(OpOutput::from(Value::from("load_displacement")))
    });

    let mut c = abc();
    c.add_values("b", cells([0.1, 0.2, 0.3])).unwrap();
    let core = c.ops(&registry).value("label", OpArgs::new()).unwrap();
    assert_eq!(core.as_str(), Some("core"));

    let chain = c
        .ops(&registry)
        .as_domain(LOAD_DISPLACEMENT, OpArgs::new().arg("a").arg("b"))
        .unwrap();
    assert!(
        chain.available_operations().contains(&"select".to_string()),
        "core operations stay reachable from a domain"
    );
    let shadowed = chain.value("label", OpArgs::new()).unwrap();
    assert_eq!(shadowed.as_str(), Some("load_displacement"));
}

#[test]
fn test_domain_gate() {
    let registry = OperationRegistry::with_builtin();
    let err = abc()
        .ops(&registry)
        .call("find_yield_point", OpArgs::new())
        .unwrap_err();
    assert!(
        matches!(err, TascError::UnknownOperation { ref domain, .. } if domain == "core"),
        "domain operations are not visible from core, got {err}"
    );
}

#[test]
fn test_missing_values_propagate() {
    let registry = OperationRegistry::with_builtin();
    let c = ColumnCollection::from_raw(
        vec![1.0, 2.0, 3.0],
        vec![
            ("x", optional_cells([Some(1.0), None, Some(3.0)])),
            ("y", optional_cells([Some(10.0), Some(20.0), None])),
        ],
        Metadata::new(),
        true,
    )
    .unwrap();

    let out = c
        .ops(&registry)
        .call("add", OpArgs::new().arg("x").arg("y").arg("sum"))
        .unwrap()
        .call("abs_values", OpArgs::new().arg("sum"))
        .unwrap()
        .end();
    assert_eq!(floats(&out, "sum"), vec![Some(11.0), None, None]);
    assert_eq!(out.len(), 3);
}

#[test]
fn test_cyclic_analysis_chain() {
    init_logging();
    let registry = OperationRegistry::with_builtin();
    let load = [0.0, 5.0, 10.0, 5.0, 0.0, -5.0, -10.0, -5.0, 0.0, 8.0, 12.0, 15.0, 8.0, 0.0];
    let disp = [0.0, 1.0, 2.0, 1.0, 0.0, -1.0, -2.0, -1.0, 0.0, 1.6, 2.4, 3.0, 2.0, 0.0];
    let c = ColumnCollection::from_raw(
        (1..=load.len()).map(|i| i as f64).collect(),
        vec![("Load", cells(load)), ("Disp", cells(disp))],
        Metadata::new(),
        true,
    )
    .unwrap();

    let ld = c
        .ops(&registry)
        .as_domain(LOAD_DISPLACEMENT, OpArgs::new())
        .unwrap()
        .call("create_skeleton_curve", OpArgs::new())
        .unwrap()
        .end();
    assert_eq!(ld.load_column(), Some("Load"), "load column found by name");
    let x = ld.metadata_path("curves.skeleton_curve.x").unwrap();
    assert_eq!(x.as_list().map(<[Value]>::len), Some(4));

    let stiffness = ld
        .ops(&registry)
        .value("calculate_stiffness", OpArgs::new().arg(0.0).arg(1.0))
        .unwrap();
    assert!(stiffness.as_f64().unwrap().is_finite());
}
