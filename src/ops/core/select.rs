use crate::data::collection::ColumnCollection;
use crate::data::value::Value;
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};

/// `select(columns?, indices?)`: column subset and/or row subset.
pub fn select(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let columns = args.str_list(0, "columns")?;
    let indices = args.usize_list(1, "indices")?;
    Ok(subset(c, columns.as_deref(), indices.as_deref())?.into())
}

/// `select_step(steps, columns?)`: rows whose step value is listed. Steps
/// that do not occur are recorded under `missing_steps`.
pub fn select_step(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let steps = args
        .f64_list(0, "steps")?
        .ok_or_else(|| TascError::invalid("missing required argument 'steps'"))?;
    let columns = args.str_list(1, "columns")?;

    let mut indices = Vec::new();
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for step in steps {
        match c.step().iter().position(|&s| s == step) {
            Some(i) => {
                indices.push(i);
                found.push(step);
            }
            None => missing.push(step),
        }
    }
    if !missing.is_empty() {
        log::debug!("select_step: {} requested steps not present", missing.len());
    }

    let mut out = subset(c, columns.as_deref(), Some(&indices))?;
    let meta = out.metadata_mut();
    meta.insert("selected_steps".to_string(), Value::from(found));
    meta.insert("missing_steps".to_string(), Value::from(missing));
    Ok(out.into())
}

pub(crate) fn subset(
    c: &ColumnCollection,
    columns: Option<&[String]>,
    indices: Option<&[usize]>,
) -> Result<ColumnCollection> {
    let mut out = match indices {
        Some(indices) => c.take_rows(indices)?,
        None => c.clone(),
    };
    if let Some(columns) = columns {
        let names: Vec<&str> = columns.iter().map(String::as_str).collect();
        out.retain_columns(&names)?;
        out = out.reconcile_domain();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::value::Scalar;
    use crate::ops::core::fixtures::{floats, registry, sample};

    #[test]
    fn test_select_columns_and_rows() {
        let registry = registry();
        let out = sample()
            .ops(&registry)
            .call(
                "select",
                OpArgs::new().with("columns", vec!["b", "a"]).with("indices", vec![0_i64, 3]),
            )
            .unwrap()
            .end();
        assert_eq!(out.column_names(), vec!["b", "a"]);
        assert_eq!(out.step(), &[1.0, 4.0]);
        assert_eq!(floats(&out, "a"), vec![Some(1.0), Some(4.0)]);
    }

    #[test]
    fn test_select_round_trip() {
        let registry = registry();
        let once = sample()
            .ops(&registry)
            .call("select", OpArgs::new().arg(vec!["a", "label"]))
            .unwrap()
            .end();
        let twice = once
            .ops(&registry)
            .call("select", OpArgs::new().arg(vec!["a", "label"]))
            .unwrap()
            .end();
        assert_eq!(once.column("a").unwrap().values(), twice.column("a").unwrap().values());
        assert_eq!(once.column("label").unwrap().values(), twice.column("label").unwrap().values());
    }

    #[test]
    fn test_select_errors() {
        let registry = registry();
        let err = sample()
            .ops(&registry)
            .call("select", OpArgs::new().with("columns", vec!["nope"]))
            .unwrap_err();
        assert!(matches!(err, TascError::MissingColumn(_)));

        let err = sample()
            .ops(&registry)
            .call("select", OpArgs::new().with("indices", vec![9_i64]))
            .unwrap_err();
        assert!(matches!(err, TascError::InvalidArgument(_)));
    }

    #[test]
    fn test_select_step_records_missing() {
        let registry = registry();
        let out = sample()
            .ops(&registry)
            .call("select_step", OpArgs::new().arg(vec![2.0, 7.0, 5.0]))
            .unwrap()
            .end();
        assert_eq!(out.step(), &[2.0, 5.0]);
        assert_eq!(out.metadata_path("missing_steps").unwrap(), &Value::from(vec![7.0]));
        assert_eq!(
            out.column("label").unwrap().values(),
            &[Some(Scalar::from("y")), Some(Scalar::from("y"))][..]
        );
    }
}
