use crate::data::collection::ColumnCollection;
use crate::data::column::Column;
use crate::domains::DomainCollectionFactory;
use crate::error::{Result, TascError};
use crate::ops::{OpArgs, OpOutput};

/// `add_column(name, values, unit?)`: values must line up with the steps.
pub fn add_column(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let name = args.str(0, "name")?;
    let list = args
        .required(1, "values")?
        .as_list()
        .ok_or_else(|| TascError::invalid("'values' must be a list"))?;
    let values = list
        .iter()
        .map(|v| {
            v.to_cell()
                .ok_or_else(|| TascError::invalid(format!("column values must be scalars, got {v}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut column = Column::detect(name, values);
    if let Some(unit) = args.opt_str(2, "unit")? {
        column = column.with_unit(unit);
    }
    let mut out = c.clone();
    out.add_column(column)?;
    Ok(out.into())
}

/// `remove_column(name)`. The domain payload is left as it is, even when
/// it referenced the removed column.
pub fn remove_column(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let mut out = c.clone();
    out.remove_column(args.str(0, "name")?)?;
    Ok(out.into())
}

pub fn rename_column(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    let mut out = c.clone();
    out.rename_column(args.str(0, "old")?, args.str(1, "new")?)?;
    Ok(out.into())
}

/// `head(n = 5)`.
pub fn head(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    Ok(c.head(args.usize_or(0, "n", 5)?)?.into())
}

/// `tail(n = 5)`.
pub fn tail(c: &ColumnCollection, args: &OpArgs) -> Result<OpOutput> {
    Ok(c.tail(args.usize_or(0, "n", 5)?)?.into())
}

/// `as_domain(domain, ...)`: re-create the current collection as `domain`.
/// Everything after the domain name is handed to that domain's
/// constructor.
pub fn as_domain(
    factory: &DomainCollectionFactory,
    c: &ColumnCollection,
    args: &OpArgs,
) -> Result<OpOutput> {
    let domain = args.str(0, "domain")?;
    let skip = if args.named("domain").is_some() { 0 } else { 1 };
    let rest = args.forward(skip, &["domain"]);
    Ok(factory.from_collection(c, domain, &rest)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::value::{Metadata, Scalar};
    use crate::domains::LOAD_DISPLACEMENT;
    use crate::ops::core::fixtures::{registry, sample};

    #[test]
    fn test_add_then_remove_restores_columns() {
        let registry = registry();
        let original = sample();
        let out = original
            .ops(&registry)
            .call(
                "add_column",
                OpArgs::new().arg("c").arg(vec![1, 2, 3, 4, 5]).with("unit", "mm"),
            )
            .unwrap()
            .call("remove_column", OpArgs::new().arg("c"))
            .unwrap()
            .end();
        assert_eq!(out, original);
    }

    #[test]
    fn test_add_column_shape_and_duplicates() {
        let registry = registry();
        let err = sample()
            .ops(&registry)
            .call("add_column", OpArgs::new().arg("c").arg(vec![1, 2]))
            .unwrap_err();
        assert!(matches!(err, TascError::ShapeMismatch { .. }));

        let err = sample()
            .ops(&registry)
            .call("add_column", OpArgs::new().arg("a").arg(vec![1, 2, 3, 4, 5]))
            .unwrap_err();
        assert!(matches!(err, TascError::DuplicateColumn(_)));
    }

    #[test]
    fn test_rename_head_tail() {
        let registry = registry();
        let out = sample()
            .ops(&registry)
            .call("rename_column", OpArgs::new().arg("label").arg("tag"))
            .unwrap()
            .call("tail", OpArgs::new().arg(2))
            .unwrap()
            .end();
        assert_eq!(out.step(), &[4.0, 5.0]);
        assert_eq!(out.column("tag").unwrap().values()[0], Some(Scalar::from("z")));

        let err = sample()
            .ops(&registry)
            .call("head", OpArgs::new().arg(6))
            .unwrap_err();
        assert!(matches!(err, TascError::InvalidArgument(_)));
    }

    #[test]
    fn test_as_domain_positional_and_named() {
        let registry = registry();
        let positional = sample()
            .ops(&registry)
            .call("as_domain", OpArgs::new().arg(LOAD_DISPLACEMENT).arg("b").arg("a"))
            .unwrap()
            .end();
        assert_eq!(positional.load_column(), Some("b"));
        assert_eq!(positional.displacement_column(), Some("a"));

        let named = sample()
            .ops(&registry)
            .call(
                "as_domain",
                OpArgs::new()
                    .with("domain", LOAD_DISPLACEMENT)
                    .with("load_column", "a")
                    .with("displacement_column", "b"),
            )
            .unwrap()
            .end();
        assert_eq!(named.load_column(), Some("a"));
        assert_eq!(named.metadata(), &Metadata::new());
    }

    #[test]
    fn test_remove_column_keeps_domain_payload() {
        let registry = registry();
        let out = sample()
            .ops(&registry)
            .as_domain(
                LOAD_DISPLACEMENT,
                OpArgs::new().with("load_column", "a").with("displacement_column", "b"),
            )
            .unwrap()
            .call("remove_column", OpArgs::new().arg("b"))
            .unwrap()
            .end();
        assert_eq!(out.domain_name(), LOAD_DISPLACEMENT);
        assert_eq!(out.displacement_column(), Some("b"));
        assert!(!out.contains("b"));
    }
}
