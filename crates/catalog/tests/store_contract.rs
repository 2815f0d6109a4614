//! Both stores answer the same questions the same way.

use pretty_assertions::assert_eq;
use refactor_catalog::{
    CatalogSnapshot, ColumnInfo, MetadataAccessError, MetadataStore, ObjectKind, QueryConnection,
    Result, RoutineClass, RoutineRef, ScalarTypeInfo, SqlMetadataAccessor, SqlRow, SqlValue,
};

const GET_ORDERS: &str = "CREATE PROCEDURE dbo.GetOrders AS SELECT * FROM dbo.Orders";

fn text(v: &str) -> SqlValue {
    SqlValue::Text(v.to_string())
}

/// Answers catalog queries for a tiny fixed database by looking at the
/// catalog views each query reads.
struct FixtureServer;

impl QueryConnection for FixtureServer {
    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<SqlRow>> {
        let name = params.first().copied().unwrap_or_default();
        let rows = if sql.contains("sys.sql_modules") {
            if sql.contains("o.type = 'P'") && name.eq_ignore_ascii_case("GetOrders") {
                vec![SqlRow(vec![text(GET_ORDERS)])]
            } else {
                Vec::new()
            }
        } else if sql.contains("INFORMATION_SCHEMA.COLUMNS") {
            if name.eq_ignore_ascii_case("Orders") {
                vec![
                    SqlRow(vec![text("Id"), text("int"), SqlValue::Null, text("NO")]),
                    SqlRow(vec![
                        text("Customer"),
                        text("nvarchar"),
                        SqlValue::Int(100),
                        text("YES"),
                    ]),
                ]
            } else {
                Vec::new()
            }
        } else if sql.contains("INFORMATION_SCHEMA.TABLES") {
            match name.to_ascii_lowercase().as_str() {
                "orders" => vec![SqlRow(vec![text("BASE TABLE")])],
                "activeorders" => vec![SqlRow(vec![text("VIEW")])],
                _ => Vec::new(),
            }
        } else if sql.contains("sys.table_types") {
            if name.eq_ignore_ascii_case("OrderLines") {
                vec![SqlRow(vec![
                    text("Sku"),
                    text("varchar"),
                    SqlValue::Int(32),
                    SqlValue::Bool(false),
                ])]
            } else {
                Vec::new()
            }
        } else if sql.contains("is_user_defined") {
            if name.eq_ignore_ascii_case("Money2") {
                vec![SqlRow(vec![text("Money2"), text("decimal"), SqlValue::Int(9)])]
            } else {
                Vec::new()
            }
        } else if sql.contains("sys.sql_expression_dependencies") {
            if name.eq_ignore_ascii_case("GetOrders") {
                vec![SqlRow(vec![text("Orders"), text("dbo"), text("U ")])]
            } else {
                Vec::new()
            }
        } else {
            return Err(MetadataAccessError::malformed_query(sql, "unexpected query"));
        };
        Ok(rows)
    }
}

fn dbo(name: &str) -> RoutineRef {
    RoutineRef::in_default_schema(name)
}

fn snapshot() -> CatalogSnapshot {
    CatalogSnapshot::new()
        .with_routine(
            dbo("GetOrders"),
            RoutineClass::Procedure,
            GET_ORDERS,
            vec![(dbo("Orders"), ObjectKind::Table)],
        )
        .with_relation(
            dbo("Orders"),
            ObjectKind::Table,
            vec![
                ColumnInfo::new("Id", "int").not_null(),
                ColumnInfo::new("Customer", "nvarchar").max_length(100),
            ],
        )
        .with_relation(dbo("ActiveOrders"), ObjectKind::View, Vec::new())
        .with_table_type(
            dbo("OrderLines"),
            vec![ColumnInfo::new("Sku", "varchar").max_length(32).not_null()],
        )
        .with_scalar_type(ScalarTypeInfo {
            name: "Money2".into(),
            base_type_name: "decimal".into(),
            max_length: Some(9),
        })
}

fn check_contract(store: &dyn MetadataStore) {
    assert_eq!(
        store
            .fetch_routine_definition("GetOrders", "dbo", RoutineClass::Procedure)
            .unwrap(),
        GET_ORDERS
    );
    // wrong class and unknown names are empty, not errors
    assert_eq!(
        store
            .fetch_routine_definition("GetOrders", "dbo", RoutineClass::Function)
            .unwrap(),
        ""
    );
    assert_eq!(
        store
            .fetch_routine_definition("Nope", "dbo", RoutineClass::Procedure)
            .unwrap(),
        ""
    );

    assert_eq!(
        store.fetch_table_columns("Orders", "dbo").unwrap(),
        vec![
            ColumnInfo::new("Id", "int").not_null(),
            ColumnInfo::new("Customer", "nvarchar").max_length(100),
        ]
    );
    assert!(store.fetch_table_columns("Nope", "dbo").unwrap().is_empty());

    assert_eq!(
        store.fetch_relation_kind("Orders", "dbo").unwrap(),
        Some(ObjectKind::Table)
    );
    assert_eq!(
        store.fetch_relation_kind("activeorders", "DBO").unwrap(),
        Some(ObjectKind::View)
    );
    assert_eq!(store.fetch_relation_kind("Nope", "dbo").unwrap(), None);

    assert_eq!(
        store.fetch_table_type_columns("OrderLines", "dbo").unwrap(),
        vec![ColumnInfo::new("Sku", "varchar").max_length(32).not_null()]
    );

    let money = store.fetch_scalar_type_info("Money2").unwrap().unwrap();
    assert_eq!(money.base_type_name, "decimal");
    assert_eq!(money.max_length, Some(9));
    assert_eq!(store.fetch_scalar_type_info("Nope").unwrap(), None);

    let deps = store
        .fetch_dependencies(&RoutineRef::in_default_schema("GetOrders"))
        .unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].target, RoutineRef::in_default_schema("Orders"));
    assert_eq!(deps[0].kind, ObjectKind::Table);
}

#[test]
fn sql_accessor_honors_the_contract() {
    check_contract(&SqlMetadataAccessor::new(FixtureServer));
}

#[test]
fn snapshot_honors_the_contract() {
    check_contract(&snapshot());
}

#[test]
fn snapshot_survives_a_disk_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(&path, serde_json::to_string_pretty(&snapshot()).unwrap()).unwrap();

    check_contract(&CatalogSnapshot::load(&path).unwrap());
}
