//! Integration tests for prepare, execute and the helpers around them.

use panel_db::db::params::SQLSTATE_INVALID_PARAMETER;
use panel_db::models::{ConnectParams, DriverOptions};
use panel_db::{
    Attribute, AttributeValue, Connection, DbError, Parameters, PrepareOptions, QueryParam,
};
use serde_json::json;

async fn open_panel() -> Connection {
    let mut conn = Connection::open("panel", &ConnectParams::sqlite_memory())
        .await
        .unwrap();
    conn.execute(
        "CREATE TABLE admin (
            admin_id INTEGER PRIMARY KEY,
            admin_name TEXT NOT NULL,
            admin_type TEXT NOT NULL,
            created_by INTEGER
        );
        INSERT INTO admin (admin_id, admin_name, admin_type, created_by) VALUES
            (1, 'admin', 'admin', NULL),
            (5, 'reseller1', 'reseller', 1),
            (7, 'client1', 'user', 5);",
        None,
    )
    .await
    .unwrap()
    .unwrap();
    conn
}

#[tokio::test]
async fn test_prepare_and_execute_positional() {
    let mut conn = open_panel().await;

    let stmt = conn
        .prepare(
            "SELECT * FROM admin WHERE admin_id = ?",
            PrepareOptions::default(),
        )
        .await
        .unwrap();
    assert!(!stmt.uses_named_placeholders());

    let mut result = conn
        .execute(&stmt, Some(Parameters::positional([5])))
        .await
        .unwrap()
        .unwrap();
    let row = result.fetch_one().unwrap();
    assert_eq!(row["admin_id"], json!(5));
    assert_eq!(row["admin_name"], json!("reseller1"));
    assert_eq!(row["created_by"], json!(1));
    assert!(result.fetch_one().is_none());

    // Same statement, different value
    let mut result = conn
        .execute(&stmt, Some(Parameters::positional([1])))
        .await
        .unwrap()
        .unwrap();
    let row = result.fetch_one().unwrap();
    assert_eq!(row["admin_name"], json!("admin"));
    assert_eq!(row["created_by"], json!(null));
}

#[tokio::test]
async fn test_no_matching_row_is_empty_not_failure() {
    let mut conn = open_panel().await;

    let stmt = conn
        .prepare(
            "SELECT * FROM admin WHERE admin_id = ?",
            PrepareOptions::default(),
        )
        .await
        .unwrap();
    let mut result = conn
        .execute(&stmt, Some(Parameters::positional([42])))
        .await
        .unwrap()
        .unwrap();

    assert!(result.is_empty());
    assert!(result.fetch_one().is_none());
    assert!(conn.error_info().is_success());
    // column names are still known from the statement
    assert_eq!(result.column_count(), 4);
    assert_eq!(result.columns()[0].name, "admin_id");
}

#[tokio::test]
async fn test_named_placeholders() {
    let mut conn = open_panel().await;

    let stmt = conn
        .prepare(
            "SELECT admin_name FROM admin WHERE admin_type = :type AND created_by = :creator",
            PrepareOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(stmt.placeholder_names(), ["type", "creator"]);

    let mut result = conn
        .execute(
            &stmt,
            Some(Parameters::named([
                ("creator", QueryParam::Int(5)),
                ("type", QueryParam::from("user")),
            ])),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.fetch_column(0), Some(json!("client1")));
}

#[tokio::test]
async fn test_named_parameters_on_raw_sql() {
    let mut conn = open_panel().await;

    let mut result = conn
        .execute(
            "SELECT admin_name FROM admin WHERE admin_id = :id OR created_by = :id ORDER BY admin_id",
            Some(Parameters::named([("id", 5)])),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        result.fetch_all_column(0),
        vec![json!("reseller1"), json!("client1")]
    );
}

#[tokio::test]
async fn test_missing_named_parameter_is_soft_failure() {
    let mut conn = open_panel().await;

    let stmt = conn
        .prepare(
            "SELECT * FROM admin WHERE admin_id = :id",
            PrepareOptions::default(),
        )
        .await
        .unwrap();

    let failure = conn
        .execute(&stmt, Some(Parameters::named([("other", 1)])))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(failure.sql_state(), SQLSTATE_INVALID_PARAMETER);
    assert_eq!(conn.last_error_code(), SQLSTATE_INVALID_PARAMETER);
    assert!(conn.last_error_message().contains(":id"));

    let failure = conn
        .execute(
            "SELECT :a",
            Some(Parameters::named([("a", 1), ("b", 2)])),
        )
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(failure.sql_state(), SQLSTATE_INVALID_PARAMETER);
    assert!(failure.message().contains(":b"));
}

#[tokio::test]
async fn test_bad_sql_records_last_error() {
    let mut conn = open_panel().await;
    assert_eq!(conn.last_error_code(), "");
    assert_eq!(conn.last_error_message(), "");
    assert!(conn.error_info().is_success());

    let failure = conn
        .execute("SELEC * FROM admin", None)
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(conn.last_error_code(), failure.sql_state());
    assert!(conn.last_error_message().contains("syntax error"));
    assert!(!conn.error_info().is_success());
    assert!(conn.error_msg().contains("syntax error"));

    // A later success clears error_info but keeps the last error
    conn.execute("SELECT 1", None).await.unwrap().unwrap();
    assert!(conn.error_info().is_success());
    assert_eq!(conn.error_msg(), "00000");
    assert!(conn.last_error_message().contains("syntax error"));
}

#[tokio::test]
async fn test_prepare_failure_is_soft() {
    let mut conn = open_panel().await;

    let failure = conn
        .prepare("SELECT * FROM missing_table", PrepareOptions::default())
        .await
        .unwrap_err();
    assert!(failure.message().contains("missing_table"));
    assert!(conn.last_error_message().contains("missing_table"));

    // The connection is still usable
    assert!(conn.ping().await.is_ok());
}

#[tokio::test]
async fn test_statement_from_other_connection_is_rejected() {
    let mut first = open_panel().await;
    let mut second = open_panel().await;

    let stmt = first
        .prepare("SELECT * FROM admin", PrepareOptions::default())
        .await
        .unwrap();
    assert_eq!(stmt.owner(), first.id());

    let err = second.execute(&stmt, None).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidStatement { .. }));
    assert!(err.to_string().starts_with("Wrong parameter"));

    // Nothing was recorded on the connection that rejected it
    assert_eq!(second.last_error_code(), "");
}

#[tokio::test]
async fn test_non_persistent_statement_can_be_reused() {
    let mut conn = open_panel().await;

    let stmt = conn
        .prepare(
            "SELECT admin_name FROM admin WHERE admin_id = ?",
            PrepareOptions { persistent: false },
        )
        .await
        .unwrap();
    for (id, name) in [(1, "admin"), (7, "client1")] {
        let mut result = conn
            .execute(&stmt, Some(Parameters::positional([id])))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.fetch_column(0), Some(json!(name)));
    }
}

#[tokio::test]
async fn test_write_statements_and_insert_id() {
    let mut conn = open_panel().await;
    // set by the fixture insert
    assert_eq!(conn.insert_id().await, "7");

    let result = conn
        .execute(
            "INSERT INTO admin (admin_name, admin_type) VALUES (?, ?)",
            Some(Parameters::positional(["client2", "user"])),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.rows_affected(), 1);
    assert_eq!(result.column_count(), 0);
    assert_eq!(result.last_insert_id(), Some("8"));
    assert_eq!(conn.insert_id().await, "8");

    // An update does not change the last insert id
    let result = conn
        .execute(
            "UPDATE admin SET admin_type = 'reseller' WHERE admin_type = 'user'",
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.rows_affected(), 2);
    assert_eq!(conn.insert_id().await, "8");
}

#[tokio::test]
async fn test_result_cursor() {
    let mut conn = open_panel().await;

    let mut result = conn
        .execute("SELECT admin_id, admin_name FROM admin ORDER BY admin_id", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.row_count(), 3);

    assert_eq!(result.fetch_column(1), Some(json!("admin")));
    let rest = result.fetch_all();
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[0]["admin_id"], json!(5));
    assert!(result.fetch_all().is_empty());
}

#[tokio::test]
async fn test_value_types() {
    let mut conn = open_panel().await;

    let mut result = conn
        .execute(
            "SELECT ? AS i, ? AS f, ? AS s, ? AS n, ? AS b",
            Some(Parameters::positional(vec![
                QueryParam::Int(42),
                QueryParam::Float(1.5),
                QueryParam::from("zoë"),
                QueryParam::Null,
                QueryParam::Bytes(vec![0xde, 0xad]),
            ])),
        )
        .await
        .unwrap()
        .unwrap();
    let row = result.fetch_one().unwrap();
    assert_eq!(row["i"], json!(42));
    assert_eq!(row["f"], json!(1.5));
    assert_eq!(row["s"], json!("zoë"));
    assert_eq!(row["n"], json!(null));
    assert!(!row["b"].is_null());

    // Column order is preserved
    let keys: Vec<&str> = row.keys().map(String::as_str).collect();
    assert_eq!(keys, ["i", "f", "s", "n", "b"]);
}

#[tokio::test]
async fn test_untyped_column_values() {
    let mut conn = open_panel().await;
    conn.execute(
        "CREATE TABLE settings (value);
        INSERT INTO settings (value) VALUES (7), (2.5), ('on'), (NULL), (X'FF00');",
        None,
    )
    .await
    .unwrap()
    .unwrap();

    let mut result = conn
        .execute("SELECT value FROM settings ORDER BY rowid", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        result.fetch_all_column(0),
        vec![json!(7), json!(2.5), json!("on"), json!(null), json!("/wA=")]
    );
}

#[tokio::test]
async fn test_insert_id_without_inserts() {
    let mut conn = Connection::open("fresh", &ConnectParams::sqlite_memory())
        .await
        .unwrap();
    assert_eq!(conn.insert_id().await, "0");
}

#[tokio::test]
async fn test_quote_round_trip() {
    let mut conn = open_panel().await;

    assert_eq!(conn.quote_identifier_symbol(), '`');
    assert_eq!(conn.quote_identifier("admin"), "`admin`");
    assert_eq!(conn.quote("O'Reilly"), "'O''Reilly'");
    assert_eq!(conn.quote(5), "5");
    assert_eq!(conn.quote(QueryParam::Null), "NULL");

    let sql = format!(
        "SELECT {} AS v FROM {} WHERE admin_id = {}",
        conn.quote("it's"),
        conn.quote_identifier("admin"),
        conn.quote(1)
    );
    let mut result = conn.execute(&sql, None).await.unwrap().unwrap();
    assert_eq!(result.fetch_column(0), Some(json!("it's")));
}

#[tokio::test]
async fn test_quote_char_override() {
    let params = ConnectParams::sqlite_memory().with_options(DriverOptions {
        quote_char: Some('"'),
        ..DriverOptions::default()
    });
    let conn = Connection::open("quoted", &params).await.unwrap();
    assert_eq!(conn.quote_identifier("my\"table"), "\"my\"\"table\"");
}

#[tokio::test]
async fn test_connection_attributes() {
    let mut conn = open_panel().await;
    assert_eq!(
        conn.get_attribute(Attribute::DriverName),
        Some(AttributeValue::Text("sqlite".to_string()))
    );
    assert_eq!(
        conn.get_attribute(Attribute::ServerVersion),
        conn.server_version().map(AttributeValue::from)
    );
    assert!(matches!(
        conn.get_attribute(Attribute::CachedStatements),
        Some(AttributeValue::Count(_))
    ));

    assert_eq!(
        conn.get_attribute(Attribute::Autocommit),
        Some(AttributeValue::Bool(true))
    );
    conn.begin_transaction().await.unwrap();
    assert_eq!(
        conn.get_attribute(Attribute::Autocommit),
        Some(AttributeValue::Bool(false))
    );
    conn.roll_back().await.unwrap();
    assert_eq!(
        conn.get_attribute(Attribute::Autocommit),
        Some(AttributeValue::Bool(true))
    );
}

#[tokio::test]
async fn test_set_quote_char_attribute() {
    let mut conn = open_panel().await;
    assert_eq!(conn.quote_identifier("admin"), "`admin`");

    conn.set_attribute(Attribute::QuoteChar, '"'.into()).unwrap();
    assert_eq!(conn.quote_identifier_symbol(), '"');
    assert_eq!(conn.quote_identifier("admin"), "\"admin\"");
    assert_eq!(
        conn.get_attribute(Attribute::QuoteChar),
        Some(AttributeValue::Char('"'))
    );

    for (attribute, value) in [
        (Attribute::QuoteChar, AttributeValue::Char('a')),
        (Attribute::QuoteChar, AttributeValue::Char(' ')),
        (Attribute::QuoteChar, AttributeValue::Text("`".to_string())),
        (Attribute::DriverName, AttributeValue::Text("mysql".to_string())),
        (Attribute::Autocommit, AttributeValue::Bool(false)),
    ] {
        let err = conn.set_attribute(attribute, value).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }), "{}", attribute);
    }
    assert_eq!(conn.quote_identifier_symbol(), '"');
    assert_eq!(conn.get_attribute(Attribute::DriverName), Some("sqlite".into()));
}

#[tokio::test]
async fn test_get_tables() {
    let mut conn = open_panel().await;
    conn.execute(
        "CREATE TABLE admin_props (id INTEGER); CREATE TABLE domain (domain_id INTEGER);",
        None,
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(
        conn.get_tables(None).await.unwrap(),
        vec!["admin", "admin_props", "domain"]
    );
    assert_eq!(
        conn.get_tables(Some("admin%")).await.unwrap(),
        vec!["admin", "admin_props"]
    );
    assert!(conn.get_tables(Some("nothing%")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_init_commands_and_server_version() {
    let params = ConnectParams::sqlite_memory().with_options(DriverOptions {
        init_commands: vec![
            "CREATE TABLE config (name TEXT, value TEXT)".to_string(),
            "INSERT INTO config VALUES ('PANEL_VERSION', '1.0')".to_string(),
        ],
        ..DriverOptions::default()
    });
    let mut conn = Connection::open("init", &params).await.unwrap();

    assert!(conn.server_version().is_some_and(|v| v.starts_with('3')));
    let mut result = conn
        .execute("SELECT value FROM config WHERE name = 'PANEL_VERSION'", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.fetch_column(0), Some(json!("1.0")));
}

#[tokio::test]
async fn test_failing_init_command_fails_connect() {
    let params = ConnectParams::sqlite_memory().with_options(DriverOptions {
        init_commands: vec!["SET NAMES utf8".to_string()],
        ..DriverOptions::default()
    });
    let err = Connection::open("init", &params).await.unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }));
    assert!(err.to_string().contains("Init command failed"));
}
