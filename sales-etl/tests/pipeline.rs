use chrono::{NaiveDate, NaiveTime};
use sales_etl::error::ErrorKind;
use sales_etl::hashing::{Pseudonymizer, pseudonymize};
use sales_etl::job::{FIXA_VIVOTOTAL_VENDAS, FIXA_VIVOTOTAL_VENDAS_CRM, JobSpec, VIVO_FIBRA_VENDAS};
use sales_etl::partition::{PartitionDate, RunContext};
use sales_etl::pipeline::Pipeline;
use sales_etl::types::{Cell, ColumnSchema, ColumnType, RowBatch, TableRow};
use sales_etl::warehouse::memory::MemoryWarehouse;
use secrecy::SecretString;

const PROJECT: &str = "telefonica-digitalsales";
const DATASET: &str = "coe_testes";

fn salt() -> SecretString {
    SecretString::from("test-salt".to_owned())
}

fn ctx(day: u32) -> RunContext {
    let date = PartitionDate::new(NaiveDate::from_ymd_opt(2024, 3, day).unwrap());
    RunContext::new(
        date,
        date.date()
            .and_time(NaiveTime::from_hms_opt(6, 15, 0).unwrap()),
    )
}

fn text(value: &str) -> Cell {
    Cell::String(value.to_owned())
}

fn string_columns(names: &[&str]) -> Vec<ColumnSchema> {
    names
        .iter()
        .map(|name| ColumnSchema::new(*name, ColumnType::String))
        .collect()
}

/// Source rows of the vivo total sales report as the extraction query returns them.
fn vivototal_source(day: u32, postal_codes: &[&str]) -> RowBatch {
    let columns = string_columns(&[
        "data_pedido_ajustada_formatada",
        "data_da_modificacao_formatada",
        "pedido",
        "data_criacao",
        "hora_criacao",
        "data_da_modificacao",
        "codigo_postal",
    ]);
    let rows = postal_codes
        .iter()
        .enumerate()
        .map(|(index, postal_code)| {
            TableRow::new(vec![
                text(&format!("2024-03-{day:02}")),
                text("2024-03-06"),
                text(&format!("P-{day}-{index}")),
                text(&format!("{day:02}-03-2024")),
                text("14:32:10"),
                text("06-03-2024"),
                text(postal_code),
            ])
        })
        .collect();

    RowBatch::new(columns, rows).unwrap()
}

fn pipeline(job: &str, warehouse: MemoryWarehouse) -> Pipeline<MemoryWarehouse> {
    Pipeline::new(
        JobSpec::builtin(job).unwrap(),
        warehouse,
        Pseudonymizer::new(salt()),
        PROJECT,
        DATASET,
    )
}

fn values(batch: &RowBatch, column: &str) -> Vec<Cell> {
    batch.column_values(column).unwrap().cloned().collect()
}

#[tokio::test]
async fn test_run_scopes_extraction_and_deletion_to_the_run_date() {
    let warehouse = MemoryWarehouse::new();
    let pipeline = pipeline(FIXA_VIVOTOTAL_VENDAS, warehouse.clone());

    // Day 4 is already loaded and must survive the day 5 run.
    warehouse
        .set_query_result(vivototal_source(4, &["01310-100"]))
        .await;
    pipeline.run(&ctx(4)).await.unwrap();

    warehouse
        .set_query_result(vivototal_source(5, &["04538-133", "20040-002"]))
        .await;
    let report = pipeline.run(&ctx(5)).await.unwrap();

    let queries = warehouse.queries().await;
    assert!(queries[1].contains("= '2024-03-05'"));
    assert!(!queries[1].contains("2024-03-04"));

    let deletes = warehouse.deletes().await;
    assert_eq!(deletes[1].date.to_string(), "2024-03-05");
    assert_eq!(deletes[1].column, "data_pedido_ajustada_formatada");
    assert_eq!(deletes[1].deleted_rows, 0);

    let stored = warehouse.table(pipeline.destination()).await.unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(
        values(&stored, "data_pedido_ajustada_formatada"),
        vec![text("2024-03-04"), text("2024-03-05"), text("2024-03-05")]
    );

    assert_eq!(report.extracted_rows, 2);
    assert_eq!(report.loaded_rows, 2);
    assert_eq!(
        report.destination.to_string(),
        "telefonica-digitalsales.coe_testes.b2c_shinobi_fixa_vivototal_vendas"
    );
}

#[tokio::test]
async fn test_rerunning_the_same_day_is_idempotent() {
    let warehouse = MemoryWarehouse::new();
    let pipeline = pipeline(FIXA_VIVOTOTAL_VENDAS, warehouse.clone());
    warehouse
        .set_query_result(vivototal_source(5, &["04538-133", "20040-002"]))
        .await;

    let first = pipeline.run(&ctx(5)).await.unwrap();
    let after_one_run = warehouse.table(pipeline.destination()).await.unwrap();

    let second = pipeline.run(&ctx(5)).await.unwrap();
    let after_two_runs = warehouse.table(pipeline.destination()).await.unwrap();

    assert_eq!(first.deleted_rows, 0);
    assert_eq!(second.deleted_rows, 2);
    assert_eq!(after_one_run, after_two_runs);
    assert_eq!(after_two_runs.len(), 2);
}

#[tokio::test]
async fn test_zero_rows_still_clears_the_partition() {
    let warehouse = MemoryWarehouse::new();
    let pipeline = pipeline(FIXA_VIVOTOTAL_VENDAS, warehouse.clone());

    warehouse
        .set_query_result(vivototal_source(5, &["04538-133"]))
        .await;
    pipeline.run(&ctx(5)).await.unwrap();

    warehouse.set_query_result(vivototal_source(5, &[])).await;
    let report = pipeline.run(&ctx(5)).await.unwrap();

    assert_eq!(report.extracted_rows, 0);
    assert_eq!(report.deleted_rows, 1);
    assert_eq!(report.loaded_rows, 0);
    assert_eq!(warehouse.deletes().await.len(), 2);
    assert!(warehouse.table(pipeline.destination()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_source_column_aborts_before_any_write() {
    let warehouse = MemoryWarehouse::new();
    let pipeline = pipeline(FIXA_VIVOTOTAL_VENDAS, warehouse.clone());

    let mut source = vivototal_source(5, &["04538-133"]);
    source.drop_columns(&["hora_criacao"]).unwrap();
    warehouse.set_query_result(source).await;

    let err = pipeline.run(&ctx(5)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingColumn);
    assert!(warehouse.deletes().await.is_empty());
    assert!(warehouse.table(pipeline.destination()).await.is_none());
}

#[tokio::test]
async fn test_postal_codes_are_stored_hashed() {
    let warehouse = MemoryWarehouse::new();
    let pipeline = pipeline(FIXA_VIVOTOTAL_VENDAS, warehouse.clone());
    warehouse
        .set_query_result(vivototal_source(5, &["04538-133"]))
        .await;

    pipeline.run(&ctx(5)).await.unwrap();

    let stored = warehouse.table(pipeline.destination()).await.unwrap();
    let postal_codes = values(&stored, "codigo_postal");
    assert_eq!(
        postal_codes,
        vec![text(&pseudonymize("04538-133", &salt()))]
    );
    assert_ne!(postal_codes[0], text("04538-133"));
    assert!(stored.find_column("codigo_postal_hash").is_none());
}

#[tokio::test]
async fn test_vivototal_transform_output() {
    let job = JobSpec::builtin(FIXA_VIVOTOTAL_VENDAS).unwrap();
    let source = RowBatch::new(
        string_columns(&[
            "data_criacao",
            "hora_criacao",
            "codigo_postal_hash",
            "data_da_modificacao",
        ]),
        vec![TableRow::new(vec![
            text("05-03-2024"),
            text("14:32:10"),
            text("abc123"),
            text("06-03-2024"),
        ])],
    )
    .unwrap();

    let out = job.transform.apply(source, &ctx(5)).unwrap();

    for dropped in ["codigo_postal_hash", "data_criacao", "hora_criacao"] {
        assert!(out.find_column(dropped).is_none(), "{dropped} still present");
    }
    assert_eq!(out.column("data_pedido_ajustada").unwrap().typ, ColumnType::Date);
    assert_eq!(
        values(&out, "data_pedido_ajustada"),
        vec![Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())]
    );
    assert_eq!(values(&out, "codigo_postal"), vec![text("abc123")]);
    assert_eq!(values(&out, "hora_pedido"), vec![text("14:32:10")]);
    assert_eq!(values(&out, "data_da_modificacao"), vec![text("2024-03-06")]);
    assert_eq!(
        values(&out, "created_at"),
        vec![Cell::DateTime(ctx(5).started_at())]
    );
}

#[tokio::test]
async fn test_crm_transform_truncates_modification_hour() {
    let job = JobSpec::builtin(FIXA_VIVOTOTAL_VENDAS_CRM).unwrap();
    let mut source = RowBatch::new(
        string_columns(&[
            "data_da_modificacao_formatada",
            "data_criacao",
            "hora_criacao",
            "hora_da_modificacao",
        ]),
        vec![TableRow::new(vec![
            text("2024-03-06"),
            text("05-03-2024"),
            text("14:32:10"),
            text("09:01:59"),
        ])],
    )
    .unwrap();
    source
        .upsert_column(
            ColumnSchema::new("data_pedido_ajustada_formatada", ColumnType::Date),
            vec![Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())],
        )
        .unwrap();

    let out = job.transform.apply(source, &ctx(5)).unwrap();

    assert_eq!(values(&out, "hora_pedido"), vec![text("14:32:10")]);
    assert_eq!(values(&out, "hora_da_modificacao"), vec![text("09")]);
    assert_eq!(values(&out, "data_da_modificacao"), vec![text("2024-03-06")]);
    assert!(out.find_column("hora_criacao").is_none());
    assert!(out.find_column("data_criacao").is_none());
}

#[tokio::test]
async fn test_fibra_run_loads_dates_and_hours() {
    let warehouse = MemoryWarehouse::new();
    let pipeline = pipeline(VIVO_FIBRA_VENDAS, warehouse.clone());
    let source = RowBatch::new(
        string_columns(&[
            "Data_Pedido",
            "data_modificacao_formatada",
            "data_criacao",
            "hora_criacao",
            "data_modificacao",
            "hora_modificacao",
            "codigo_postal",
        ]),
        vec![TableRow::new(vec![
            text("2024-03-05"),
            text("2024-03-07"),
            text("05-03-2024"),
            text("08:10:00"),
            text("07-03-2024"),
            text("23:59:59"),
            Cell::Null,
        ])],
    )
    .unwrap();
    warehouse.set_query_result(source).await;

    pipeline.run(&ctx(5)).await.unwrap();

    let stored = warehouse.table(pipeline.destination()).await.unwrap();
    assert_eq!(
        values(&stored, "data_criacao"),
        vec![Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())]
    );
    assert_eq!(
        values(&stored, "data_modificacao"),
        vec![Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap())]
    );
    assert_eq!(values(&stored, "hora_criacao"), vec![text("08")]);
    assert_eq!(values(&stored, "hora_modificacao"), vec![text("23")]);
    assert_eq!(values(&stored, "codigo_postal"), vec![Cell::Null]);
    assert!(stored.find_column("data_modificacao_formatada").is_none());

    let deletes = warehouse.deletes().await;
    assert_eq!(deletes[0].column, "Data_Pedido");
}
