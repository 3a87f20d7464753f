//! Job definitions and the catalog of built-in daily jobs.
//!
//! Every job has the same shape: a date-filtered source query, optional pseudonymization
//! of identifier columns, a declarative transform and a destination table whose partition
//! for the run date is replaced. Jobs only differ in the values below.

use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::hashing::PseudonymizeRule;
use crate::query::{QueryTemplate, TableRef};
use crate::transform::{TransformRule, TransformSpec};
use crate::warehouse::LoadOptions;

/// Format of the date text stored in the source reports.
const SOURCE_DATE_FORMAT: &str = "%d-%m-%Y";
/// Format the destination stores date text in.
const DESTINATION_DATE_FORMAT: &str = "%Y-%m-%d";

/// Prefix shared by every built-in destination table.
const DESTINATION_TABLE_PREFIX: &str = "b2c_shinobi_";

/// Names of the built-in jobs, in catalog order.
pub const BUILTIN_JOB_NAMES: [&str; 3] = [
    FIXA_VIVOTOTAL_VENDAS,
    FIXA_VIVOTOTAL_VENDAS_CRM,
    VIVO_FIBRA_VENDAS,
];

pub const FIXA_VIVOTOTAL_VENDAS: &str = "fixa_vivototal_vendas";
pub const FIXA_VIVOTOTAL_VENDAS_CRM: &str = "fixa_vivototal_vendas_crm";
pub const VIVO_FIBRA_VENDAS: &str = "vivo_fibra_vendas";

const FIXA_VIVOTOTAL_VENDAS_QUERY: &str = r#"
    with table as (
    select
        format_date('%Y-%m-%d', safe.parse_date('%d-%m-%Y', data_criacao)) as data_pedido_ajustada_formatada,
        format_date('%Y-%m-%d', safe.parse_date('%d-%m-%Y', data_da_modificacao)) as data_da_modificacao_formatada,
        *
    from `shinobi-vivo.vivo_total.relatorio_vivo_total_vendas`
    )
    select * from table
    where data_pedido_ajustada_formatada = {date}
"#;

const FIXA_VIVOTOTAL_VENDAS_CRM_QUERY: &str = r#"
    with table as (
    select
        safe.parse_date('%d-%m-%Y', data_criacao) as data_pedido_ajustada_formatada,
        format_date('%Y-%m-%d', parse_date('%d-%m-%Y', data_da_modificacao)) as data_da_modificacao_formatada,
        *
    from `shinobi-vivo.vivo_total.relatorio_vivo_total_vendas_crm`
    )
    select * from table
    where data_pedido_ajustada_formatada = {date}
"#;

const VIVO_FIBRA_VENDAS_QUERY: &str = r#"
    with table as (
    select
        format_date('%Y-%m-%d', safe.parse_date('%d-%m-%Y', data_criacao)) as Data_Pedido,
        format_date('%Y-%m-%d', safe.parse_date('%d-%m-%Y', data_modificacao)) as data_modificacao_formatada,
        *
    from `shinobi-vivo.vivo_fibra.relatorio_vivo_fibra_crm`
    )
    select * from table
    where Data_Pedido = {date}
"#;

/// Everything needed to run one extract-transform-delete-reload cycle.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub source_query: QueryTemplate,
    pub pseudonymize: Vec<PseudonymizeRule>,
    pub transform: TransformSpec,
    pub destination_table: String,
    /// Destination column holding the partition date, compared against the run date when
    /// deleting.
    pub partition_column: String,
    pub load_options: LoadOptions,
}

impl JobSpec {
    /// Returns the built-in job called `name`.
    pub fn builtin(name: &str) -> EtlResult<JobSpec> {
        match name {
            FIXA_VIVOTOTAL_VENDAS => fixa_vivototal_vendas(),
            FIXA_VIVOTOTAL_VENDAS_CRM => fixa_vivototal_vendas_crm(),
            VIVO_FIBRA_VENDAS => vivo_fibra_vendas(),
            _ => bail!(
                ErrorKind::ConfigError,
                "Unknown job",
                format!(
                    "'{name}' is not one of: {}",
                    BUILTIN_JOB_NAMES.join(", ")
                )
            ),
        }
    }

    /// Returns every built-in job in catalog order.
    pub fn builtins() -> EtlResult<Vec<JobSpec>> {
        BUILTIN_JOB_NAMES
            .iter()
            .map(|name| JobSpec::builtin(name))
            .collect()
    }

    /// Returns the destination table reference within `project` and `dataset`.
    pub fn destination(&self, project: &str, dataset: &str) -> TableRef {
        TableRef::new(project, dataset, &self.destination_table)
    }
}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.name, self.destination_table)
    }
}

fn destination_table(name: &str) -> String {
    format!("{DESTINATION_TABLE_PREFIX}{name}")
}

fn postal_code_hash() -> Vec<PseudonymizeRule> {
    vec![PseudonymizeRule::new("codigo_postal", "codigo_postal_hash")]
}

fn fixa_vivototal_vendas() -> EtlResult<JobSpec> {
    Ok(JobSpec {
        name: FIXA_VIVOTOTAL_VENDAS.to_owned(),
        source_query: QueryTemplate::new(FIXA_VIVOTOTAL_VENDAS_QUERY)?,
        pseudonymize: postal_code_hash(),
        transform: TransformSpec::new(vec![
            TransformRule::parse_date("data_criacao", "data_pedido_ajustada", SOURCE_DATE_FORMAT),
            TransformRule::copy("codigo_postal_hash", "codigo_postal"),
            TransformRule::copy("hora_criacao", "hora_pedido"),
            TransformRule::reformat_date(
                "data_da_modificacao",
                "data_da_modificacao",
                SOURCE_DATE_FORMAT,
                DESTINATION_DATE_FORMAT,
            ),
            TransformRule::run_timestamp("created_at"),
            TransformRule::drop_columns(&["codigo_postal_hash", "data_criacao", "hora_criacao"]),
        ]),
        destination_table: destination_table(FIXA_VIVOTOTAL_VENDAS),
        partition_column: "data_pedido_ajustada_formatada".to_owned(),
        load_options: LoadOptions::infer(),
    })
}

fn fixa_vivototal_vendas_crm() -> EtlResult<JobSpec> {
    Ok(JobSpec {
        name: FIXA_VIVOTOTAL_VENDAS_CRM.to_owned(),
        source_query: QueryTemplate::new(FIXA_VIVOTOTAL_VENDAS_CRM_QUERY)?,
        pseudonymize: Vec::new(),
        transform: TransformSpec::new(vec![
            TransformRule::parse_date("data_criacao", "data_pedido_ajustada", SOURCE_DATE_FORMAT),
            TransformRule::copy("hora_criacao", "hora_pedido"),
            TransformRule::copy("data_da_modificacao_formatada", "data_da_modificacao"),
            TransformRule::run_timestamp("created_at"),
            TransformRule::hour_of_day("hora_da_modificacao", "hora_da_modificacao"),
            TransformRule::drop_columns(&["data_criacao", "hora_criacao"]),
        ]),
        destination_table: destination_table(FIXA_VIVOTOTAL_VENDAS_CRM),
        partition_column: "data_pedido_ajustada_formatada".to_owned(),
        load_options: LoadOptions::infer(),
    })
}

fn vivo_fibra_vendas() -> EtlResult<JobSpec> {
    Ok(JobSpec {
        name: VIVO_FIBRA_VENDAS.to_owned(),
        source_query: QueryTemplate::new(VIVO_FIBRA_VENDAS_QUERY)?,
        pseudonymize: postal_code_hash(),
        transform: TransformSpec::new(vec![
            TransformRule::parse_date("Data_Pedido", "data_criacao", DESTINATION_DATE_FORMAT),
            TransformRule::parse_date(
                "data_modificacao_formatada",
                "data_modificacao",
                DESTINATION_DATE_FORMAT,
            ),
            TransformRule::copy("codigo_postal_hash", "codigo_postal"),
            TransformRule::run_timestamp("created_at"),
            TransformRule::hour_of_day("hora_criacao", "hora_criacao"),
            TransformRule::hour_of_day("hora_modificacao", "hora_modificacao"),
            TransformRule::drop_columns(&["codigo_postal_hash", "data_modificacao_formatada"]),
        ]),
        destination_table: destination_table(VIVO_FIBRA_VENDAS),
        partition_column: "Data_Pedido".to_owned(),
        load_options: LoadOptions::infer(),
    })
}
