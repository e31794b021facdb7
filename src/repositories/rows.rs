//! Row types shared by the repositories, adapters, and kernels.

use serde::Deserialize;

/// Count per calendar year.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct YearCount {
    pub year: i32,
    pub count: i64,
}

/// Count per country code.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CountryCount {
    pub country: String,
    pub count: i64,
}

/// Count per actor name.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct NamedCount {
    pub name: String,
    pub count: i64,
}

/// Actor activity within one year.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct YearNamedCount {
    pub year: i32,
    pub name: String,
    pub count: i64,
}

/// Organization with the flags the competitive panel surfaces.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrganizationRow {
    pub name: String,
    pub country: String,
    pub sme: i64,
    pub coordinator: i64,
    pub count: i64,
}

/// Funding aggregated over one year.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FundingYearRow {
    pub year: i32,
    pub funding: f64,
    pub count: i64,
}

/// Funding aggregated per framework programme.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProgrammeFundingRow {
    pub programme: String,
    pub funding: f64,
    pub count: i64,
}

/// Funding per year and framework programme.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct YearProgrammeFundingRow {
    pub year: i32,
    pub programme: String,
    pub funding: f64,
    pub count: i64,
}

/// Funding-scheme activity in one year.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InstrumentRow {
    pub scheme: String,
    pub year: i32,
    pub count: i64,
    pub funding: f64,
}

/// Denormalized CPC string of one patent plus its publication year.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CpcCodesRow {
    pub cpc_codes: String,
    pub year: i32,
}

/// Co-activity of two actors.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CoCountRow {
    pub actor_a: String,
    pub actor_b: String,
    pub co_count: i64,
}

/// Organization count per city.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CityCountRow {
    pub city: String,
    pub country: String,
    pub count: i64,
}

/// Country pair collaborating in shared projects.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CountryPairRow {
    pub country_a: String,
    pub country_b: String,
    pub count: i64,
}

/// Cross-border participation probe result.
#[derive(Debug, Clone, Default)]
pub struct CrossBorderStats {
    pub total_projects: i64,
    pub cross_border_projects: i64,
    pub cross_border_share: f64,
}

// --- Paper-search API payloads ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperAuthor {
    #[serde(default)]
    pub name: String,
}

/// One paper as returned by the paper-search API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    #[serde(default)]
    pub title: String,
    pub year: Option<i32>,
    pub citation_count: Option<i64>,
    pub influential_citation_count: Option<i64>,
    pub venue: Option<String>,
    #[serde(default)]
    pub authors: Vec<PaperAuthor>,
    pub fields_of_study: Option<Vec<String>>,
    pub publication_types: Option<Vec<String>>,
    pub reference_count: Option<i64>,
}
