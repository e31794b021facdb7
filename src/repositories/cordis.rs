//! Repository over the local CORDIS project store (cordis.db).
//!
//! Covers FP7, H2020, and Horizon Europe projects plus their participating
//! organizations. Read-only; one query per method.

use sqlx::SqlitePool;

use super::rows::{
    CityCountRow, CoCountRow, CountryCount, CountryPairRow, CrossBorderStats, FundingYearRow,
    InstrumentRow, NamedCount, OrganizationRow, ProgrammeFundingRow, YearCount, YearNamedCount,
    YearProgrammeFundingRow,
};
use super::sanitize_fts_query;
use crate::analytics::metrics::last_full_year_from_date;
use crate::utils::ApiResult;

/// Minimum number of distinct participating countries for a project to count
/// as cross-border.
pub const CROSS_BORDER_MIN_COUNTRIES: i64 = 3;

#[derive(Clone)]
pub struct CordisRepository {
    pool: SqlitePool,
}

impl CordisRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn date_filters(
        sql: &mut String,
        params: &mut Vec<String>,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) {
        if let Some(year) = start_year {
            sql.push_str(" AND p.start_date >= ?");
            params.push(format!("{}-01-01", year));
        }
        if let Some(year) = end_year {
            sql.push_str(" AND p.start_date <= ?");
            params.push(format!("{}-12-31", year));
        }
    }

    /// Project count per start year.
    pub async fn count_by_year(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<YearCount>> {
        let mut sql = String::from(
            "SELECT CAST(SUBSTR(p.start_date, 1, 4) AS INTEGER) AS year, COUNT(*) AS count \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             WHERE projects_fts MATCH ? \
               AND p.start_date IS NOT NULL \
               AND LENGTH(p.start_date) >= 4",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY year ORDER BY year");

        let mut query_builder =
            sqlx::query_as::<_, YearCount>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// Project count per participating-organization country.
    pub async fn count_by_country(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<CountryCount>> {
        let mut sql = String::from(
            "SELECT o.country, COUNT(DISTINCT o.project_id) AS count \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             JOIN organizations o ON o.project_id = p.id \
             WHERE projects_fts MATCH ? \
               AND o.country IS NOT NULL AND o.country != ''",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY o.country ORDER BY count DESC LIMIT 20");

        let mut query_builder =
            sqlx::query_as::<_, CountryCount>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// Top organizations by distinct project count.
    pub async fn top_organizations(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        limit: i64,
    ) -> ApiResult<Vec<NamedCount>> {
        let mut sql = String::from(
            "SELECT o.name, COUNT(DISTINCT o.project_id) AS count \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             JOIN organizations o ON o.project_id = p.id \
             WHERE projects_fts MATCH ? \
               AND o.name IS NOT NULL",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY o.name ORDER BY count DESC LIMIT ?");

        let mut query_builder =
            sqlx::query_as::<_, NamedCount>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.bind(limit).fetch_all(&self.pool).await?)
    }

    /// Top organizations with country, SME and coordinator flags.
    pub async fn top_organizations_detailed(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        limit: i64,
    ) -> ApiResult<Vec<OrganizationRow>> {
        let mut sql = String::from(
            "SELECT o.name, \
                    COALESCE(MAX(o.country), '') AS country, \
                    MAX(CASE WHEN CAST(o.sme AS TEXT) IN ('1', 'true', 'True', 'TRUE') \
                        THEN 1 ELSE 0 END) AS sme, \
                    MAX(CASE WHEN LOWER(COALESCE(o.role, '')) = 'coordinator' \
                        THEN 1 ELSE 0 END) AS coordinator, \
                    COUNT(DISTINCT o.project_id) AS count \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             JOIN organizations o ON o.project_id = p.id \
             WHERE projects_fts MATCH ? \
               AND o.name IS NOT NULL",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY o.name ORDER BY count DESC LIMIT ?");

        let mut query_builder =
            sqlx::query_as::<_, OrganizationRow>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.bind(limit).fetch_all(&self.pool).await?)
    }

    /// Organization activity per start year.
    pub async fn orgs_by_year(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<YearNamedCount>> {
        let mut sql = String::from(
            "SELECT CAST(SUBSTR(p.start_date, 1, 4) AS INTEGER) AS year, \
                    o.name, COUNT(DISTINCT o.project_id) AS count \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             JOIN organizations o ON o.project_id = p.id \
             WHERE projects_fts MATCH ? \
               AND o.name IS NOT NULL \
               AND p.start_date IS NOT NULL \
               AND LENGTH(p.start_date) >= 4",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY year, o.name ORDER BY year, count DESC");

        let mut query_builder =
            sqlx::query_as::<_, YearNamedCount>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// Organization count per city.
    pub async fn orgs_by_city(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        limit: i64,
    ) -> ApiResult<Vec<CityCountRow>> {
        let mut sql = String::from(
            "SELECT o.city, COALESCE(MAX(o.country), '') AS country, \
                    COUNT(DISTINCT o.project_id) AS count \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             JOIN organizations o ON o.project_id = p.id \
             WHERE projects_fts MATCH ? \
               AND o.city IS NOT NULL AND o.city != ''",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY o.city ORDER BY count DESC LIMIT ?");

        let mut query_builder =
            sqlx::query_as::<_, CityCountRow>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.bind(limit).fetch_all(&self.pool).await?)
    }

    /// EU funding per start year.
    pub async fn funding_by_year(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<FundingYearRow>> {
        let mut sql = String::from(
            "SELECT CAST(SUBSTR(p.start_date, 1, 4) AS INTEGER) AS year, \
                    COALESCE(SUM(p.ec_max_contribution), 0.0) AS funding, \
                    COUNT(*) AS count \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             WHERE projects_fts MATCH ? \
               AND p.start_date IS NOT NULL \
               AND LENGTH(p.start_date) >= 4 \
               AND p.ec_max_contribution IS NOT NULL",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY year ORDER BY year");

        let mut query_builder =
            sqlx::query_as::<_, FundingYearRow>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// EU funding per framework programme.
    pub async fn funding_by_programme(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<ProgrammeFundingRow>> {
        let mut sql = String::from(
            "SELECT COALESCE(p.framework, 'UNKNOWN') AS programme, \
                    COALESCE(SUM(p.ec_max_contribution), 0.0) AS funding, \
                    COUNT(*) AS count \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             WHERE projects_fts MATCH ? \
               AND p.ec_max_contribution IS NOT NULL",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY programme ORDER BY funding DESC");

        let mut query_builder =
            sqlx::query_as::<_, ProgrammeFundingRow>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// EU funding per year and programme, for stacked charts.
    pub async fn funding_by_year_and_programme(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<YearProgrammeFundingRow>> {
        let mut sql = String::from(
            "SELECT CAST(SUBSTR(p.start_date, 1, 4) AS INTEGER) AS year, \
                    COALESCE(p.framework, 'UNKNOWN') AS programme, \
                    COALESCE(SUM(p.ec_max_contribution), 0.0) AS funding, \
                    COUNT(*) AS count \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             WHERE projects_fts MATCH ? \
               AND p.start_date IS NOT NULL \
               AND LENGTH(p.start_date) >= 4 \
               AND p.ec_max_contribution IS NOT NULL",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY year, programme ORDER BY year, programme");

        let mut query_builder =
            sqlx::query_as::<_, YearProgrammeFundingRow>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// Funding-instrument breakdown (RIA, IA, CSA, ...) per year.
    pub async fn funding_by_instrument(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<InstrumentRow>> {
        let mut sql = String::from(
            "SELECT COALESCE(p.funding_scheme, 'UNKNOWN') AS scheme, \
                    CAST(SUBSTR(p.start_date, 1, 4) AS INTEGER) AS year, \
                    COUNT(*) AS count, \
                    COALESCE(SUM(p.ec_max_contribution), 0.0) AS funding \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             WHERE projects_fts MATCH ? \
               AND p.start_date IS NOT NULL \
               AND LENGTH(p.start_date) >= 4",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY scheme, year ORDER BY year, scheme");

        let mut query_builder =
            sqlx::query_as::<_, InstrumentRow>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// Co-participation pairs: two organizations in the same project.
    pub async fn co_participation(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        limit: i64,
    ) -> ApiResult<Vec<CoCountRow>> {
        let mut sql = String::from(
            "SELECT o1.name AS actor_a, o2.name AS actor_b, \
                    COUNT(DISTINCT o1.project_id) AS co_count \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             JOIN organizations o1 ON o1.project_id = p.id \
             JOIN organizations o2 ON o2.project_id = o1.project_id \
                                  AND o2.id > o1.id \
             WHERE projects_fts MATCH ? \
               AND o1.name IS NOT NULL AND o2.name IS NOT NULL",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY o1.name, o2.name ORDER BY co_count DESC LIMIT ?");

        let mut query_builder =
            sqlx::query_as::<_, CoCountRow>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.bind(limit).fetch_all(&self.pool).await?)
    }

    /// Country collaboration pairs across shared projects.
    ///
    /// The lexicographic `country_b > country_a` join keeps every unordered
    /// pair exactly once.
    pub async fn country_collaboration_pairs(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        limit: i64,
    ) -> ApiResult<Vec<CountryPairRow>> {
        let mut sql = String::from(
            "SELECT o1.country AS country_a, o2.country AS country_b, \
                    COUNT(DISTINCT o1.project_id) AS count \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             JOIN organizations o1 ON o1.project_id = p.id \
             JOIN organizations o2 ON o2.project_id = o1.project_id \
                                  AND o2.country > o1.country \
             WHERE projects_fts MATCH ? \
               AND o1.country IS NOT NULL AND o1.country != '' \
               AND o2.country IS NOT NULL AND o2.country != ''",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, start_year, end_year);
        sql.push_str(" GROUP BY o1.country, o2.country ORDER BY count DESC LIMIT ?");

        let mut query_builder =
            sqlx::query_as::<_, CountryPairRow>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.bind(limit).fetch_all(&self.pool).await?)
    }

    /// Share of projects with participants from at least `min_countries`
    /// distinct countries.
    pub async fn cross_border_projects(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        min_countries: i64,
    ) -> ApiResult<CrossBorderStats> {
        let mut total_sql = String::from(
            "SELECT COUNT(DISTINCT p.id) \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             WHERE projects_fts MATCH ?",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut total_sql, &mut params, start_year, end_year);

        let mut total_query =
            sqlx::query_scalar::<_, i64>(&total_sql).bind(sanitize_fts_query(query));
        for param in &params {
            total_query = total_query.bind(param.clone());
        }
        let total_projects = total_query.fetch_one(&self.pool).await?;

        let mut cross_sql = String::from(
            "SELECT COUNT(*) FROM ( \
                 SELECT p.id \
                 FROM projects_fts fts \
                 JOIN projects p ON p.id = fts.rowid \
                 JOIN organizations o ON o.project_id = p.id \
                 WHERE projects_fts MATCH ? \
                   AND o.country IS NOT NULL AND o.country != ''",
        );
        let mut cross_params = Vec::new();
        Self::date_filters(&mut cross_sql, &mut cross_params, start_year, end_year);
        cross_sql.push_str(
            " GROUP BY p.id HAVING COUNT(DISTINCT o.country) >= ?)",
        );

        let mut cross_query =
            sqlx::query_scalar::<_, i64>(&cross_sql).bind(sanitize_fts_query(query));
        for param in cross_params {
            cross_query = cross_query.bind(param);
        }
        let cross_border_projects = cross_query.bind(min_countries).fetch_one(&self.pool).await?;

        let share = if total_projects > 0 {
            cross_border_projects as f64 / total_projects as f64
        } else {
            0.0
        };

        Ok(CrossBorderStats {
            total_projects,
            cross_border_projects,
            cross_border_share: share,
        })
    }

    /// Project titles via FTS5 prefix search, for autocomplete.
    pub async fn suggest_titles(&self, prefix: &str, limit: i64) -> ApiResult<Vec<String>> {
        let titles: Vec<String> = sqlx::query_scalar(
            "SELECT p.title \
             FROM projects_fts fts \
             JOIN projects p ON p.id = fts.rowid \
             WHERE projects_fts MATCH ? \
               AND p.title IS NOT NULL \
             LIMIT ?",
        )
        .bind(super::fts_prefix_query(prefix))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(titles)
    }

    /// Last year with complete coverage, from the store's max start date.
    pub async fn last_full_year(&self) -> ApiResult<Option<i32>> {
        let max_date: Option<String> = sqlx::query_scalar(
            "SELECT MAX(start_date) FROM projects \
             WHERE start_date IS NOT NULL \
               AND LENGTH(start_date) >= 7",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(max_date.as_deref().and_then(last_full_year_from_date))
    }

    /// Total number of projects in the store.
    pub async fn total_count(&self) -> ApiResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.pool)
            .await?)
    }
}
