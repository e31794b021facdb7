//! Repository over the local patent store (patents.db).
//!
//! Every method issues exactly one logical query against a read-only pool.
//! The SQL-native Jaccard sequence is the one exception: it pins a single
//! connection so its temp table survives the whole statement sequence.

use sqlx::SqlitePool;

use super::rows::{CoCountRow, CountryCount, CpcCodesRow, NamedCount, YearCount, YearNamedCount};
use super::sanitize_fts_query;
use crate::analytics::metrics::last_full_year_from_date;
use crate::utils::ApiResult;

/// Raw aggregates of the SQL-native CPC co-classification path.
///
/// The engine turns these into the Jaccard matrix and year payload through
/// the co-classification kernels.
#[derive(Debug, Clone, Default)]
pub struct CpcSqlAggregates {
    /// All matching codes ranked by distinct-patent count, descending.
    pub ranked_codes: Vec<NamedCount>,
    /// Distinct patents carrying >= 2 subclass codes in the window.
    pub total_patents: i64,
    /// Co-occurrence counts for the top-N codes (code_a < code_b).
    pub pair_counts: Vec<CoCountRow>,
    /// Per-code, per-year distinct patent counts (all codes).
    pub cpc_year_counts: Vec<(String, i32, i64)>,
    /// Per-pair, per-year co-occurrence counts (top-N codes).
    pub pair_year_counts: Vec<(String, String, i32, i64)>,
}

#[derive(Clone)]
pub struct PatentRepository {
    pool: SqlitePool,
}

impl PatentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn date_filters(
        sql: &mut String,
        params: &mut Vec<String>,
        column: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) {
        if let Some(year) = start_year {
            sql.push_str(&format!(" AND {} >= ?", column));
            params.push(format!("{}-01-01", year));
        }
        if let Some(year) = end_year {
            sql.push_str(&format!(" AND {} <= ?", column));
            params.push(format!("{}-12-31", year));
        }
    }

    /// Patent count per publication year.
    pub async fn count_by_year(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<YearCount>> {
        let mut sql = String::from(
            "SELECT CAST(SUBSTR(p.publication_date, 1, 4) AS INTEGER) AS year, \
                    COUNT(*) AS count \
             FROM patents_fts fts \
             JOIN patents p ON p.id = fts.rowid \
             WHERE patents_fts MATCH ? \
               AND p.publication_date IS NOT NULL \
               AND LENGTH(p.publication_date) >= 4",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, "p.publication_date", start_year, end_year);
        sql.push_str(" GROUP BY year ORDER BY year");

        let mut query_builder =
            sqlx::query_as::<_, YearCount>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// Distinct patent families per publication year.
    ///
    /// Family deduplication (OECD 2009) avoids counting the same invention
    /// once per jurisdiction. Empty when the store carries no family ids.
    pub async fn count_families_by_year(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<YearCount>> {
        let mut sql = String::from(
            "SELECT CAST(SUBSTR(p.publication_date, 1, 4) AS INTEGER) AS year, \
                    COUNT(DISTINCT p.family_id) AS count \
             FROM patents_fts fts \
             JOIN patents p ON p.id = fts.rowid \
             WHERE patents_fts MATCH ? \
               AND p.publication_date IS NOT NULL \
               AND LENGTH(p.publication_date) >= 4 \
               AND p.family_id IS NOT NULL \
               AND p.family_id != ''",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, "p.publication_date", start_year, end_year);
        sql.push_str(" GROUP BY year ORDER BY year");

        let mut query_builder =
            sqlx::query_as::<_, YearCount>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// Patent count per filing country.
    pub async fn count_by_country(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<CountryCount>> {
        let mut sql = String::from(
            "SELECT p.country, COUNT(*) AS count \
             FROM patents_fts fts \
             JOIN patents p ON p.id = fts.rowid \
             WHERE patents_fts MATCH ? \
               AND p.country IS NOT NULL AND p.country != ''",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, "p.publication_date", start_year, end_year);
        sql.push_str(" GROUP BY p.country ORDER BY count DESC LIMIT 20");

        let mut query_builder =
            sqlx::query_as::<_, CountryCount>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// Patent count per applicant country, parsed from the denormalized
    /// comma-separated column. Each country is counted once per patent.
    pub async fn count_by_applicant_country(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<CountryCount>> {
        let mut sql = String::from(
            "SELECT p.applicant_countries \
             FROM patents_fts fts \
             JOIN patents p ON p.id = fts.rowid \
             WHERE patents_fts MATCH ? \
               AND p.applicant_countries IS NOT NULL \
               AND p.applicant_countries != ''",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, "p.publication_date", start_year, end_year);

        let mut query_builder =
            sqlx::query_scalar::<_, String>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        let rows = query_builder.fetch_all(&self.pool).await?;

        let mut counts: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
        for raw in rows {
            let countries: std::collections::BTreeSet<&str> = raw
                .split(',')
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect();
            for country in countries {
                *counts.entry(country.to_string()).or_default() += 1;
            }
        }

        let mut result: Vec<CountryCount> = counts
            .into_iter()
            .map(|(country, count)| CountryCount { country, count })
            .collect();
        result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.country.cmp(&b.country)));
        result.truncate(20);
        Ok(result)
    }

    async fn has_table(&self, name: &str) -> ApiResult<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Whether the normalized applicant link tables exist.
    pub async fn has_applicant_tables(&self) -> ApiResult<bool> {
        self.has_table("patent_applicants").await
    }

    /// Whether the subclass-level `patent_cpc` table exists.
    pub async fn has_cpc_table(&self) -> ApiResult<bool> {
        self.has_table("patent_cpc").await
    }

    /// Top applicants for a technology.
    ///
    /// Prefers the normalized applicant tables, which attribute
    /// multi-applicant patents correctly. The denormalized fallback groups
    /// on the raw applicant string; multi-applicant strings then count as
    /// one key, an accepted fidelity loss.
    pub async fn top_applicants(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        limit: i64,
    ) -> ApiResult<Vec<NamedCount>> {
        if self.has_applicant_tables().await? {
            self.top_applicants_normalized(query, start_year, end_year, limit).await
        } else {
            self.top_applicants_denormalized(query, start_year, end_year, limit).await
        }
    }

    async fn top_applicants_normalized(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        limit: i64,
    ) -> ApiResult<Vec<NamedCount>> {
        let mut sql = String::from(
            "SELECT a.normalized_name AS name, COUNT(DISTINCT pa.patent_id) AS count \
             FROM patents_fts fts \
             JOIN patent_applicants pa ON pa.patent_id = fts.rowid \
             JOIN applicants a ON a.id = pa.applicant_id \
             JOIN patents p ON p.id = fts.rowid \
             WHERE patents_fts MATCH ?",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, "p.publication_date", start_year, end_year);
        sql.push_str(" GROUP BY a.normalized_name ORDER BY count DESC LIMIT ?");

        let mut query_builder =
            sqlx::query_as::<_, NamedCount>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.bind(limit).fetch_all(&self.pool).await?)
    }

    async fn top_applicants_denormalized(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        limit: i64,
    ) -> ApiResult<Vec<NamedCount>> {
        let mut sql = String::from(
            "SELECT p.applicant_names AS name, COUNT(*) AS count \
             FROM patents_fts fts \
             JOIN patents p ON p.id = fts.rowid \
             WHERE patents_fts MATCH ? \
               AND p.applicant_names IS NOT NULL \
               AND p.applicant_names != ''",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, "p.publication_date", start_year, end_year);
        sql.push_str(" GROUP BY p.applicant_names ORDER BY count DESC LIMIT ?");

        let mut query_builder =
            sqlx::query_as::<_, NamedCount>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.bind(limit).fetch_all(&self.pool).await?)
    }

    /// Top applicants broken down by publication year.
    pub async fn top_applicants_by_year(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> ApiResult<Vec<YearNamedCount>> {
        let normalized = self.has_applicant_tables().await?;
        let mut sql = if normalized {
            String::from(
                "SELECT CAST(SUBSTR(p.publication_date, 1, 4) AS INTEGER) AS year, \
                        a.normalized_name AS name, \
                        COUNT(DISTINCT pa.patent_id) AS count \
                 FROM patents_fts fts \
                 JOIN patent_applicants pa ON pa.patent_id = fts.rowid \
                 JOIN applicants a ON a.id = pa.applicant_id \
                 JOIN patents p ON p.id = fts.rowid \
                 WHERE patents_fts MATCH ? \
                   AND p.publication_date IS NOT NULL \
                   AND LENGTH(p.publication_date) >= 4",
            )
        } else {
            String::from(
                "SELECT CAST(SUBSTR(p.publication_date, 1, 4) AS INTEGER) AS year, \
                        p.applicant_names AS name, \
                        COUNT(*) AS count \
                 FROM patents_fts fts \
                 JOIN patents p ON p.id = fts.rowid \
                 WHERE patents_fts MATCH ? \
                   AND p.applicant_names IS NOT NULL \
                   AND p.applicant_names != '' \
                   AND p.publication_date IS NOT NULL \
                   AND LENGTH(p.publication_date) >= 4",
            )
        };
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, "p.publication_date", start_year, end_year);
        sql.push_str(" GROUP BY year, name ORDER BY year, count DESC");

        let mut query_builder =
            sqlx::query_as::<_, YearNamedCount>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// Co-applicant pairs: two applicants on the same patent.
    ///
    /// Needs the normalized tables; returns empty otherwise so the network
    /// graph simply lacks patent edges.
    pub async fn co_applicants(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        limit: i64,
    ) -> ApiResult<Vec<CoCountRow>> {
        if !self.has_applicant_tables().await? {
            return Ok(Vec::new());
        }
        let mut sql = String::from(
            "SELECT a1.normalized_name AS actor_a, \
                    a2.normalized_name AS actor_b, \
                    COUNT(DISTINCT pa1.patent_id) AS co_count \
             FROM patents_fts fts \
             JOIN patent_applicants pa1 ON pa1.patent_id = fts.rowid \
             JOIN patent_applicants pa2 ON pa2.patent_id = pa1.patent_id \
                                       AND pa2.applicant_id > pa1.applicant_id \
             JOIN applicants a1 ON a1.id = pa1.applicant_id \
             JOIN applicants a2 ON a2.id = pa2.applicant_id \
             JOIN patents p ON p.id = fts.rowid \
             WHERE patents_fts MATCH ?",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, "p.publication_date", start_year, end_year);
        sql.push_str(
            " GROUP BY a1.normalized_name, a2.normalized_name \
              ORDER BY co_count DESC LIMIT ?",
        );

        let mut query_builder =
            sqlx::query_as::<_, CoCountRow>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.bind(limit).fetch_all(&self.pool).await?)
    }

    /// Denormalized CPC strings plus publication year, capped at `limit`.
    pub async fn cpc_codes_with_years(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        limit: i64,
    ) -> ApiResult<Vec<CpcCodesRow>> {
        let mut sql = String::from(
            "SELECT p.cpc_codes, CAST(SUBSTR(p.publication_date, 1, 4) AS INTEGER) AS year \
             FROM patents_fts fts \
             JOIN patents p ON p.id = fts.rowid \
             WHERE patents_fts MATCH ? \
               AND p.cpc_codes IS NOT NULL \
               AND p.cpc_codes != '' \
               AND p.publication_date IS NOT NULL \
               AND LENGTH(p.publication_date) >= 4",
        );
        let mut params = Vec::new();
        Self::date_filters(&mut sql, &mut params, "p.publication_date", start_year, end_year);
        sql.push_str(" LIMIT ?");

        let mut query_builder =
            sqlx::query_as::<_, CpcCodesRow>(&sql).bind(sanitize_fts_query(query));
        for param in params {
            query_builder = query_builder.bind(param);
        }
        Ok(query_builder.bind(limit).fetch_all(&self.pool).await?)
    }

    /// SQL-native CPC co-classification over the `patent_cpc` table.
    ///
    /// Materialises the matching patent ids into a temp table, then runs the
    /// aggregate queries against it on the same connection. No sampling: the
    /// whole matching population is analysed.
    pub async fn compute_cpc_aggregates(
        &self,
        query: &str,
        start_year: Option<i32>,
        end_year: Option<i32>,
        top_n: usize,
    ) -> ApiResult<CpcSqlAggregates> {
        let mut conn = self.pool.acquire().await?;

        // A previous failed run may have left the temp table on this pooled
        // connection
        sqlx::query("DROP TABLE IF EXISTS radar_matches")
            .execute(&mut *conn)
            .await?;

        let mut create_sql = String::from(
            "CREATE TEMP TABLE radar_matches AS \
             SELECT p.id AS patent_id \
             FROM patents_fts fts \
             JOIN patents p ON p.id = fts.rowid \
             WHERE patents_fts MATCH ?",
        );
        let mut create_params = Vec::new();
        Self::date_filters(
            &mut create_sql,
            &mut create_params,
            "p.publication_date",
            start_year,
            end_year,
        );
        let mut create_query = sqlx::query(&create_sql).bind(sanitize_fts_query(query));
        for param in create_params {
            create_query = create_query.bind(param);
        }
        create_query.execute(&mut *conn).await?;

        let year_filter = " AND pc.pub_year >= ? AND pc.pub_year <= ?";
        let bind_years = |start: Option<i32>, end: Option<i32>| {
            (start.unwrap_or(0), end.unwrap_or(9999))
        };
        let (year_lo, year_hi) = bind_years(start_year, end_year);

        // Ranked code list (full, for the all-labels payload; top-N derived
        // by the caller)
        let ranked_sql = format!(
            "SELECT pc.cpc_code AS name, COUNT(DISTINCT pc.patent_id) AS count \
             FROM patent_cpc pc \
             JOIN radar_matches rm ON rm.patent_id = pc.patent_id \
             WHERE 1 = 1{} \
             GROUP BY pc.cpc_code \
             ORDER BY count DESC, pc.cpc_code ASC",
            year_filter
        );
        let ranked_codes: Vec<NamedCount> = sqlx::query_as(&ranked_sql)
            .bind(year_lo)
            .bind(year_hi)
            .fetch_all(&mut *conn)
            .await?;

        let total_sql = format!(
            "SELECT COUNT(DISTINCT pc.patent_id) \
             FROM patent_cpc pc \
             JOIN radar_matches rm ON rm.patent_id = pc.patent_id \
             WHERE 1 = 1{}",
            year_filter
        );
        let total_patents: i64 = sqlx::query_scalar(&total_sql)
            .bind(year_lo)
            .bind(year_hi)
            .fetch_one(&mut *conn)
            .await?;

        let top_codes: Vec<String> =
            ranked_codes.iter().take(top_n).map(|c| c.name.clone()).collect();

        let mut pair_counts: Vec<CoCountRow> = Vec::new();
        let mut pair_year_counts: Vec<(String, String, i32, i64)> = Vec::new();
        if top_codes.len() >= 2 {
            let placeholders =
                std::iter::repeat("?").take(top_codes.len()).collect::<Vec<_>>().join(", ");

            let pairs_sql = format!(
                "SELECT a.cpc_code AS actor_a, b.cpc_code AS actor_b, \
                        COUNT(DISTINCT a.patent_id) AS co_count \
                 FROM patent_cpc a \
                 JOIN patent_cpc b ON b.patent_id = a.patent_id \
                                  AND a.cpc_code < b.cpc_code \
                 JOIN radar_matches rm ON rm.patent_id = a.patent_id \
                 WHERE a.cpc_code IN ({ph}) AND b.cpc_code IN ({ph}) \
                   AND a.pub_year >= ? AND a.pub_year <= ? \
                 GROUP BY a.cpc_code, b.cpc_code",
                ph = placeholders
            );
            let mut pairs_query = sqlx::query_as::<_, CoCountRow>(&pairs_sql);
            for code in &top_codes {
                pairs_query = pairs_query.bind(code);
            }
            for code in &top_codes {
                pairs_query = pairs_query.bind(code);
            }
            pair_counts = pairs_query
                .bind(year_lo)
                .bind(year_hi)
                .fetch_all(&mut *conn)
                .await?;

            let pair_years_sql = format!(
                "SELECT a.cpc_code, b.cpc_code, a.pub_year, \
                        COUNT(DISTINCT a.patent_id) \
                 FROM patent_cpc a \
                 JOIN patent_cpc b ON b.patent_id = a.patent_id \
                                  AND a.cpc_code < b.cpc_code \
                 JOIN radar_matches rm ON rm.patent_id = a.patent_id \
                 WHERE a.cpc_code IN ({ph}) AND b.cpc_code IN ({ph}) \
                   AND a.pub_year >= ? AND a.pub_year <= ? \
                 GROUP BY a.cpc_code, b.cpc_code, a.pub_year",
                ph = placeholders
            );
            let mut pair_years_query =
                sqlx::query_as::<_, (String, String, i32, i64)>(&pair_years_sql);
            for code in &top_codes {
                pair_years_query = pair_years_query.bind(code);
            }
            for code in &top_codes {
                pair_years_query = pair_years_query.bind(code);
            }
            pair_year_counts = pair_years_query
                .bind(year_lo)
                .bind(year_hi)
                .fetch_all(&mut *conn)
                .await?;
        }

        let cpc_years_sql = format!(
            "SELECT pc.cpc_code, pc.pub_year, COUNT(DISTINCT pc.patent_id) \
             FROM patent_cpc pc \
             JOIN radar_matches rm ON rm.patent_id = pc.patent_id \
             WHERE 1 = 1{} \
             GROUP BY pc.cpc_code, pc.pub_year",
            year_filter
        );
        let cpc_year_counts: Vec<(String, i32, i64)> = sqlx::query_as(&cpc_years_sql)
            .bind(year_lo)
            .bind(year_hi)
            .fetch_all(&mut *conn)
            .await?;

        sqlx::query("DROP TABLE radar_matches").execute(&mut *conn).await?;

        Ok(CpcSqlAggregates {
            ranked_codes,
            total_patents,
            pair_counts,
            cpc_year_counts,
            pair_year_counts,
        })
    }

    /// Patent titles via FTS5 prefix search, for autocomplete.
    pub async fn suggest_titles(&self, prefix: &str, limit: i64) -> ApiResult<Vec<String>> {
        let titles: Vec<String> = sqlx::query_scalar(
            "SELECT p.title \
             FROM patents_fts fts \
             JOIN patents p ON p.id = fts.rowid \
             WHERE patents_fts MATCH ? \
               AND p.title IS NOT NULL \
             LIMIT ?",
        )
        .bind(super::fts_prefix_query(prefix))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(titles)
    }

    /// Last year with complete coverage, from the store's max publication
    /// date. None when the store has no dated rows.
    pub async fn last_full_year(&self) -> ApiResult<Option<i32>> {
        let max_date: Option<String> = sqlx::query_scalar(
            "SELECT MAX(publication_date) FROM patents \
             WHERE publication_date IS NOT NULL \
               AND LENGTH(publication_date) >= 7",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(max_date.as_deref().and_then(last_full_year_from_date))
    }

    /// Total number of patents in the store.
    pub async fn total_count(&self) -> ApiResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM patents")
            .fetch_one(&self.pool)
            .await?)
    }
}
