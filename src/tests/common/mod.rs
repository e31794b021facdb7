// Common test fixtures: temp SQLite stores with FTS5 indexes seeded with a
// small quantum-computing corpus.

use chrono::Datelike;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tempfile::TempDir;

use crate::adapters::{OpenAireClient, SemanticScholarClient};
use crate::analytics::normalize_applicant_name;
use crate::config::Config;
use crate::repositories::{CordisRepository, PatentRepository};
use crate::services::DataContext;

/// Reference year for fixture dates; seeds are laid out relative to the
/// current year so the window logic behaves as in production.
pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}

async fn create_writable_pool(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
        .expect("valid sqlite path")
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await
        .expect("Failed to create fixture database")
}

struct PatentSeed {
    publication_number: &'static str,
    country: &'static str,
    title: &'static str,
    /// (year offset from current year, "MM-DD")
    date: (i32, &'static str),
    family_id: &'static str,
    applicant_raw: &'static str,
    applicant_normalized: &'static str,
    applicant_country: &'static str,
    cpc_codes: &'static str,
}

const PATENT_SEEDS: &[PatentSeed] = &[
    PatentSeed {
        publication_number: "EP3890001A1",
        country: "DE",
        title: "Quantum computing processor with superconducting qubits",
        date: (-5, "03-10"),
        family_id: "F1001",
        applicant_raw: "Quantum Devices Co. Ltd.",
        applicant_normalized: "QUANTUM DEVICES",
        applicant_country: "DE",
        cpc_codes: "G06N10/00,H01L29/66",
    },
    PatentSeed {
        publication_number: "EP3890002A1",
        country: "DE",
        title: "Quantum computing error correction method",
        date: (-4, "05-12"),
        family_id: "F1002",
        applicant_raw: "Quantum Devices Co. Ltd.",
        applicant_normalized: "QUANTUM DEVICES",
        applicant_country: "DE",
        cpc_codes: "G06N10/00,G06F11/10",
    },
    PatentSeed {
        publication_number: "EP3890003A1",
        country: "US",
        title: "Quantum computing qubit control apparatus",
        date: (-4, "07-01"),
        family_id: "F1003",
        applicant_raw: "Quantum Devices Co. Ltd.",
        applicant_normalized: "QUANTUM DEVICES",
        applicant_country: "DE",
        cpc_codes: "G06N10/00,H01L39/02",
    },
    PatentSeed {
        publication_number: "EP3890004A1",
        country: "US",
        title: "Superconducting circuit for quantum computing",
        date: (-3, "02-20"),
        family_id: "F1004",
        applicant_raw: "Quantum Devices Co. Ltd.",
        applicant_normalized: "QUANTUM DEVICES",
        applicant_country: "DE",
        cpc_codes: "G06N10/00,H01P7/00",
    },
    PatentSeed {
        publication_number: "EP3890005A1",
        country: "FR",
        title: "Quantum computing readout with photonic links",
        date: (-3, "09-15"),
        family_id: "F1005",
        applicant_raw: "Photon Labs SA",
        applicant_normalized: "PHOTON LABS",
        applicant_country: "FR",
        cpc_codes: "G06N10/00,G02B6/12",
    },
    PatentSeed {
        publication_number: "EP3890006A1",
        country: "JP",
        title: "Quantum computing annealer architecture",
        date: (-1, "04-02"),
        family_id: "F1006",
        applicant_raw: "Photon Labs SA",
        applicant_normalized: "PHOTON LABS",
        applicant_country: "FR",
        cpc_codes: "G06N10/00,G06F17/10",
    },
    PatentSeed {
        publication_number: "EP3890007A1",
        country: "DE",
        title: "Control electronics for quantum computing",
        date: (-1, "06-21"),
        family_id: "F1007",
        applicant_raw: "Nordic Qubits AB",
        applicant_normalized: "NORDIC QUBITS",
        applicant_country: "SE",
        cpc_codes: "G06N10/00,H03K19/00",
    },
    PatentSeed {
        publication_number: "EP3890008A1",
        country: "DE",
        title: "Hybrid quantum computing interface",
        date: (-1, "12-05"),
        family_id: "F1008",
        applicant_raw: "Quantum Devices Co. Ltd.",
        applicant_normalized: "QUANTUM DEVICES",
        applicant_country: "DE",
        cpc_codes: "G06N10/00,H01L29/66",
    },
    // Unrelated control row; must never match the quantum queries
    PatentSeed {
        publication_number: "EP3890009A1",
        country: "DE",
        title: "Solar panel coating process",
        date: (-3, "01-01"),
        family_id: "F1009",
        applicant_raw: "Solar Coat GmbH",
        applicant_normalized: "SOLAR COAT",
        applicant_country: "DE",
        cpc_codes: "H02S40/00,C09D5/00",
    },
];

/// Patent dated in the current (incomplete) year, for year-pruning tests.
const PARTIAL_YEAR_SEED: PatentSeed = PatentSeed {
    publication_number: "EP3890010A1",
    country: "US",
    title: "Quantum computing memory cell",
    date: (0, "08-10"),
    family_id: "F1010",
    applicant_raw: "Quantum Devices Co. Ltd.",
    applicant_normalized: "QUANTUM DEVICES",
    applicant_country: "DE",
    cpc_codes: "G06N10/00,G11C11/44",
};

/// Build a patent store file.
///
/// `with_cpc_table` controls the normalized `patent_cpc` table (the
/// SQL-native Jaccard path). `with_partial_year` adds one patent dated in
/// the current year so the store's last fully covered year stays at the
/// previous year while extra data exists beyond it.
pub async fn create_patent_store(dir: &TempDir, with_cpc_table: bool, with_partial_year: bool) -> String {
    let path = dir.path().join("patents.db");
    let pool = create_writable_pool(&path).await;
    let year = current_year();

    sqlx::query(
        "CREATE TABLE patents ( \
             id INTEGER PRIMARY KEY, \
             publication_number TEXT UNIQUE NOT NULL, \
             country TEXT, \
             doc_number TEXT, \
             kind TEXT, \
             title TEXT, \
             publication_date TEXT, \
             family_id TEXT, \
             applicant_names TEXT, \
             applicant_countries TEXT, \
             cpc_codes TEXT, \
             ipc_codes TEXT \
         )",
    )
    .execute(&pool)
    .await
    .expect("create patents table");

    sqlx::query(
        "CREATE VIRTUAL TABLE patents_fts USING fts5( \
             title, cpc_codes, content='patents', content_rowid='id')",
    )
    .execute(&pool)
    .await
    .expect("create patents fts");

    sqlx::query(
        "CREATE TABLE applicants ( \
             id INTEGER PRIMARY KEY AUTOINCREMENT, \
             raw_name TEXT NOT NULL UNIQUE, \
             normalized_name TEXT NOT NULL \
         )",
    )
    .execute(&pool)
    .await
    .expect("create applicants table");

    sqlx::query(
        "CREATE TABLE patent_applicants ( \
             patent_id INTEGER NOT NULL, \
             applicant_id INTEGER NOT NULL, \
             PRIMARY KEY (patent_id, applicant_id) \
         )",
    )
    .execute(&pool)
    .await
    .expect("create patent_applicants table");

    if with_cpc_table {
        sqlx::query(
            "CREATE TABLE patent_cpc ( \
                 patent_id INTEGER NOT NULL, \
                 cpc_code TEXT NOT NULL, \
                 pub_year INTEGER NOT NULL, \
                 PRIMARY KEY (patent_id, cpc_code, pub_year) \
             )",
        )
        .execute(&pool)
        .await
        .expect("create patent_cpc table");
    }

    let mut seeds: Vec<&PatentSeed> = PATENT_SEEDS.iter().collect();
    if with_partial_year {
        seeds.push(&PARTIAL_YEAR_SEED);
    }

    for (idx, seed) in seeds.iter().enumerate() {
        let id = (idx + 1) as i64;
        let pub_year = year + seed.date.0;
        let date = format!("{}-{}", pub_year, seed.date.1);

        sqlx::query(
            "INSERT OR IGNORE INTO patents \
             (id, publication_number, country, doc_number, kind, title, publication_date, \
              family_id, applicant_names, applicant_countries, cpc_codes, ipc_codes) \
             VALUES (?, ?, ?, ?, 'A1', ?, ?, ?, ?, ?, ?, '')",
        )
        .bind(id)
        .bind(seed.publication_number)
        .bind(seed.country)
        .bind(format!("389000{}", id))
        .bind(seed.title)
        .bind(&date)
        .bind(seed.family_id)
        .bind(seed.applicant_raw)
        .bind(seed.applicant_country)
        .bind(seed.cpc_codes)
        .execute(&pool)
        .await
        .expect("insert patent");

        sqlx::query("INSERT INTO patents_fts (rowid, title, cpc_codes) VALUES (?, ?, ?)")
            .bind(id)
            .bind(seed.title)
            .bind(seed.cpc_codes)
            .execute(&pool)
            .await
            .expect("index patent");

        // Stored normalized names come from the same kernel the bulk
        // import uses
        let normalized = normalize_applicant_name(seed.applicant_raw);
        assert_eq!(normalized, seed.applicant_normalized);
        sqlx::query("INSERT OR IGNORE INTO applicants (raw_name, normalized_name) VALUES (?, ?)")
            .bind(seed.applicant_raw)
            .bind(&normalized)
            .execute(&pool)
            .await
            .expect("insert applicant");

        sqlx::query(
            "INSERT INTO patent_applicants (patent_id, applicant_id) \
             SELECT ?, id FROM applicants WHERE raw_name = ?",
        )
        .bind(id)
        .bind(seed.applicant_raw)
        .execute(&pool)
        .await
        .expect("link applicant");

        if with_cpc_table {
            for code in seed.cpc_codes.split(',') {
                let subclass: String = code.trim().chars().take(4).collect();
                sqlx::query(
                    "INSERT OR IGNORE INTO patent_cpc (patent_id, cpc_code, pub_year) \
                     VALUES (?, ?, ?)",
                )
                .bind(id)
                .bind(subclass)
                .bind(pub_year)
                .execute(&pool)
                .await
                .expect("insert patent cpc");
            }
        }
    }

    pool.close().await;
    path.display().to_string()
}

struct ProjectSeed {
    id: i64,
    framework: &'static str,
    title: &'static str,
    /// Year offset from current year; projects start on the given "MM-DD".
    date: (i32, &'static str),
    ec_max_contribution: f64,
    funding_scheme: &'static str,
    /// (name, country, city, role, sme)
    organizations: &'static [(&'static str, &'static str, &'static str, &'static str, &'static str)],
}

const PROJECT_SEEDS: &[ProjectSeed] = &[
    ProjectSeed {
        id: 101,
        framework: "H2020",
        title: "Quantum computing algorithms for materials discovery",
        date: (-4, "01-01"),
        ec_max_contribution: 1_000_000.0,
        funding_scheme: "RIA",
        organizations: &[
            ("Quantum Research Institute", "DE", "Berlin", "coordinator", "0"),
            ("Photon Labs SA", "FR", "Paris", "participant", "1"),
        ],
    },
    ProjectSeed {
        id: 102,
        framework: "H2020",
        title: "Scalable quantum computing hardware platform",
        date: (-3, "03-01"),
        ec_max_contribution: 2_000_000.0,
        funding_scheme: "RIA",
        organizations: &[
            ("Quantum Research Institute", "DE", "Berlin", "coordinator", "0"),
            ("Technical University Delft", "NL", "Delft", "participant", "0"),
            ("ETH Zurich", "CH", "Zurich", "participant", "0"),
        ],
    },
    ProjectSeed {
        id: 103,
        framework: "HORIZON",
        title: "Quantum computing software stack",
        date: (-2, "05-01"),
        ec_max_contribution: 1_500_000.0,
        funding_scheme: "IA",
        organizations: &[
            ("Quantum Research Institute", "DE", "Berlin", "coordinator", "0"),
            ("Photon Labs SA", "FR", "Paris", "participant", "1"),
        ],
    },
    ProjectSeed {
        id: 104,
        framework: "HORIZON",
        title: "Quantum computing outreach and training",
        date: (-1, "02-01"),
        ec_max_contribution: 500_000.0,
        funding_scheme: "CSA",
        organizations: &[("Nordic Qubits AB", "SE", "Stockholm", "coordinator", "1")],
    },
    // Unrelated control row
    ProjectSeed {
        id: 105,
        framework: "FP7",
        title: "Advanced solar coatings for facades",
        date: (-3, "06-01"),
        ec_max_contribution: 800_000.0,
        funding_scheme: "CP",
        organizations: &[("Solar Coat GmbH", "DE", "Munich", "coordinator", "1")],
    },
];

/// Build a CORDIS project store file with the quantum fixture.
pub async fn create_cordis_store(dir: &TempDir) -> String {
    let path = dir.path().join("cordis.db");
    let pool = create_writable_pool(&path).await;
    let year = current_year();

    sqlx::query(
        "CREATE TABLE projects ( \
             id INTEGER PRIMARY KEY, \
             framework TEXT, \
             acronym TEXT, \
             title TEXT, \
             objective TEXT, \
             keywords TEXT, \
             start_date TEXT, \
             end_date TEXT, \
             status TEXT, \
             total_cost REAL, \
             ec_max_contribution REAL, \
             funding_scheme TEXT, \
             topics TEXT, \
             legal_basis TEXT \
         )",
    )
    .execute(&pool)
    .await
    .expect("create projects table");

    sqlx::query(
        "CREATE VIRTUAL TABLE projects_fts USING fts5( \
             title, objective, keywords, content='projects', content_rowid='id')",
    )
    .execute(&pool)
    .await
    .expect("create projects fts");

    sqlx::query(
        "CREATE TABLE organizations ( \
             id INTEGER PRIMARY KEY AUTOINCREMENT, \
             project_id INTEGER NOT NULL, \
             name TEXT, \
             short_name TEXT, \
             country TEXT, \
             city TEXT, \
             role TEXT, \
             activity_type TEXT, \
             sme TEXT, \
             ec_contribution REAL, \
             total_cost REAL \
         )",
    )
    .execute(&pool)
    .await
    .expect("create organizations table");

    for seed in PROJECT_SEEDS {
        let start_year = year + seed.date.0;
        let start_date = format!("{}-{}", start_year, seed.date.1);
        let end_date = format!("{}-{}", start_year + 3, seed.date.1);

        sqlx::query(
            "INSERT INTO projects \
             (id, framework, acronym, title, objective, keywords, start_date, end_date, \
              status, total_cost, ec_max_contribution, funding_scheme, topics, legal_basis) \
             VALUES (?, ?, '', ?, '', '', ?, ?, 'SIGNED', ?, ?, ?, '', '')",
        )
        .bind(seed.id)
        .bind(seed.framework)
        .bind(seed.title)
        .bind(&start_date)
        .bind(&end_date)
        .bind(seed.ec_max_contribution * 1.2)
        .bind(seed.ec_max_contribution)
        .bind(seed.funding_scheme)
        .execute(&pool)
        .await
        .expect("insert project");

        sqlx::query("INSERT INTO projects_fts (rowid, title, objective, keywords) VALUES (?, ?, '', '')")
            .bind(seed.id)
            .bind(seed.title)
            .execute(&pool)
            .await
            .expect("index project");

        for (name, country, city, role, sme) in seed.organizations {
            sqlx::query(
                "INSERT INTO organizations \
                 (project_id, name, short_name, country, city, role, activity_type, sme, \
                  ec_contribution, total_cost) \
                 VALUES (?, ?, '', ?, ?, ?, 'REC', ?, 0, 0)",
            )
            .bind(seed.id)
            .bind(name)
            .bind(country)
            .bind(city)
            .bind(role)
            .bind(sme)
            .execute(&pool)
            .await
            .expect("insert organization");
        }
    }

    pool.close().await;
    path.display().to_string()
}

/// Config pointing at the fixture stores. The GLEIF cache path points into
/// a missing directory so the resolver stays disabled unless a test opts
/// in.
pub fn test_config(patents_db: &str, cordis_db: &str) -> Config {
    let mut config = Config::default();
    config.data.patents_db_path = patents_db.to_string();
    config.data.cordis_db_path = cordis_db.to_string();
    config.data.gleif_cache_db_path = "/nonexistent/ti-radar-test/gleif_cache.db".to_string();
    config
}

/// Open a read-only repository over a fixture patent store.
pub async fn open_patent_repo(path: &str) -> PatentRepository {
    let pool = crate::db::open_read_only(path).await.expect("open patent fixture");
    PatentRepository::new(pool)
}

/// Open a read-only repository over a fixture project store.
pub async fn open_cordis_repo(path: &str) -> CordisRepository {
    let pool = crate::db::open_read_only(path).await.expect("open cordis fixture");
    CordisRepository::new(pool)
}

/// DataContext over the fixture stores with remote adapters unconfigured
/// and entity resolution disabled.
pub async fn offline_context(patents_db: &str, cordis_db: &str) -> DataContext {
    let config = test_config(patents_db, cordis_db);
    DataContext {
        config: config.clone(),
        patent_repo: Some(open_patent_repo(patents_db).await),
        cordis_repo: Some(open_cordis_repo(cordis_db).await),
        openaire: OpenAireClient::new("", ""),
        semantic_scholar: SemanticScholarClient::new(""),
        gleif: None,
    }
}
