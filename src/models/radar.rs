//! Request/response types for the radar API.
//!
//! Every panel is a strongly typed structure with explicit defaults: a
//! failed panel serialises as a well-typed empty panel, never as a partial
//! one. Maps that reach the wire are BTreeMaps so serialisation order is
//! stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

// --- Request ---

/// Radar analysis request.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RadarRequest {
    /// Free-text technology term, e.g. "quantum computing".
    #[validate(length(min = 1, max = 200, message = "technology must be 1-200 characters"))]
    pub technology: String,
    /// Analysis window in years.
    #[serde(default = "default_years")]
    #[validate(range(min = 3, max = 30, message = "years must be between 3 and 30"))]
    pub years: i32,
}

fn default_years() -> i32 {
    10
}

// --- Provenance ---

/// API key/token status alert.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ApiAlert {
    pub source: String,
    /// "warning" or "error".
    pub level: String,
    pub message: String,
}

/// Transparency metadata attached to every analysis.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExplainabilityMetadata {
    pub sources_used: Vec<String>,
    pub methods: Vec<String>,
    pub deterministic: bool,
    pub warnings: Vec<String>,
    pub api_alerts: Vec<ApiAlert>,
    pub query_time_ms: i64,
    pub data_complete_until: Option<i32>,
}

impl Default for ExplainabilityMetadata {
    fn default() -> Self {
        Self {
            sources_used: Vec::new(),
            methods: Vec::new(),
            deterministic: true,
            warnings: Vec::new(),
            api_alerts: Vec::new(),
            query_time_ms: 0,
            data_complete_until: None,
        }
    }
}

// --- Landscape panel ---

/// One year in the merged landscape series.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct LandscapeYear {
    pub year: i32,
    pub patents: i64,
    pub projects: i64,
    pub publications: i64,
    pub patents_growth: Option<f64>,
    pub projects_growth: Option<f64>,
    pub publications_growth: Option<f64>,
}

/// Country with activity from both stores.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq, ToSchema)]
pub struct CountryActivity {
    pub country: String,
    pub patents: i64,
    pub projects: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct LandscapePanel {
    pub total_patents: i64,
    pub total_projects: i64,
    pub total_publications: i64,
    pub time_series: Vec<LandscapeYear>,
    pub top_countries: Vec<CountryActivity>,
}

// --- Maturity panel ---

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct MaturityYear {
    pub year: i32,
    pub patents: i64,
    pub cumulative: i64,
}

/// One point of the fitted S-curve.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct FittedPoint {
    pub year: i32,
    pub fitted: f64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct MaturityPanel {
    pub phase: String,
    pub phase_de: String,
    pub confidence: f64,
    pub cagr: f64,
    pub maturity_percent: f64,
    pub saturation_level: f64,
    pub inflection_year: f64,
    pub r_squared: f64,
    pub fit_model: String,
    pub time_series: Vec<MaturityYear>,
    pub s_curve_fitted: Vec<FittedPoint>,
}

// --- Competitive panel ---

/// Actor with its market share, for the concentration chart.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ActorShare {
    pub name: String,
    pub count: i64,
    pub share: f64,
}

/// Row of the full ranked actor table.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ActorRecord {
    pub name: String,
    pub patents: i64,
    pub projects: i64,
    pub total: i64,
    pub country: String,
    pub sme: Option<bool>,
    pub coordinator: bool,
    pub lei: Option<String>,
}

/// Node of the co-activity network graph.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct NetworkNode {
    pub id: String,
    pub label: String,
    pub size: i64,
}

/// Weighted co-activity edge.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct NetworkEdge {
    pub source: String,
    pub target: String,
    pub weight: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct CompetitivePanel {
    pub hhi_index: f64,
    pub concentration_level: String,
    pub top_actors: Vec<ActorShare>,
    pub top_3_share: f64,
    pub network_nodes: Vec<NetworkNode>,
    pub network_edges: Vec<NetworkEdge>,
    pub full_actors: Vec<ActorRecord>,
}

// --- Funding panel ---

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct FundingYear {
    pub year: i32,
    pub funding: f64,
    pub projects: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ProgrammeFunding {
    pub programme: String,
    pub funding: f64,
    pub projects: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ProgrammeYearFunding {
    pub year: i32,
    pub programme: String,
    pub funding: f64,
    pub projects: i64,
}

/// Funding-instrument activity in one year (RIA, IA, CSA, ...).
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct InstrumentFunding {
    pub instrument: String,
    pub year: i32,
    pub count: i64,
    pub funding: f64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct FundingPanel {
    pub total_funding_eur: f64,
    pub funding_cagr: f64,
    /// Calendar span the CAGR covers, e.g. "2015–2022".
    pub funding_cagr_period: String,
    pub avg_project_size: f64,
    pub by_programme: Vec<ProgrammeFunding>,
    pub time_series: Vec<FundingYear>,
    pub time_series_by_programme: Vec<ProgrammeYearFunding>,
    pub instrument_breakdown: Vec<InstrumentFunding>,
}

// --- CPC flow panel ---

/// Per-year aggregates for frontend time-slice recomputation.
///
/// Keys of the outer maps are years as strings; pair keys are "A|B" with
/// the codes in lexicographic order.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct CpcYearData {
    pub min_year: i32,
    pub max_year: i32,
    pub all_labels: Vec<String>,
    pub pair_counts: BTreeMap<String, BTreeMap<String, i64>>,
    pub cpc_counts: BTreeMap<String, BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CpcFlowPanel {
    /// Symmetric Jaccard matrix over the top-N codes, diagonal zero.
    pub matrix: Vec<Vec<f64>>,
    pub labels: Vec<String>,
    pub colors: Vec<String>,
    pub total_patents_analyzed: i64,
    pub total_connections: i64,
    pub cpc_level: i32,
    pub year_data: CpcYearData,
    pub cpc_descriptions: BTreeMap<String, String>,
}

impl Default for CpcFlowPanel {
    fn default() -> Self {
        Self {
            matrix: Vec::new(),
            labels: Vec::new(),
            colors: Vec::new(),
            total_patents_analyzed: 0,
            total_connections: 0,
            cpc_level: 4,
            year_data: CpcYearData::default(),
            cpc_descriptions: BTreeMap::new(),
        }
    }
}

// --- Geographic panel ---

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct CityCount {
    pub city: String,
    pub country: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct CountryPair {
    pub country_a: String,
    pub country_b: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct GeographicPanel {
    pub total_countries: i64,
    pub total_cities: i64,
    pub cross_border_share: f64,
    pub country_distribution: Vec<CountryActivity>,
    pub city_distribution: Vec<CityCount>,
    pub collaboration_pairs: Vec<CountryPair>,
}

// --- Research impact panel ---

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct CitationYear {
    pub year: i32,
    pub citations: i64,
    pub paper_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct TopPaper {
    pub title: String,
    pub venue: String,
    pub year: i32,
    pub citations: i64,
    pub authors_short: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct VenueCount {
    pub venue: String,
    pub count: i64,
    pub share: f64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct PublicationTypeCount {
    #[serde(rename = "type")]
    pub publication_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ResearchImpactPanel {
    pub h_index: i64,
    pub avg_citations: f64,
    pub total_papers: i64,
    pub influential_ratio: f64,
    pub citation_trend: Vec<CitationYear>,
    pub top_papers: Vec<TopPaper>,
    pub top_venues: Vec<VenueCount>,
    pub publication_types: Vec<PublicationTypeCount>,
}

// --- Temporal panel ---

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ActorDynamicsYear {
    pub year: i32,
    pub new_entrant_rate: f64,
    pub persistence_rate: f64,
    pub total_actors: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ActorTimeline {
    pub name: String,
    pub years_active: Vec<i32>,
    pub total_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ProgrammeEvolutionYear {
    pub year: i32,
    pub schemes: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct BreadthYear {
    pub year: i32,
    pub unique_cpc_sections: i64,
    pub unique_cpc_subclasses: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct TemporalPanel {
    pub new_entrant_rate: f64,
    pub persistence_rate: f64,
    pub dominant_programme: String,
    pub actor_timeline: Vec<ActorTimeline>,
    pub programme_evolution: Vec<ProgrammeEvolutionYear>,
    pub entrant_persistence_trend: Vec<ActorDynamicsYear>,
    pub instrument_evolution: Vec<InstrumentFunding>,
    pub technology_breadth: Vec<BreadthYear>,
}

// --- Full response ---

/// Complete radar response: eight panels plus provenance.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct RadarResponse {
    pub technology: String,
    pub analysis_period: String,
    pub landscape: LandscapePanel,
    pub maturity: MaturityPanel,
    pub competitive: CompetitivePanel,
    pub funding: FundingPanel,
    pub cpc_flow: CpcFlowPanel,
    pub geographic: GeographicPanel,
    pub research_impact: ResearchImpactPanel,
    pub temporal: TemporalPanel,
    pub explainability: ExplainabilityMetadata,
}
