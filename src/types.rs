use serde::Deserialize;
use tabled::Tabled;

/// Header names every input file must carry. Other columns are tolerated.
pub const REQUIRED_COLUMNS: [&str; 18] = [
    "campana_id",
    "fecha_campana",
    "plataforma",
    "tipo_campana",
    "audiencia_objetivo",
    "presupuesto_diario",
    "costo_total",
    "revenue_generado",
    "impresiones",
    "clicks",
    "conversiones",
    "alcance",
    "ctr",
    "conversion_rate",
    "engagement_rate",
    "roas",
    "cpc",
    "cpa",
];

/// One campaign, one row of the input file.
///
/// Counts (impressions, clicks...) are kept as `f64`: they are only ever
/// summed or averaged, and some exports write them as `1200.0`.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignRecord {
    #[serde(rename = "campana_id")]
    pub id: String,
    #[serde(rename = "fecha_campana")]
    pub date: String,
    #[serde(rename = "plataforma")]
    pub platform: String,
    #[serde(rename = "tipo_campana")]
    pub campaign_type: String,
    #[serde(rename = "audiencia_objetivo")]
    pub audience: String,
    #[serde(rename = "presupuesto_diario")]
    pub daily_budget: f64,
    #[serde(rename = "costo_total")]
    pub total_cost: f64,
    #[serde(rename = "revenue_generado")]
    pub revenue: f64,
    #[serde(rename = "impresiones")]
    pub impressions: f64,
    pub clicks: f64,
    #[serde(rename = "conversiones")]
    pub conversions: f64,
    #[serde(rename = "alcance")]
    pub reach: f64,
    pub ctr: f64,
    pub conversion_rate: f64,
    pub engagement_rate: f64,
    pub roas: f64,
    pub cpc: f64,
    pub cpa: f64,
}

impl CampaignRecord {
    pub fn net_profit(&self) -> f64 {
        self.revenue - self.total_cost
    }
}

/// The loaded table: its header row and the typed records.
#[derive(Debug, Clone)]
pub struct CampaignTable {
    pub columns: Vec<String>,
    pub records: Vec<CampaignRecord>,
}

/// Categorical columns a table can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Platform,
    CampaignType,
    Audience,
}

impl Dimension {
    pub fn of<'a>(&self, r: &'a CampaignRecord) -> &'a str {
        match self {
            Dimension::Platform => &r.platform,
            Dimension::CampaignType => &r.campaign_type,
            Dimension::Audience => &r.audience,
        }
    }
}

/// Numeric columns, plus net profit which is the one value derived here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    DailyBudget,
    TotalCost,
    Revenue,
    Impressions,
    Clicks,
    Conversions,
    Reach,
    Ctr,
    ConversionRate,
    EngagementRate,
    Roas,
    Cpc,
    Cpa,
    NetProfit,
}

impl Metric {
    pub const COUNT: usize = 14;

    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::DailyBudget,
        Metric::TotalCost,
        Metric::Revenue,
        Metric::Impressions,
        Metric::Clicks,
        Metric::Conversions,
        Metric::Reach,
        Metric::Ctr,
        Metric::ConversionRate,
        Metric::EngagementRate,
        Metric::Roas,
        Metric::Cpc,
        Metric::Cpa,
        Metric::NetProfit,
    ];

    pub fn of(&self, r: &CampaignRecord) -> f64 {
        match self {
            Metric::DailyBudget => r.daily_budget,
            Metric::TotalCost => r.total_cost,
            Metric::Revenue => r.revenue,
            Metric::Impressions => r.impressions,
            Metric::Clicks => r.clicks,
            Metric::Conversions => r.conversions,
            Metric::Reach => r.reach,
            Metric::Ctr => r.ctr,
            Metric::ConversionRate => r.conversion_rate,
            Metric::EngagementRate => r.engagement_rate,
            Metric::Roas => r.roas,
            Metric::Cpc => r.cpc,
            Metric::Cpa => r.cpa,
            Metric::NetProfit => r.net_profit(),
        }
    }

    /// Position in `Metric::ALL`, used to index per-group running sums.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct PlatformProfitRow {
    #[tabled(rename = "Plataforma")]
    pub platform: String,
    #[tabled(rename = "Campañas")]
    pub campaigns: String,
    #[tabled(rename = "Revenue")]
    pub revenue: String,
    #[tabled(rename = "Costo")]
    pub cost: String,
    #[tabled(rename = "Ganancia Neta")]
    pub net_profit: String,
}
