// Figure composition.
//
// Each figure is described as plain data: an output file, a physical size,
// a grid and the panels laid out in it. Every panel carries the series it
// plots, already aggregated from the campaign table, so building a figure
// needs no drawing backend and rendering needs no table.

use crate::aggregate::{
    column_mean, column_values, group_by, group_by_sorted, grouped_values, histogram,
    monthly_totals, rank_groups, top_k, value_counts, value_counts_by_label, BoxStats,
    HistogramBin,
};
use crate::palette;
use crate::types::{CampaignRecord, Dimension, Metric};
use chrono::NaiveDate;
use plotters::style::RGBColor;

const CTR_BINS: usize = 30;

#[derive(Debug, Clone)]
pub struct FigureSpec {
    pub file_name: &'static str,
    /// Shown in the closing summary of the report.
    pub description: &'static str,
    /// Width and height in inches.
    pub size_in: (f64, f64),
    /// Rows and columns of the panel grid.
    pub grid: (usize, usize),
    pub panels: Vec<Panel>,
}

impl FigureSpec {
    pub fn pixel_size(&self, dpi: u32) -> (u32, u32) {
        let (w, h) = self.size_in;
        (
            (w * dpi as f64).round() as u32,
            (h * dpi as f64).round() as u32,
        )
    }
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub title: String,
    pub x_desc: String,
    pub y_desc: String,
    pub kind: PanelKind,
}

/// How tick labels of the value axis are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueAxis {
    Plain,
    /// Money in thousands: `$12K`.
    Thousands,
}

/// A straight line across the plot at a fixed value.
#[derive(Debug, Clone)]
pub struct ReferenceLine {
    pub value: f64,
    pub color: RGBColor,
    pub dashed: bool,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BarSeries {
    pub name: String,
    pub values: Vec<f64>,
    pub color: RGBColor,
}

#[derive(Debug, Clone)]
pub struct ScatterGroup {
    pub name: String,
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
}

#[derive(Debug, Clone)]
pub enum PanelKind {
    Bar {
        labels: Vec<String>,
        values: Vec<f64>,
        /// One colour per bar, cycled when shorter than `values`.
        colors: Vec<RGBColor>,
        opacity: f64,
        axis: ValueAxis,
        reference: Option<ReferenceLine>,
    },
    HorizontalBar {
        labels: Vec<String>,
        values: Vec<f64>,
        color: RGBColor,
        opacity: f64,
    },
    GroupedBar {
        labels: Vec<String>,
        series: Vec<BarSeries>,
        opacity: f64,
    },
    Scatter {
        groups: Vec<ScatterGroup>,
        point_size: u32,
        opacity: f64,
    },
    BoxPlot {
        labels: Vec<String>,
        boxes: Vec<BoxStats>,
    },
    Line {
        labels: Vec<String>,
        values: Vec<f64>,
        color: RGBColor,
    },
    Histogram {
        bins: Vec<HistogramBin>,
        color: RGBColor,
        opacity: f64,
        reference: Option<ReferenceLine>,
    },
    Pie {
        labels: Vec<String>,
        values: Vec<f64>,
        colors: Vec<RGBColor>,
    },
}

impl PanelKind {
    pub fn chart_type(&self) -> &'static str {
        match self {
            PanelKind::Bar { .. } => "bar",
            PanelKind::HorizontalBar { .. } => "horizontal bar",
            PanelKind::GroupedBar { .. } => "grouped bar",
            PanelKind::Scatter { .. } => "scatter",
            PanelKind::BoxPlot { .. } => "box plot",
            PanelKind::Line { .. } => "line",
            PanelKind::Histogram { .. } => "histogram",
            PanelKind::Pie { .. } => "pie",
        }
    }

    /// Category labels along the categorical axis, if the panel has one.
    pub fn labels(&self) -> &[String] {
        match self {
            PanelKind::Bar { labels, .. }
            | PanelKind::HorizontalBar { labels, .. }
            | PanelKind::GroupedBar { labels, .. }
            | PanelKind::BoxPlot { labels, .. }
            | PanelKind::Line { labels, .. }
            | PanelKind::Pie { labels, .. } => labels,
            PanelKind::Scatter { .. } | PanelKind::Histogram { .. } => &[],
        }
    }
}

fn panel(title: &str, x_desc: &str, y_desc: &str, kind: PanelKind) -> Panel {
    Panel {
        title: title.to_string(),
        x_desc: x_desc.to_string(),
        y_desc: y_desc.to_string(),
        kind,
    }
}

fn unzip_counts(counts: Vec<(String, usize)>) -> (Vec<String>, Vec<f64>) {
    counts.into_iter().map(|(k, c)| (k, c as f64)).unzip()
}

fn unzip_values(pairs: Vec<(String, f64)>) -> (Vec<String>, Vec<f64>) {
    pairs.into_iter().unzip()
}

fn count_bar(counts: Vec<(String, usize)>, colors: Vec<RGBColor>) -> PanelKind {
    let (labels, values) = unzip_counts(counts);
    PanelKind::Bar {
        labels,
        values,
        colors,
        opacity: 1.0,
        axis: ValueAxis::Plain,
        reference: None,
    }
}

fn ranked_bar(
    ranked: Vec<(String, f64)>,
    color: RGBColor,
    axis: ValueAxis,
    reference: Option<ReferenceLine>,
) -> PanelKind {
    let (labels, values) = unzip_values(ranked);
    PanelKind::Bar {
        labels,
        values,
        colors: vec![color],
        opacity: 0.7,
        axis,
        reference,
    }
}

/// One scatter group per platform, in first-seen order.
fn platform_scatter(data: &[CampaignRecord], x: Metric, y: Metric) -> Vec<ScatterGroup> {
    let platforms = group_by(data, Dimension::Platform);
    let colors = palette::husl(platforms.len());
    platforms
        .iter()
        .zip(colors)
        .map(|(g, color)| ScatterGroup {
            name: g.key.clone(),
            points: data
                .iter()
                .filter(|r| r.platform == g.key)
                .map(|r| (x.of(r), y.of(r)))
                .collect(),
            color,
        })
        .collect()
}

/// All three figures, in output order.
pub fn build_figures(data: &[CampaignRecord], dates: &[NaiveDate]) -> Vec<FigureSpec> {
    vec![
        overview_figure(data),
        detail_figure(data, dates),
        summary_figure(data),
    ]
}

pub fn overview_figure(data: &[CampaignRecord]) -> FigureSpec {
    let platform_counts = value_counts(data, Dimension::Platform);
    let platform_colors = palette::husl(platform_counts.len());
    let by_platform = group_by(data, Dimension::Platform);
    let by_type = group_by(data, Dimension::CampaignType);
    let mean_roas = column_mean(data, Metric::Roas);

    let (platform_labels, (conversion_rates, ctrs)): (Vec<String>, (Vec<f64>, Vec<f64>)) =
        by_platform
            .iter()
            .map(|g| {
                (
                    g.key.clone(),
                    (g.mean(Metric::ConversionRate), g.mean(Metric::Ctr)),
                )
            })
            .unzip();

    let engagement = rank_groups(&by_type, |g| g.mean(Metric::EngagementRate));
    let (engagement_labels, engagement_values) = unzip_values(engagement);

    let panels = vec![
        panel(
            "Campañas por Plataforma",
            "Plataforma",
            "Cantidad",
            count_bar(platform_counts, platform_colors),
        ),
        panel(
            "Campañas por Tipo",
            "Tipo de Campaña",
            "Cantidad",
            count_bar(value_counts(data, Dimension::CampaignType), palette::SET2.to_vec()),
        ),
        panel(
            "Campañas por Audiencia",
            "Rango de Edad",
            "Cantidad",
            count_bar(
                value_counts_by_label(data, Dimension::Audience),
                palette::MUTED.to_vec(),
            ),
        ),
        panel(
            "Revenue Total por Plataforma",
            "Plataforma",
            "Revenue ($)",
            ranked_bar(
                rank_groups(&by_platform, |g| g.sum(Metric::Revenue)),
                palette::GREEN,
                ValueAxis::Thousands,
                None,
            ),
        ),
        panel(
            "Costo Total por Plataforma",
            "Plataforma",
            "Costo ($)",
            ranked_bar(
                rank_groups(&by_platform, |g| g.sum(Metric::TotalCost)),
                palette::RED,
                ValueAxis::Thousands,
                None,
            ),
        ),
        panel(
            "ROAS Promedio por Plataforma",
            "Plataforma",
            "ROAS",
            ranked_bar(
                rank_groups(&by_platform, |g| g.mean(Metric::Roas)),
                palette::ORANGE,
                ValueAxis::Plain,
                Some(ReferenceLine {
                    value: mean_roas,
                    color: palette::BLUE,
                    dashed: true,
                    label: Some(format!("Promedio: {:.2}", mean_roas)),
                }),
            ),
        ),
        panel(
            "Conversion Rate vs CTR por Plataforma",
            "Plataforma",
            "Porcentaje (%)",
            PanelKind::GroupedBar {
                labels: platform_labels,
                series: vec![
                    BarSeries {
                        name: "Conversion Rate (%)".to_string(),
                        values: conversion_rates,
                        color: palette::CYCLE[0],
                    },
                    BarSeries {
                        name: "CTR (%)".to_string(),
                        values: ctrs,
                        color: palette::CYCLE[1],
                    },
                ],
                opacity: 0.8,
            },
        ),
        panel(
            "Engagement Rate Promedio por Tipo",
            "Engagement Rate (%)",
            "Tipo de Campaña",
            PanelKind::HorizontalBar {
                labels: engagement_labels,
                values: engagement_values,
                color: palette::PURPLE,
                opacity: 0.7,
            },
        ),
        panel(
            "Revenue vs Costo por Campaña",
            "Costo Total ($)",
            "Revenue Generado ($)",
            PanelKind::Scatter {
                groups: platform_scatter(data, Metric::TotalCost, Metric::Revenue),
                point_size: 5,
                opacity: 0.6,
            },
        ),
    ];

    FigureSpec {
        file_name: "analisis_campanas_1.png",
        description: "Análisis general",
        size_in: (16.0, 12.0),
        grid: (3, 3),
        panels,
    }
}

pub fn detail_figure(data: &[CampaignRecord], dates: &[NaiveDate]) -> FigureSpec {
    let top10: Vec<(String, f64)> = top_k(data, Metric::Roas, 10)
        .into_iter()
        .map(|r| (r.id.clone(), r.roas))
        .collect();
    let (top_labels, top_values) = unzip_values(top10);

    let (box_labels, boxes): (Vec<String>, Vec<BoxStats>) =
        grouped_values(data, Dimension::CampaignType, Metric::Roas)
            .into_iter()
            .filter_map(|(k, v)| BoxStats::from_values(&v).map(|b| (k, b)))
            .unzip();

    let (cost_labels, (cpcs, cpas)): (Vec<String>, (Vec<f64>, Vec<f64>)) =
        group_by_sorted(data, Dimension::Platform)
            .iter()
            .map(|g| (g.key.clone(), (g.mean(Metric::Cpc), g.mean(Metric::Cpa))))
            .unzip();

    let (month_labels, month_values) =
        unzip_values(monthly_totals(data, dates, Metric::Conversions));

    let mean_ctr = column_mean(data, Metric::Ctr);

    let panels = vec![
        panel(
            "Top 10 Campañas por ROAS",
            "ROAS",
            "",
            PanelKind::HorizontalBar {
                labels: top_labels,
                values: top_values,
                color: palette::GREEN,
                opacity: 0.7,
            },
        ),
        panel(
            "Distribución de ROAS por Tipo de Campaña",
            "Tipo de Campaña",
            "ROAS",
            PanelKind::BoxPlot {
                labels: box_labels,
                boxes,
            },
        ),
        panel(
            "Impresiones vs Conversiones",
            "Impresiones",
            "Conversiones",
            PanelKind::Scatter {
                groups: platform_scatter(data, Metric::Impressions, Metric::Conversions),
                point_size: 4,
                opacity: 0.6,
            },
        ),
        panel(
            "Costo Por Click vs Costo Por Acción",
            "Plataforma",
            "Costo ($)",
            PanelKind::GroupedBar {
                labels: cost_labels,
                series: vec![
                    BarSeries {
                        name: "CPC".to_string(),
                        values: cpcs,
                        color: palette::CYCLE[0],
                    },
                    BarSeries {
                        name: "CPA".to_string(),
                        values: cpas,
                        color: palette::CYCLE[1],
                    },
                ],
                opacity: 0.8,
            },
        ),
        panel(
            "Conversiones por Mes",
            "Mes",
            "Conversiones",
            PanelKind::Line {
                labels: month_labels,
                values: month_values,
                color: palette::BLUE,
            },
        ),
        panel(
            "Distribución del CTR",
            "CTR (%)",
            "Frecuencia",
            PanelKind::Histogram {
                bins: histogram(&column_values(data, Metric::Ctr), CTR_BINS),
                color: palette::SKY_BLUE,
                opacity: 0.7,
                reference: Some(ReferenceLine {
                    value: mean_ctr,
                    color: palette::RED,
                    dashed: true,
                    label: Some(format!("Media: {:.2}%", mean_ctr)),
                }),
            },
        ),
    ];

    FigureSpec {
        file_name: "analisis_campanas_2.png",
        description: "Análisis detallado",
        size_in: (16.0, 10.0),
        grid: (2, 3),
        panels,
    }
}

pub fn summary_figure(data: &[CampaignRecord]) -> FigureSpec {
    let by_platform = group_by_sorted(data, Dimension::Platform);
    let labels: Vec<String> = by_platform.iter().map(|g| g.key.clone()).collect();
    let revenue: Vec<f64> = by_platform.iter().map(|g| g.sum(Metric::Revenue)).collect();
    let cost: Vec<f64> = by_platform.iter().map(|g| g.sum(Metric::TotalCost)).collect();
    let profit: Vec<f64> = by_platform.iter().map(|g| g.sum(Metric::NetProfit)).collect();
    let profit_colors: Vec<RGBColor> = profit
        .iter()
        .map(|p| if *p > 0.0 { palette::GREEN } else { palette::RED })
        .collect();
    let budget: Vec<f64> = by_platform.iter().map(|g| g.sum(Metric::DailyBudget)).collect();

    let reach = rank_groups(&group_by(data, Dimension::Audience), |g| g.sum(Metric::Reach));
    let (reach_labels, reach_values) = unzip_values(reach);

    let panels = vec![
        panel(
            "Revenue vs Costo Total por Plataforma",
            "Plataforma",
            "Monto ($)",
            PanelKind::GroupedBar {
                labels: labels.clone(),
                series: vec![
                    BarSeries {
                        name: "Revenue".to_string(),
                        values: revenue,
                        color: palette::GREEN,
                    },
                    BarSeries {
                        name: "Costo".to_string(),
                        values: cost,
                        color: palette::RED,
                    },
                ],
                opacity: 0.8,
            },
        ),
        panel(
            "Ganancia Neta por Plataforma",
            "Plataforma",
            "Ganancia Neta ($)",
            PanelKind::Bar {
                labels: labels.clone(),
                values: profit,
                colors: profit_colors,
                opacity: 0.7,
                axis: ValueAxis::Thousands,
                reference: Some(ReferenceLine {
                    value: 0.0,
                    color: palette::BLACK,
                    dashed: false,
                    label: None,
                }),
            },
        ),
        panel(
            "Alcance Total por Audiencia Objetivo",
            "Alcance",
            "",
            PanelKind::HorizontalBar {
                labels: reach_labels,
                values: reach_values,
                color: palette::TEAL,
                opacity: 0.7,
            },
        ),
        panel(
            "Distribución del Presupuesto Diario",
            "",
            "",
            PanelKind::Pie {
                colors: palette::husl(labels.len()),
                labels,
                values: budget,
            },
        ),
    ];

    FigureSpec {
        file_name: "analisis_campanas_3.png",
        description: "Resumen de métricas clave",
        size_in: (14.0, 8.0),
        grid: (2, 2),
        panels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::three_row_table;

    fn figures() -> Vec<FigureSpec> {
        let table = three_row_table();
        let dates = table.coerce_dates().unwrap();
        build_figures(&table.records, &dates)
    }

    #[test]
    fn test_panel_counts_fill_grids() {
        let figs = figures();
        let counts: Vec<usize> = figs.iter().map(|f| f.panels.len()).collect();
        assert_eq!(counts, [9, 6, 4]);
        for f in &figs {
            assert_eq!(f.panels.len(), f.grid.0 * f.grid.1);
        }
        let names: Vec<&str> = figs.iter().map(|f| f.file_name).collect();
        assert_eq!(
            names,
            [
                "analisis_campanas_1.png",
                "analisis_campanas_2.png",
                "analisis_campanas_3.png"
            ]
        );
    }

    #[test]
    fn test_pixel_size() {
        let figs = figures();
        assert_eq!(figs[0].pixel_size(300), (4800, 3600));
        assert_eq!(figs[2].pixel_size(100), (1400, 800));
    }

    #[test]
    fn test_figures_are_stable() {
        let a = figures();
        let b = figures();
        for (fa, fb) in a.iter().zip(&b) {
            for (pa, pb) in fa.panels.iter().zip(&fb.panels) {
                assert_eq!(pa.title, pb.title);
                assert_eq!(pa.kind.chart_type(), pb.kind.chart_type());
                assert_eq!(pa.kind.labels(), pb.kind.labels());
            }
        }
    }

    #[test]
    fn test_overview_series() {
        let table = three_row_table();
        let fig = overview_figure(&table.records);
        match &fig.panels[3].kind {
            PanelKind::Bar { labels, values, axis, .. } => {
                assert_eq!(labels, &["A", "B"]);
                assert_eq!(values, &[300.0, 50.0]);
                assert_eq!(*axis, ValueAxis::Thousands);
            }
            other => panic!("unexpected panel {}", other.chart_type()),
        }
        match &fig.panels[5].kind {
            PanelKind::Bar { reference: Some(line), .. } => {
                assert_eq!(line.label.as_deref(), Some("Promedio: 2.17"));
                assert!(line.dashed);
            }
            other => panic!("unexpected panel {}", other.chart_type()),
        }
        match &fig.panels[8].kind {
            PanelKind::Scatter { groups, .. } => {
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0].points, vec![(50.0, 100.0), (50.0, 200.0)]);
            }
            other => panic!("unexpected panel {}", other.chart_type()),
        }
    }

    #[test]
    fn test_detail_series() {
        let table = three_row_table();
        let dates = table.coerce_dates().unwrap();
        let fig = detail_figure(&table.records, &dates);
        assert_eq!(fig.panels[0].kind.labels(), &["C002", "C001", "C003"]);
        assert_eq!(fig.panels[1].kind.labels(), &["Display", "Search"]);
        match &fig.panels[4].kind {
            PanelKind::Line { labels, values, .. } => {
                assert_eq!(labels, &["2024-01", "2024-02"]);
                assert_eq!(values, &[5.0, 10.0]);
            }
            other => panic!("unexpected panel {}", other.chart_type()),
        }
        match &fig.panels[5].kind {
            PanelKind::Histogram { bins, .. } => {
                assert_eq!(bins.len(), CTR_BINS);
                assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
            }
            other => panic!("unexpected panel {}", other.chart_type()),
        }
    }

    #[test]
    fn test_summary_profit_colors() {
        let table = three_row_table();
        let fig = summary_figure(&table.records);
        match &fig.panels[1].kind {
            PanelKind::Bar { values, colors, .. } => {
                assert_eq!(values, &[200.0, -50.0]);
                assert_eq!(colors, &[palette::GREEN, palette::RED]);
            }
            other => panic!("unexpected panel {}", other.chart_type()),
        }
        match &fig.panels[3].kind {
            PanelKind::Pie { labels, values, colors } => {
                assert_eq!(labels, &["A", "B"]);
                assert_eq!(values, &[30.0, 30.0]);
                assert_eq!(colors.len(), 2);
            }
            other => panic!("unexpected panel {}", other.chart_type()),
        }
    }
}
