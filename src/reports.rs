use crate::aggregate::{
    bottom_k, column_mean, column_sum, group_by, group_by_sorted, top_k, value_counts,
    value_counts_by_label,
};
use crate::error::Result;
use crate::types::{CampaignRecord, CampaignTable, Dimension, Metric, PlatformProfitRow};
use crate::util::{format_count, format_currency, format_int, format_percent, format_ratio};
use std::io::Write;
use tabled::{settings::Style, Table};

const RULE_WIDTH: usize = 80;

fn heavy_rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn section<W: Write>(out: &mut W, title: &str) -> Result<()> {
    writeln!(out, "\n{}", title)?;
    writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
    Ok(())
}

/// Write every text section of the analysis, in a fixed order.
pub fn write_report<W: Write>(table: &CampaignTable, out: &mut W) -> Result<()> {
    let data = &table.records;
    writeln!(out, "{}", heavy_rule())?;
    writeln!(out, "ANÁLISIS DE DATOS DE CAMPAÑAS PUBLICITARIAS")?;
    writeln!(out, "{}", heavy_rule())?;

    write_general_info(table, out)?;
    write_distribution(
        out,
        "2. DISTRIBUCIÓN POR PLATAFORMA",
        &value_counts(data, Dimension::Platform),
    )?;
    write_distribution(
        out,
        "3. DISTRIBUCIÓN POR TIPO DE CAMPAÑA",
        &value_counts(data, Dimension::CampaignType),
    )?;
    write_distribution(
        out,
        "4. DISTRIBUCIÓN POR AUDIENCIA OBJETIVO",
        &value_counts_by_label(data, Dimension::Audience),
    )?;
    write_financials(data, out)?;
    write_performance(data, out)?;
    write_unit_costs(data, out)?;
    write_platform_analysis(data, out)?;
    write_roas_ranking(
        out,
        "9. TOP 5 CAMPAÑAS POR ROAS (Mejor ROI)",
        &top_k(data, Metric::Roas, 5),
    )?;
    write_roas_ranking(
        out,
        "10. BOTTOM 5 CAMPAÑAS POR ROAS (Peor ROI)",
        &bottom_k(data, Metric::Roas, 5),
    )?;
    write_type_analysis(data, out)?;
    write_platform_profit(data, out)?;
    Ok(())
}

fn write_general_info<W: Write>(table: &CampaignTable, out: &mut W) -> Result<()> {
    section(out, "1. INFORMACIÓN GENERAL DEL DATASET")?;
    writeln!(out, "Número de registros: {}", format_int(table.records.len()))?;
    writeln!(out, "Número de columnas: {}", format_int(table.columns.len()))?;
    if let Some((first, last)) = table.date_range() {
        writeln!(out, "Rango de fechas: {} - {}", first, last)?;
    }
    Ok(())
}

fn write_distribution<W: Write>(out: &mut W, title: &str, counts: &[(String, usize)]) -> Result<()> {
    section(out, title)?;
    for (category, count) in counts {
        writeln!(out, "  {}: {} campañas", category, format_int(*count))?;
    }
    Ok(())
}

fn write_financials<W: Write>(data: &[CampaignRecord], out: &mut W) -> Result<()> {
    section(out, "5. ESTADÍSTICAS FINANCIERAS")?;
    let revenue = column_sum(data, Metric::Revenue);
    let cost = column_sum(data, Metric::TotalCost);
    writeln!(
        out,
        "Presupuesto diario total: {}",
        format_currency(column_sum(data, Metric::DailyBudget))
    )?;
    writeln!(
        out,
        "Presupuesto diario promedio: {}",
        format_currency(column_mean(data, Metric::DailyBudget))
    )?;
    writeln!(out, "Costo total general: {}", format_currency(cost))?;
    writeln!(out, "Revenue total generado: {}", format_currency(revenue))?;
    writeln!(out, "Ganancia neta total: {}", format_currency(revenue - cost))?;
    Ok(())
}

fn write_performance<W: Write>(data: &[CampaignRecord], out: &mut W) -> Result<()> {
    section(out, "6. ESTADÍSTICAS DE PERFORMANCE")?;
    writeln!(
        out,
        "Total de impresiones: {}",
        format_count(column_sum(data, Metric::Impressions))
    )?;
    writeln!(out, "Total de clicks: {}", format_count(column_sum(data, Metric::Clicks)))?;
    writeln!(
        out,
        "Total de conversiones: {}",
        format_count(column_sum(data, Metric::Conversions))
    )?;
    writeln!(
        out,
        "Alcance total combinado: {}",
        format_count(column_sum(data, Metric::Reach))
    )?;
    writeln!(
        out,
        "\nCTR (Click-Through Rate) promedio: {}",
        format_percent(column_mean(data, Metric::Ctr))
    )?;
    writeln!(
        out,
        "Conversion Rate promedio: {}",
        format_percent(column_mean(data, Metric::ConversionRate))
    )?;
    writeln!(
        out,
        "Engagement Rate promedio: {}",
        format_percent(column_mean(data, Metric::EngagementRate))
    )?;
    writeln!(
        out,
        "ROAS (Return on Ad Spend) promedio: {}",
        format_ratio(column_mean(data, Metric::Roas))
    )?;
    Ok(())
}

fn write_unit_costs<W: Write>(data: &[CampaignRecord], out: &mut W) -> Result<()> {
    section(out, "7. COSTOS Y VALORES POR ACCIÓN")?;
    writeln!(
        out,
        "CPC (Costo Por Click) promedio: {}",
        format_currency(column_mean(data, Metric::Cpc))
    )?;
    writeln!(
        out,
        "CPA (Costo Por Acción) promedio: {}",
        format_currency(column_mean(data, Metric::Cpa))
    )?;
    Ok(())
}

fn write_platform_analysis<W: Write>(data: &[CampaignRecord], out: &mut W) -> Result<()> {
    section(out, "8. ANÁLISIS POR PLATAFORMA")?;
    for g in group_by(data, Dimension::Platform) {
        writeln!(out, "\n  {}:", g.key)?;
        writeln!(out, "    - Campañas: {}", format_int(g.count))?;
        writeln!(out, "    - Revenue total: {}", format_currency(g.sum(Metric::Revenue)))?;
        writeln!(out, "    - Costo total: {}", format_currency(g.sum(Metric::TotalCost)))?;
        writeln!(out, "    - ROAS promedio: {}", format_ratio(g.mean(Metric::Roas)))?;
        writeln!(
            out,
            "    - Engagement Rate promedio: {}",
            format_percent(g.mean(Metric::EngagementRate))
        )?;
    }
    Ok(())
}

fn write_roas_ranking<W: Write>(out: &mut W, title: &str, rows: &[&CampaignRecord]) -> Result<()> {
    section(out, title)?;
    for (idx, r) in rows.iter().enumerate() {
        writeln!(
            out,
            "  {}. {} ({}) - ROAS: {}",
            idx + 1,
            r.id,
            r.platform,
            format_ratio(r.roas)
        )?;
        writeln!(
            out,
            "     Tipo: {}, Revenue: {}, Costo: {}",
            r.campaign_type,
            format_currency(r.revenue),
            format_currency(r.total_cost)
        )?;
    }
    Ok(())
}

fn write_type_analysis<W: Write>(data: &[CampaignRecord], out: &mut W) -> Result<()> {
    section(out, "11. ANÁLISIS POR TIPO DE CAMPAÑA")?;
    for g in group_by(data, Dimension::CampaignType) {
        writeln!(out, "\n  {}:", g.key)?;
        writeln!(out, "    - Campañas: {}", format_int(g.count))?;
        writeln!(out, "    - Revenue total: {}", format_currency(g.sum(Metric::Revenue)))?;
        writeln!(
            out,
            "    - Conversion Rate promedio: {}",
            format_percent(g.mean(Metric::ConversionRate))
        )?;
        writeln!(out, "    - ROAS promedio: {}", format_ratio(g.mean(Metric::Roas)))?;
    }
    Ok(())
}

pub fn platform_profit_rows(data: &[CampaignRecord]) -> Vec<PlatformProfitRow> {
    group_by_sorted(data, Dimension::Platform)
        .into_iter()
        .map(|g| PlatformProfitRow {
            campaigns: format_int(g.count),
            revenue: format_currency(g.sum(Metric::Revenue)),
            cost: format_currency(g.sum(Metric::TotalCost)),
            net_profit: format_currency(g.sum(Metric::NetProfit)),
            platform: g.key,
        })
        .collect()
}

fn write_platform_profit<W: Write>(data: &[CampaignRecord], out: &mut W) -> Result<()> {
    section(out, "12. GANANCIA NETA POR PLATAFORMA")?;
    let rows = platform_profit_rows(data);
    let table_str = Table::new(rows).with(Style::markdown()).to_string();
    writeln!(out, "{}", table_str)?;
    Ok(())
}

pub fn write_charts_banner<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "\n{}", heavy_rule())?;
    writeln!(out, "GENERANDO GRÁFICAS...")?;
    writeln!(out, "{}", heavy_rule())?;
    Ok(())
}

/// One line per saved figure; the first is set off from the banner by a blank line.
pub fn write_figure_saved<W: Write>(out: &mut W, index: usize, file_name: &str) -> Result<()> {
    if index == 0 {
        writeln!(out)?;
    }
    writeln!(out, "✓ Gráfica guardada: {}", file_name)?;
    Ok(())
}

/// Closing summary: one line per saved figure with its description.
pub fn write_closing<W: Write>(out: &mut W, saved: &[(String, String)]) -> Result<()> {
    writeln!(out, "\n{}", heavy_rule())?;
    writeln!(
        out,
        "FIN DEL ANÁLISIS - Se han generado {} archivos de gráficas:",
        saved.len()
    )?;
    for (idx, (file, description)) in saved.iter().enumerate() {
        writeln!(out, "  {}. {} - {}", idx + 1, file, description)?;
    }
    writeln!(out, "{}", heavy_rule())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::read_campaigns;
    use crate::loader::tests::{csv_with_rows, three_row_table};

    fn render(table: &CampaignTable) -> String {
        let mut buf: Vec<u8> = Vec::new();
        write_report(table, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    /// Lines between a section title and the next blank line or section.
    fn section_lines<'a>(report: &'a str, title: &str) -> Vec<&'a str> {
        report
            .lines()
            .skip_while(|l| *l != title)
            .skip(2)
            .take_while(|l| !l.is_empty())
            .collect()
    }

    #[test]
    fn test_three_row_scenario() {
        let report = render(&three_row_table());
        assert!(report.contains("Número de registros: 3\n"));
        assert!(report.contains("Número de columnas: 18\n"));
        assert!(report.contains("Rango de fechas: 2024-01-15 - 2024-02-20\n"));
        assert!(report.contains("Revenue total generado: $350.00\n"));
        assert!(report.contains("Costo total general: $200.00\n"));
        assert!(report.contains("Ganancia neta total: $150.00\n"));
        assert!(report.contains("Total de impresiones: 7,000\n"));

        let platforms = section_lines(&report, "2. DISTRIBUCIÓN POR PLATAFORMA");
        assert_eq!(platforms, ["  A: 2 campañas", "  B: 1 campañas"]);

        let profit = section_lines(&report, "12. GANANCIA NETA POR PLATAFORMA");
        let b_row = profit.iter().find(|l| l.contains("| B ")).unwrap();
        assert!(b_row.contains("$-50.00"));
    }

    #[test]
    fn test_platform_distribution_counts_sum_to_rows() {
        let table = three_row_table();
        let report = render(&table);
        let lines = section_lines(&report, "2. DISTRIBUCIÓN POR PLATAFORMA");
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| {
                let n = l.rsplit(": ").next().unwrap().trim_end_matches(" campañas");
                n.parse().unwrap()
            })
            .collect();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.iter().sum::<usize>(), table.records.len());
    }

    #[test]
    fn test_platform_sections_in_first_seen_order() {
        let report = render(&three_row_table());
        let a = report.find("\n  A:\n").unwrap();
        let b = report.find("\n  B:\n").unwrap();
        assert!(a < b);
        assert!(report.contains("    - Revenue total: $300.00\n"));
        assert!(report.contains("    - ROAS promedio: 3.00\n"));
        assert!(report.contains("    - Engagement Rate promedio: 3.50%\n"));
    }

    #[test]
    fn test_roas_rankings() {
        let report = render(&three_row_table());
        let top = section_lines(&report, "9. TOP 5 CAMPAÑAS POR ROAS (Mejor ROI)");
        assert_eq!(top.len(), 6);
        assert_eq!(top[0], "  1. C002 (A) - ROAS: 4.00");
        assert_eq!(top[1], "     Tipo: Display, Revenue: $200.00, Costo: $50.00");
        let bottom = section_lines(&report, "10. BOTTOM 5 CAMPAÑAS POR ROAS (Peor ROI)");
        assert_eq!(bottom[0], "  1. C003 (B) - ROAS: 0.50");
    }

    #[test]
    fn test_single_row_rankings_match() {
        let csv = csv_with_rows(&[
            "C009,2024-05-01,Solo,Video,35-44,5,10,15,100,10,1,90,10.0,10.0,2.0,1.5,1.0,10.0",
        ]);
        let report = render(&read_campaigns(csv.as_bytes()).unwrap());
        let top = section_lines(&report, "9. TOP 5 CAMPAÑAS POR ROAS (Mejor ROI)");
        let bottom = section_lines(&report, "10. BOTTOM 5 CAMPAÑAS POR ROAS (Peor ROI)");
        assert_eq!(top.len(), 2);
        assert_eq!(top, bottom);
    }

    #[test]
    fn test_report_is_deterministic() {
        let table = three_row_table();
        assert_eq!(render(&table), render(&table));
    }

    #[test]
    fn test_closing_lists_figures() {
        let mut buf: Vec<u8> = Vec::new();
        write_figure_saved(&mut buf, 0, "a.png").unwrap();
        write_figure_saved(&mut buf, 1, "b.png").unwrap();
        write_closing(
            &mut buf,
            &[("a.png".to_string(), "Análisis general".to_string())],
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("\n✓ Gráfica guardada: a.png\n✓ Gráfica guardada: b.png\n"));
        assert!(text.contains("Se han generado 1 archivos de gráficas:"));
        assert!(text.contains("  1. a.png - Análisis general\n"));
    }
}
