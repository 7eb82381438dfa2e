// Drawing of figure descriptions with the plotters bitmap backend.
//
// Categorical axes are plain `f64` axes where category `i` sits at `x = i`;
// tick labels are mapped back to category names by a label formatter.

use crate::aggregate::{BoxStats, HistogramBin};
use crate::error::{AnalysisError, Result};
use crate::figures::{BarSeries, FigureSpec, Panel, PanelKind, ReferenceLine, ScatterGroup, ValueAxis};
use crate::util::format_thousands_axis;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::debug;

type DrawResult<DB> = core::result::Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;
type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const BAR_WIDTH: f64 = 0.8;

/// Point sizes converted to pixels at the figure's density.
#[derive(Debug, Clone, Copy)]
struct Scale {
    dpi: u32,
}

impl Scale {
    fn px(&self, points: f64) -> u32 {
        (points * self.dpi as f64 / 72.0).round().max(1.0) as u32
    }

    fn font(&self, points: f64) -> (&'static str, f64) {
        ("sans-serif", self.px(points) as f64)
    }

    fn title_font(&self) -> FontDesc<'static> {
        ("sans-serif", self.px(12.0) as f64)
            .into_font()
            .style(FontStyle::Bold)
    }
}

/// Render one figure into `dir`, overwriting any previous file.
pub fn render_figure(spec: &FigureSpec, dir: &Path, dpi: u32) -> Result<PathBuf> {
    let path = dir.join(spec.file_name);
    {
        let root = BitMapBackend::new(&path, spec.pixel_size(dpi)).into_drawing_area();
        draw_figure(&root, spec, Scale { dpi })?;
    }
    Ok(path)
}

fn draw_figure<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &FigureSpec,
    scale: Scale,
) -> Result<()> {
    let to_error = |e: &dyn std::fmt::Display| AnalysisError::Render {
        figure: spec.file_name.to_string(),
        message: e.to_string(),
    };

    root.fill(&WHITE).map_err(|e| to_error(&e))?;
    let areas = root.split_evenly(spec.grid);
    for (panel, area) in spec.panels.iter().zip(areas.iter()) {
        debug!(
            figure = spec.file_name,
            panel = %panel.title,
            chart = panel.kind.chart_type(),
            categories = panel.kind.labels().len(),
            "drawing panel"
        );
        draw_panel(area, panel, scale).map_err(|e| to_error(&e))?;
    }
    root.present().map_err(|e| to_error(&e))?;
    Ok(())
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    scale: Scale,
) -> DrawResult<DB> {
    match &panel.kind {
        PanelKind::Bar {
            labels,
            values,
            colors,
            opacity,
            axis,
            reference,
        } => draw_bar(
            area,
            panel,
            labels,
            values,
            colors,
            *opacity,
            *axis,
            reference.as_ref(),
            scale,
        ),
        PanelKind::HorizontalBar {
            labels,
            values,
            color,
            opacity,
        } => draw_horizontal_bar(area, panel, labels, values, *color, *opacity, scale),
        PanelKind::GroupedBar {
            labels,
            series,
            opacity,
        } => draw_grouped_bar(area, panel, labels, series, *opacity, scale),
        PanelKind::Scatter {
            groups,
            point_size,
            opacity,
        } => draw_scatter(area, panel, groups, *point_size, *opacity, scale),
        PanelKind::BoxPlot { labels, boxes } => draw_box_plot(area, panel, labels, boxes, scale),
        PanelKind::Line {
            labels,
            values,
            color,
        } => draw_line(area, panel, labels, values, *color, scale),
        PanelKind::Histogram {
            bins,
            color,
            opacity,
            reference,
        } => draw_histogram(area, panel, bins, *color, *opacity, reference.as_ref(), scale),
        PanelKind::Pie {
            labels,
            values,
            colors,
        } => draw_pie(area, panel, labels, values, colors, scale),
    }
}

fn category_range(n: usize) -> Range<f64> {
    -0.5..(n.max(1) as f64 - 0.5)
}

/// Name of the category at tick `x`, or nothing between categories.
fn category_label(labels: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

/// Value axis covering zero and every value, padded by 5%.
fn value_range<I: IntoIterator<Item = f64>>(values: I) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    padded(lo, hi)
}

fn padded(lo: f64, hi: f64) -> Range<f64> {
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 1.0)..(hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad)..(hi + pad)
}

fn axis_formatter(axis: ValueAxis) -> fn(&f64) -> String {
    match axis {
        ValueAxis::Plain => |v| format!("{}", (v * 100.0).round() / 100.0),
        ValueAxis::Thousands => |v| format_thousands_axis(*v),
    }
}

fn build_chart<'a, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    panel: &Panel,
    x: Range<f64>,
    y: Range<f64>,
    scale: Scale,
) -> core::result::Result<Chart<'a, DB>, DrawingAreaErrorKind<DB::ErrorType>> {
    ChartBuilder::on(area)
        .caption(&panel.title, scale.title_font())
        .margin(scale.px(6.0))
        .x_label_area_size(scale.px(30.0))
        .y_label_area_size(scale.px(48.0))
        .build_cartesian_2d(x, y)
}

fn draw_legend<'a, DB: DrawingBackend + 'a>(chart: &mut Chart<'a, DB>, scale: Scale) -> DrawResult<DB> {
    chart
        .configure_series_labels()
        .label_font(scale.font(8.0))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
}

/// Draw a reference line across `extent`. Returns whether it added a legend entry.
fn draw_reference<'a, DB: DrawingBackend + 'a>(
    chart: &mut Chart<'a, DB>,
    line: &ReferenceLine,
    horizontal: bool,
    extent: Range<f64>,
    scale: Scale,
) -> core::result::Result<bool, DrawingAreaErrorKind<DB::ErrorType>> {
    let points = if horizontal {
        vec![(extent.start, line.value), (extent.end, line.value)]
    } else {
        vec![(line.value, extent.start), (line.value, extent.end)]
    };
    let style = ShapeStyle::from(&line.color).stroke_width(scale.px(if line.dashed { 2.0 } else { 0.8 }));
    let anno = if line.dashed {
        chart.draw_series(DashedLineSeries::new(points, scale.px(6.0), scale.px(3.0), style))?
    } else {
        chart.draw_series(LineSeries::new(points, style))?
    };
    match &line.label {
        Some(label) => {
            anno.label(label.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
            Ok(true)
        }
        None => Ok(false),
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_bar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    labels: &[String],
    values: &[f64],
    colors: &[RGBColor],
    opacity: f64,
    axis: ValueAxis,
    reference: Option<&ReferenceLine>,
    scale: Scale,
) -> DrawResult<DB> {
    let x_range = category_range(labels.len());
    let y_range = value_range(values.iter().copied().chain(reference.map(|r| r.value)));
    let mut chart = build_chart(area, panel, x_range.clone(), y_range, scale)?;

    let x_fmt = |x: &f64| category_label(labels, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len() + 1)
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&axis_formatter(axis))
        .x_desc(panel.x_desc.as_str())
        .y_desc(panel.y_desc.as_str())
        .label_style(scale.font(8.0))
        .axis_desc_style(scale.font(9.0))
        .draw()?;

    let half = BAR_WIDTH / 2.0;
    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        let color = colors
            .get(i % colors.len().max(1))
            .copied()
            .unwrap_or(BLACK);
        let x = i as f64;
        Rectangle::new([(x - half, 0.0), (x + half, *v)], color.mix(opacity).filled())
    }))?;

    if let Some(line) = reference {
        if draw_reference(&mut chart, line, true, x_range, scale)? {
            draw_legend(&mut chart, scale)?;
        }
    }
    Ok(())
}

fn draw_horizontal_bar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    labels: &[String],
    values: &[f64],
    color: RGBColor,
    opacity: f64,
    scale: Scale,
) -> DrawResult<DB> {
    let x_range = value_range(values.iter().copied());
    let y_range = category_range(labels.len());
    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, scale.title_font())
        .margin(scale.px(6.0))
        .x_label_area_size(scale.px(30.0))
        .y_label_area_size(scale.px(80.0))
        .build_cartesian_2d(x_range, y_range)?;

    let y_fmt = |y: &f64| category_label(labels, *y);
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(labels.len() + 1)
        .y_label_formatter(&y_fmt)
        .x_label_formatter(&axis_formatter(ValueAxis::Plain))
        .x_desc(panel.x_desc.as_str())
        .y_desc(panel.y_desc.as_str())
        .label_style(scale.font(8.0))
        .axis_desc_style(scale.font(9.0))
        .draw()?;

    let half = BAR_WIDTH / 2.0;
    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        let y = i as f64;
        Rectangle::new([(0.0, y - half), (*v, y + half)], color.mix(opacity).filled())
    }))?;
    Ok(())
}

fn draw_grouped_bar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    labels: &[String],
    series: &[BarSeries],
    opacity: f64,
    scale: Scale,
) -> DrawResult<DB> {
    let y_range = value_range(series.iter().flat_map(|s| s.values.iter().copied()));
    let mut chart = build_chart(area, panel, category_range(labels.len()), y_range, scale)?;

    let x_fmt = |x: &f64| category_label(labels, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len() + 1)
        .x_label_formatter(&x_fmt)
        .x_desc(panel.x_desc.as_str())
        .y_desc(panel.y_desc.as_str())
        .label_style(scale.font(8.0))
        .axis_desc_style(scale.font(9.0))
        .draw()?;

    let width = BAR_WIDTH / series.len().max(1) as f64;
    for (s_idx, s) in series.iter().enumerate() {
        let offset = -BAR_WIDTH / 2.0 + width * s_idx as f64;
        let fill = s.color.mix(opacity).filled();
        chart
            .draw_series(s.values.iter().enumerate().map(|(i, v)| {
                let x0 = i as f64 + offset;
                Rectangle::new([(x0, 0.0), (x0 + width, *v)], fill)
            }))?
            .label(s.name.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], fill));
    }
    draw_legend(&mut chart, scale)
}

fn draw_scatter<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    groups: &[ScatterGroup],
    point_size: u32,
    opacity: f64,
    scale: Scale,
) -> DrawResult<DB> {
    let points = || groups.iter().flat_map(|g| g.points.iter().copied());
    let x_range = value_range(points().map(|(x, _)| x));
    let y_range = value_range(points().map(|(_, y)| y));
    let mut chart = build_chart(area, panel, x_range, y_range, scale)?;

    chart
        .configure_mesh()
        .x_desc(panel.x_desc.as_str())
        .y_desc(panel.y_desc.as_str())
        .label_style(scale.font(8.0))
        .axis_desc_style(scale.font(9.0))
        .draw()?;

    let radius = scale.px(point_size as f64);
    for g in groups {
        let style = g.color.mix(opacity).filled();
        let legend_color = g.color;
        chart
            .draw_series(g.points.iter().map(|p| Circle::new(*p, radius, style)))?
            .label(g.name.clone())
            .legend(move |(x, y)| Circle::new((x + 8, y), 4, legend_color.filled()));
    }
    draw_legend(&mut chart, scale)
}

fn draw_box_plot<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    labels: &[String],
    boxes: &[BoxStats],
    scale: Scale,
) -> DrawResult<DB> {
    let y_range = {
        let (lo, hi) = boxes
            .iter()
            .map(BoxStats::extent)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
                (lo.min(a), hi.max(b))
            });
        if lo.is_finite() && hi.is_finite() {
            padded(lo, hi)
        } else {
            0.0..1.0
        }
    };
    let mut chart = build_chart(area, panel, category_range(labels.len()), y_range, scale)?;

    let x_fmt = |x: &f64| category_label(labels, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len() + 1)
        .x_label_formatter(&x_fmt)
        .x_desc(panel.x_desc.as_str())
        .y_desc(panel.y_desc.as_str())
        .label_style(scale.font(8.0))
        .axis_desc_style(scale.font(9.0))
        .draw()?;

    let stroke = scale.px(1.0);
    let box_style = BLUE.stroke_width(stroke);
    let median_style = GREEN.stroke_width(stroke);
    let (half, cap) = (0.25, 0.125);
    for (i, b) in boxes.iter().enumerate() {
        let x = i as f64;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - half, b.q1), (x + half, b.q3)],
            box_style,
        )))?;
        chart.draw_series(vec![
            PathElement::new(vec![(x, b.whisker_low), (x, b.q1)], BLACK.stroke_width(stroke)),
            PathElement::new(vec![(x, b.q3), (x, b.whisker_high)], BLACK.stroke_width(stroke)),
            PathElement::new(
                vec![(x - cap, b.whisker_low), (x + cap, b.whisker_low)],
                BLACK.stroke_width(stroke),
            ),
            PathElement::new(
                vec![(x - cap, b.whisker_high), (x + cap, b.whisker_high)],
                BLACK.stroke_width(stroke),
            ),
            PathElement::new(vec![(x - half, b.median), (x + half, b.median)], median_style),
        ])?;
        chart.draw_series(
            b.outliers
                .iter()
                .map(|o| Circle::new((x, *o), scale.px(2.0), BLACK.stroke_width(stroke))),
        )?;
    }
    Ok(())
}

fn draw_line<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    labels: &[String],
    values: &[f64],
    color: RGBColor,
    scale: Scale,
) -> DrawResult<DB> {
    let mut chart = build_chart(
        area,
        panel,
        category_range(labels.len()),
        value_range(values.iter().copied()),
        scale,
    )?;

    let x_fmt = |x: &f64| category_label(labels, *x);
    chart
        .configure_mesh()
        .x_labels(labels.len() + 1)
        .x_label_formatter(&x_fmt)
        .light_line_style(BLACK.mix(0.05))
        .bold_line_style(BLACK.mix(0.3))
        .x_desc(panel.x_desc.as_str())
        .y_desc(panel.y_desc.as_str())
        .label_style(scale.font(8.0))
        .axis_desc_style(scale.font(9.0))
        .draw()?;

    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64, *v))
        .collect();
    chart.draw_series(LineSeries::new(
        points.iter().copied(),
        color.stroke_width(scale.px(2.0)),
    ))?;
    chart.draw_series(
        points
            .iter()
            .map(|p| Circle::new(*p, scale.px(3.0), color.filled())),
    )?;
    Ok(())
}

fn draw_histogram<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    bins: &[HistogramBin],
    color: RGBColor,
    opacity: f64,
    reference: Option<&ReferenceLine>,
    scale: Scale,
) -> DrawResult<DB> {
    let x_lo = bins.first().map(|b| b.start).unwrap_or(0.0);
    let x_hi = bins.last().map(|b| b.end).unwrap_or(1.0);
    let x_range = padded(x_lo, x_hi);
    let y_max = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64;
    let y_range = 0.0..y_max * 1.1;
    let mut chart = build_chart(area, panel, x_range, y_range.clone(), scale)?;

    chart
        .configure_mesh()
        .x_desc(panel.x_desc.as_str())
        .y_desc(panel.y_desc.as_str())
        .label_style(scale.font(8.0))
        .axis_desc_style(scale.font(9.0))
        .draw()?;

    chart.draw_series(bins.iter().map(|b| {
        Rectangle::new(
            [(b.start, 0.0), (b.end, b.count as f64)],
            color.mix(opacity).filled(),
        )
    }))?;
    chart.draw_series(bins.iter().map(|b| {
        Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], BLACK.stroke_width(1))
    }))?;

    if let Some(line) = reference {
        if draw_reference(&mut chart, line, false, y_range, scale)? {
            draw_legend(&mut chart, scale)?;
        }
    }
    Ok(())
}

fn draw_pie<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    labels: &[String],
    values: &[f64],
    colors: &[RGBColor],
    scale: Scale,
) -> DrawResult<DB> {
    let inner = area.titled(&panel.title, scale.title_font())?;
    // Pie takes backend coordinates, not coordinates relative to the area.
    let (w, h) = inner.dim_in_pixel();
    let (bx, by) = inner.get_base_pixel();
    let center = (bx + (w / 2) as i32, by + (h / 2) as i32);
    let radius = w.min(h) as f64 * 0.35;

    let mut pie = Pie::new(&center, &radius, values, colors, labels);
    pie.start_angle(90.0);
    pie.label_style(scale.font(9.0));
    pie.percentages(scale.font(8.0).into_font().color(&BLACK));
    inner.draw(&pie)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figures::build_figures;
    use crate::loader::tests::three_row_table;

    fn labels() -> Vec<String> {
        vec!["A".to_string(), "B".to_string(), "C".to_string()]
    }

    #[test]
    fn test_category_label() {
        let labels = labels();
        assert_eq!(category_label(&labels, 0.0), "A");
        assert_eq!(category_label(&labels, 2.0), "C");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, 3.0), "");
        assert_eq!(category_label(&labels, -1.0), "");
    }

    #[test]
    fn test_value_range_includes_zero() {
        let r = value_range([10.0, 20.0]);
        assert!(r.start < 0.0 && r.end > 20.0);
        let r = value_range([-50.0, 250.0]);
        assert!(r.start < -50.0 && r.end > 250.0);
        let r = value_range(std::iter::empty());
        assert_eq!(r, -1.0..1.0);
    }

    #[test]
    fn test_scale_px() {
        let scale = Scale { dpi: 72 };
        assert_eq!(scale.px(12.0), 12);
        let scale = Scale { dpi: 300 };
        assert_eq!(scale.px(12.0), 50);
        assert_eq!(scale.px(0.0), 1);
    }

    #[test]
    fn test_axis_formatter() {
        assert_eq!(axis_formatter(ValueAxis::Thousands)(&25_000.0), "$25K");
        assert_eq!(axis_formatter(ValueAxis::Plain)(&1.256), "1.26");
    }

    fn is_white(buf: &[u8], width: u32, x: u32, y: u32) -> bool {
        let at = ((y * width + x) * 3) as usize;
        buf[at..at + 3] == [255, 255, 255]
    }

    #[test]
    fn test_pie_drawn_inside_its_cell() {
        let table = three_row_table();
        let dates = table.coerce_dates().unwrap();
        let figures = build_figures(&table.records, &dates);
        let summary = &figures[2];
        let (w, h) = summary.pixel_size(50);
        let mut buf = vec![0u8; (w * h * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (w, h)).into_drawing_area();
            draw_figure(&root, summary, Scale { dpi: 50 }).unwrap();
        }

        // Bottom-right cell of the 2x2 grid. The two equal slices meet on the
        // vertical through the centre, so sample inside the right slice.
        let (cell_w, cell_h) = (w / 2, h / 2);
        let x = cell_w + cell_w / 2 + cell_w / 8;
        let y = cell_h + cell_h / 2;
        assert!(!is_white(&buf, w, x, y));
    }

    #[test]
    fn test_render_all_figures_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let table = three_row_table();
        let dates = table.coerce_dates().unwrap();
        for spec in build_figures(&table.records, &dates) {
            let path = render_figure(&spec, dir.path(), 30).unwrap();
            assert_eq!(path, dir.path().join(spec.file_name));
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
    }
}
