use crate::climate::{self, ClimateSeries};
use crate::error::{AppError, AppResult};
use crate::metrics::SelectionMetrics;
use crate::models::SelectedLine;
use image::{ImageFormat, RgbImage};
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{register_font, FontStyle};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use std::sync::OnceLock;

/// Text is drawn with a bundled face so rendering never depends on host fonts
const FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
const FONT_FAMILY: &str = "sans-serif";

const WIDE: (u32, u32) = (1500, 600);
const GRID_2X2: (u32, u32) = (1500, 1000);
const STACKED: (u32, u32) = (1400, 1000);

const SERIES: RGBColor = RGBColor(31, 119, 180);
const BARS: RGBColor = RGBColor(120, 170, 210);
const BAR_EDGE: RGBColor = RGBColor(20, 20, 20);
const MEAN_LINE: RGBColor = RGBColor(214, 39, 40);
const OUTLIER: RGBColor = RGBColor(90, 90, 90);

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type Chart<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotType {
    LineLength,
    WordCount,
    Distribution,
    PositionAnalysis,
    RoomClimate,
}

impl PlotType {
    pub const ALL: [PlotType; 5] = [
        PlotType::LineLength,
        PlotType::WordCount,
        PlotType::Distribution,
        PlotType::PositionAnalysis,
        PlotType::RoomClimate,
    ];

    /// Plots that work on any selection; shown together on the plot page
    pub const SELECTION: [PlotType; 4] = [
        PlotType::LineLength,
        PlotType::WordCount,
        PlotType::Distribution,
        PlotType::PositionAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlotType::LineLength => "line_length",
            PlotType::WordCount => "word_count",
            PlotType::Distribution => "distribution",
            PlotType::PositionAnalysis => "position_analysis",
            PlotType::RoomClimate => "room_climate",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            PlotType::LineLength => "Line length",
            PlotType::WordCount => "Word count",
            PlotType::Distribution => "Content distribution",
            PlotType::PositionAnalysis => "Position analysis",
            PlotType::RoomClimate => "Room climate",
        }
    }
}

impl fmt::Display for PlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlotType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlotType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AppError::UnsupportedPlotType(s.to_string()))
    }
}

/// Render one plot of the selection as PNG bytes.
///
/// `RoomClimate` reads the selected lines as climate log readings and fails
/// with `Validation` when they don't parse.
pub fn render(plot_type: PlotType, selected: &[SelectedLine]) -> AppResult<Vec<u8>> {
    let metrics = || SelectionMetrics::from_selection(selected);
    let png = match plot_type {
        PlotType::LineLength => encode(WIDE, |root| line_length_figure(root, &metrics()))?,
        PlotType::WordCount => encode(WIDE, |root| word_count_figure(root, &metrics()))?,
        PlotType::Distribution => encode(GRID_2X2, |root| distribution_figure(root, &metrics()))?,
        PlotType::PositionAnalysis => encode(WIDE, |root| position_figure(root, &metrics()))?,
        PlotType::RoomClimate => {
            let series = ClimateSeries::from_selection(selected)?;
            encode(STACKED, |root| climate_figure(root, &series))?
        }
    };

    log::info!("Rendered {} plot for {} lines", plot_type, selected.len());
    Ok(png)
}

fn ensure_font() -> AppResult<()> {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    let ok = *REGISTERED
        .get_or_init(|| register_font(FONT_FAMILY, FontStyle::Normal, FONT).is_ok());
    if ok {
        Ok(())
    } else {
        Err(AppError::Render("bundled font could not be loaded".to_string()))
    }
}

/// Draw into an RGB buffer of `size` and encode it as PNG.
fn encode(
    size: (u32, u32),
    draw: impl FnOnce(&Area<'_>) -> AppResult<()>,
) -> AppResult<Vec<u8>> {
    ensure_font()?;

    let (width, height) = size;
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, size).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
    }

    let image = RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| AppError::Render("plot buffer does not match its size".to_string()))?;
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| AppError::Render(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Lengths over position with the mean, next to a histogram of lengths.
fn line_length_figure(root: &Area<'_>, metrics: &SelectionMetrics) -> AppResult<()> {
    let panels = root.split_evenly((1, 2));
    let xs = metrics.line_numbers();
    let lengths = metrics.lengths();
    let points = zip(&xs, &lengths);
    let x_range = bounds(&xs);

    let mut chart = panel(
        &panels[0],
        "Line Length Distribution",
        x_range,
        bounds_with(&lengths, metrics.mean_length),
    )?;
    chart
        .configure_mesh()
        .x_desc("Line Number")
        .y_desc("Character Count")
        .draw()?;
    chart.draw_series(LineSeries::new(points.clone(), SERIES.stroke_width(2)))?;
    chart.draw_series(points.iter().map(|&p| Circle::new(p, 4, SERIES.filled())))?;
    mean_line(&mut chart, x_range, metrics.mean_length, "Average")?;

    histogram_panel(&panels[1], "Line Length Histogram", "Character Count", &lengths, 30)
}

/// Word counts over position with the mean, next to a box plot.
fn word_count_figure(root: &Area<'_>, metrics: &SelectionMetrics) -> AppResult<()> {
    let panels = root.split_evenly((1, 2));
    let xs = metrics.line_numbers();
    let words = metrics.word_counts();
    let x_range = bounds(&xs);

    let mut chart = panel(
        &panels[0],
        "Word Count per Line",
        x_range,
        bounds_with(&words, metrics.mean_word_count),
    )?;
    chart
        .configure_mesh()
        .x_desc("Line Number")
        .y_desc("Word Count")
        .draw()?;
    chart.draw_series(
        zip(&xs, &words)
            .into_iter()
            .map(|p| Circle::new(p, 5, SERIES.mix(0.6).filled())),
    )?;
    mean_line(&mut chart, x_range, metrics.mean_word_count, "Average")?;

    boxplot_panel(&panels[1], "Word Count Distribution", "Word Count", &words)
}

/// 2x2: length vs words with trend, chars-per-word histogram,
/// selected line positions, and the length trend across selections.
fn distribution_figure(root: &Area<'_>, metrics: &SelectionMetrics) -> AppResult<()> {
    let panels = root.split_evenly((2, 2));
    let lengths = metrics.lengths();
    let words = metrics.word_counts();

    let mut chart = panel(
        &panels[0],
        "Character Count vs Word Count",
        bounds(&lengths),
        bounds(&words),
    )?;
    chart
        .configure_mesh()
        .x_desc("Character Count")
        .y_desc("Word Count")
        .draw()?;
    chart.draw_series(
        zip(&lengths, &words)
            .into_iter()
            .map(|p| Circle::new(p, 5, SERIES.mix(0.6).filled())),
    )?;
    if let (Some(fit), Some((lo, hi))) = (metrics.trend, min_max(&lengths)) {
        chart.draw_series(
            dashes((lo, fit.at(lo)), (hi, fit.at(hi)), 30)
                .into_iter()
                .map(|segment| PathElement::new(segment, MEAN_LINE.stroke_width(2))),
        )?;
    }

    histogram_panel(
        &panels[1],
        "Character/Word Ratio Distribution",
        "Average Characters per Word",
        &metrics.chars_per_word(),
        20,
    )?;

    let order: Vec<f64> = (1..=metrics.lines.len()).map(|i| i as f64).collect();
    let mut sorted = metrics.line_numbers();
    sorted.sort_by(f64::total_cmp);
    let mut chart = panel(
        &panels[2],
        "Selected Lines Distribution",
        bounds(&order),
        bounds(&sorted),
    )?;
    chart
        .configure_mesh()
        .x_desc("Selection Order")
        .y_desc("Original Line Number")
        .draw()?;
    let points = zip(&order, &sorted);
    chart.draw_series(LineSeries::new(points.clone(), SERIES.stroke_width(2)))?;
    chart.draw_series(points.iter().map(|&p| Circle::new(p, 3, SERIES.filled())))?;

    let index: Vec<f64> = (0..metrics.lines.len()).map(|i| i as f64).collect();
    let mut chart = panel(
        &panels[3],
        "Length Trend Across Selections",
        bounds(&index),
        bounds(&lengths),
    )?;
    chart
        .configure_mesh()
        .x_desc("Selection Index")
        .y_desc("Character Count")
        .draw()?;
    chart.draw_series(LineSeries::new(zip(&index, &lengths), SERIES.stroke_width(2)))?;

    Ok(())
}

/// Selection order against line number, next to the gaps between selections.
fn position_figure(root: &Area<'_>, metrics: &SelectionMetrics) -> AppResult<()> {
    let panels = root.split_evenly((1, 2));
    let xs = metrics.line_numbers();
    let order: Vec<f64> = (0..metrics.lines.len()).map(|i| i as f64).collect();

    let mut chart = panel(
        &panels[0],
        "Selection Pattern Analysis",
        bounds(&xs),
        bounds(&order),
    )?;
    chart
        .configure_mesh()
        .x_desc("Original Line Number")
        .y_desc("Selection Order")
        .draw()?;
    chart.draw_series(
        zip(&xs, &order)
            .into_iter()
            .map(|p| Circle::new(p, 5, SERIES.mix(0.6).filled())),
    )?;

    let Some(mean_gap) = metrics.mean_gap else {
        let mut chart = panel(&panels[1], "Gap Analysis", (0.0, 1.0), (0.0, 1.0))?;
        let style = TextStyle::from((FONT_FAMILY, 18).into_font())
            .pos(Pos::new(HPos::Center, VPos::Center));
        chart.draw_series(std::iter::once(Text::new(
            "Not enough data for gap analysis",
            (0.5, 0.5),
            style,
        )))?;
        return Ok(());
    };

    let gaps: Vec<f64> = metrics.gaps.iter().map(|&g| g as f64).collect();
    let x_range = (-0.5, gaps.len() as f64 - 0.5);
    let (gap_lo, gap_hi) = bounds_with(&gaps, mean_gap);
    let mut chart = panel(
        &panels[1],
        "Gaps Between Selected Lines",
        x_range,
        (gap_lo.min(0.0), gap_hi),
    )?;
    chart
        .configure_mesh()
        .x_desc("Gap Index")
        .y_desc("Line Number Gap")
        .draw()?;
    chart.draw_series(gaps.iter().enumerate().map(|(i, &gap)| {
        let x = i as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, gap)], BARS.filled())
    }))?;
    mean_line(&mut chart, x_range, mean_gap, "Average Gap")?;

    Ok(())
}

/// Temperature, pressure and humidity stacked over the time of day.
fn climate_figure(root: &Area<'_>, series: &ClimateSeries) -> AppResult<()> {
    let time_label = |secs: &f64| climate::clock(*secs);
    let panels = root.split_evenly((3, 1));
    let times = series.times();
    let x_range = bounds(&times);

    let rows = [
        ("Temperature in °C", "°C", series.temperatures(), RED),
        ("Pressure in hPa", "hPa", series.pressures(), BLACK),
        ("Humidity in %", "%", series.humidities(), BLUE),
    ];
    let last = rows.len() - 1;

    for (i, (title, unit, values, color)) in rows.into_iter().enumerate() {
        let mut chart = panel(&panels[i], title, x_range, bounds(&values))?;
        let mut mesh = chart.configure_mesh();
        mesh.y_desc(unit).x_label_formatter(&time_label);
        if i == last {
            mesh.x_desc("Time of day");
        }
        mesh.draw()?;

        chart.draw_series(LineSeries::new(zip(&times, &values), color.stroke_width(2)))?;
    }

    Ok(())
}

fn panel<'a, 'b>(
    area: &'a Area<'b>,
    title: &str,
    x_range: (f64, f64),
    y_range: (f64, f64),
) -> AppResult<Chart<'a, 'b>> {
    let chart = ChartBuilder::on(area)
        .caption(title, (FONT_FAMILY, 22).into_font())
        .margin(12)
        .x_label_area_size(48)
        .y_label_area_size(64)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)?;
    Ok(chart)
}

/// Dashed horizontal line at `y`, listed in the legend as "`label`: value"
fn mean_line<'a, 'b: 'a>(
    chart: &mut Chart<'a, 'b>,
    x_range: (f64, f64),
    y: f64,
    label: &str,
) -> AppResult<()> {
    chart
        .draw_series(
            dashes((x_range.0, y), (x_range.1, y), 40)
                .into_iter()
                .map(|segment| PathElement::new(segment, MEAN_LINE.stroke_width(2))),
        )?
        .label(format!("{}: {:.1}", label, y))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], MEAN_LINE.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn histogram_panel(
    area: &Area<'_>,
    title: &str,
    x_desc: &str,
    values: &[f64],
    bins: usize,
) -> AppResult<()> {
    let (edges, counts) = histogram(values, bins);
    let max_count = counts.iter().copied().max().unwrap_or(0).max(1) as f64;
    let x_range = match (edges.first(), edges.last()) {
        (Some(&lo), Some(&hi)) => (lo, hi),
        _ => (0.0, 1.0),
    };

    let mut chart = panel(area, title, x_range, (0.0, max_count * 1.05))?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Frequency")
        .draw()?;

    let bars: Vec<[(f64, f64); 2]> = counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(i, &count)| [(edges[i], 0.0), (edges[i + 1], count as f64)])
        .collect();
    chart.draw_series(bars.iter().map(|&bar| Rectangle::new(bar, BARS.filled())))?;
    chart.draw_series(
        bars.iter()
            .map(|&bar| Rectangle::new(bar, BAR_EDGE.stroke_width(1))),
    )?;
    Ok(())
}

fn boxplot_panel(area: &Area<'_>, title: &str, y_desc: &str, values: &[f64]) -> AppResult<()> {
    let Some(summary) = BoxSummary::of(values) else {
        panel(area, title, (0.0, 1.0), (0.0, 1.0))?;
        return Ok(());
    };

    let mut chart = panel(area, title, (0.0, 2.0), bounds(values))?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .y_desc(y_desc)
        .draw()?;

    let edge = BAR_EDGE.stroke_width(2);
    chart.draw_series([
        PathElement::new(vec![(0.85, summary.lower_whisker), (1.15, summary.lower_whisker)], edge),
        PathElement::new(vec![(0.85, summary.upper_whisker), (1.15, summary.upper_whisker)], edge),
        PathElement::new(vec![(1.0, summary.q3), (1.0, summary.upper_whisker)], edge),
        PathElement::new(vec![(1.0, summary.q1), (1.0, summary.lower_whisker)], edge),
        PathElement::new(
            vec![(0.7, summary.median), (1.3, summary.median)],
            MEAN_LINE.stroke_width(2),
        ),
    ])?;
    chart.draw_series(std::iter::once(Rectangle::new(
        [(0.7, summary.q1), (1.3, summary.q3)],
        SERIES.stroke_width(2),
    )))?;
    chart.draw_series(
        summary
            .outliers
            .iter()
            .map(|&y| Circle::new((1.0, y), 4, OUTLIER.stroke_width(1))),
    )?;
    Ok(())
}

/// Quartiles with whiskers at the furthest data within 1.5 IQR
#[derive(Debug, Clone, PartialEq)]
struct BoxSummary {
    q1: f64,
    median: f64,
    q3: f64,
    lower_whisker: f64,
    upper_whisker: f64,
    outliers: Vec<f64>,
}

impl BoxSummary {
    fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q1 = percentile(&sorted, 0.25);
        let median = percentile(&sorted, 0.5);
        let q3 = percentile(&sorted, 0.75);
        let reach = 1.5 * (q3 - q1);

        let (inside, outliers): (Vec<f64>, Vec<f64>) = sorted
            .into_iter()
            .partition(|&v| v >= q1 - reach && v <= q3 + reach);

        Some(Self {
            q1,
            median,
            q3,
            lower_whisker: inside.first().copied().unwrap_or(q1),
            upper_whisker: inside.last().copied().unwrap_or(q3),
            outliers,
        })
    }
}

/// Linear-interpolated percentile of sorted data, `q` in [0, 1]
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Equal-width bins over the data range. A constant series is spread over
/// a unit-wide range around its value.
fn histogram(values: &[f64], bins: usize) -> (Vec<f64>, Vec<usize>) {
    let bins = bins.max(1);
    let (lo, hi) = match min_max(values) {
        Some((lo, hi)) if lo < hi => (lo, hi),
        Some((v, _)) => (v - 0.5, v + 0.5),
        None => (0.0, 1.0),
    };

    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0; bins];
    for &v in values {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    (edges, counts)
}

/// The straight line `from`-`to` cut into `count` dashes
fn dashes(from: (f64, f64), to: (f64, f64), count: usize) -> Vec<Vec<(f64, f64)>> {
    let at = |t: f64| (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t);
    (0..count)
        .map(|i| {
            let start = i as f64 / count as f64;
            let end = (i as f64 + 0.6) / count as f64;
            vec![at(start), at(end)]
        })
        .collect()
}

fn zip(xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
    xs.iter().copied().zip(ys.iter().copied()).collect()
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let lo = values.iter().copied().reduce(f64::min)?;
    let hi = values.iter().copied().reduce(f64::max)?;
    Some((lo, hi))
}

/// Padded axis range for the data
fn bounds(values: &[f64]) -> (f64, f64) {
    match min_max(values) {
        Some((lo, hi)) if lo < hi => {
            let pad = (hi - lo) * 0.05;
            (lo - pad, hi + pad)
        }
        Some((v, _)) => (v - 1.0, v + 1.0),
        None => (0.0, 1.0),
    }
}

/// Padded axis range that also covers `extra` (e.g. a mean line)
fn bounds_with(values: &[f64], extra: f64) -> (f64, f64) {
    let mut all = values.to_vec();
    all.push(extra);
    bounds(&all)
}
