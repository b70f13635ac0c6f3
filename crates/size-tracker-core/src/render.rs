//! Trend chart rendering.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;

use crate::compare::Report;
use crate::error::RenderError;
use crate::units::format_bytes;

/// Default chart output file, relative to the working directory.
pub const DEFAULT_CHART_PATH: &str = "graph.svg";

const CHART_SIZE: (u32, u32) = (1280, 640);

/// Render the raw size series and its moving average as an SVG chart.
pub fn render_chart(report: &Report, path: &Path) -> Result<(), RenderError> {
    if report.series.is_empty() {
        return Err(RenderError::EmptySeries);
    }

    let (start, end) = time_bounds(report);
    let (low, high) = size_bounds(report);

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| draw_error(path, &e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Binary Sizes", ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(180)
        .build_cartesian_2d(RangedDateTime::from(start..end), low..high)
        .map_err(|e| draw_error(path, &e))?;

    chart
        .configure_mesh()
        .x_desc("Commit Time")
        .y_desc("Binary Size")
        .x_labels(8)
        .y_labels(8)
        .x_label_formatter(&|t: &DateTime<Utc>| t.format("%Y-%m-%d").to_string())
        .y_label_formatter(&|v: &f64| format_axis_size(*v))
        .draw()
        .map_err(|e| draw_error(path, &e))?;

    let raw: Vec<(DateTime<Utc>, f64)> = report
        .series
        .iter()
        .map(|p| (p.timestamp, p.size as f64))
        .collect();
    let smoothed: Vec<(DateTime<Utc>, f64)> = report
        .series
        .iter()
        .zip(&report.sma)
        .map(|(p, avg)| (p.timestamp, *avg))
        .collect();

    chart
        .draw_series(LineSeries::new(raw.clone(), BLUE.stroke_width(2)))
        .map_err(|e| draw_error(path, &e))?
        .label("Binary Sizes")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));
    chart
        .draw_series(PointSeries::of_element(raw, 3, BLUE.filled(), &|c, s, st| {
            Circle::new(c, s, st)
        }))
        .map_err(|e| draw_error(path, &e))?;
    chart
        .draw_series(DashedLineSeries::new(smoothed, 5, 5, RED.stroke_width(2)))
        .map_err(|e| draw_error(path, &e))?
        .label("Binary Sizes - SMA")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| draw_error(path, &e))?;

    root.present().map_err(|e| draw_error(path, &e))?;
    Ok(())
}

fn draw_error(path: &Path, err: &dyn std::fmt::Display) -> RenderError {
    RenderError::Draw {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Size axis label: `<human> (<raw> B)`.
pub fn format_axis_size(value: f64) -> String {
    let bytes = value.max(0.0).round() as u64;
    format!("{} ({bytes} B)", format_bytes(bytes))
}

fn time_bounds(report: &Report) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = report.series.first().map(|p| p.timestamp);
    let last = report.series.last().map(|p| p.timestamp);
    let (first, last) = match (first, last) {
        (Some(first), Some(last)) => (first, last),
        _ => (Utc::now(), Utc::now()),
    };
    let pad = ((last - first) / 20).max(Duration::hours(1));
    (first - pad, last + pad)
}

fn size_bounds(report: &Report) -> (f64, f64) {
    let values = report
        .series
        .iter()
        .map(|p| p.size as f64)
        .chain(report.sma.iter().copied());
    let (low, high) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = ((high - low) * 0.1).max(1024.0);
    ((low - pad).max(0.0), high + pad)
}
