//! SVG chart of the price series with the best result's cash-out events.
//!
//! Losses are drawn as red vertical lines, profits as green ones.

use std::fs;
use std::path::Path;

use crate::domain::error::CashoutError;
use crate::domain::optimizer::OptimizationResult;
use crate::domain::price_series::PriceSeries;
use crate::domain::simulation::{CashoutEvent, SimulationResult};
use crate::ports::report_port::ReportPort;

const WIDTH: f64 = 900.0;
const HEIGHT: f64 = 360.0;
const PADDING: f64 = 40.0;

const LOSS_COLOR: &str = "red";
const PROFIT_COLOR: &str = "green";

pub struct SvgChartAdapter;

impl ReportPort for SvgChartAdapter {
    fn write(
        &self,
        series: &PriceSeries,
        result: &OptimizationResult,
        output_path: &Path,
    ) -> Result<(), CashoutError> {
        let svg = render_chart(series, result.best());
        fs::write(output_path, svg).map_err(|e| CashoutError::Report {
            reason: format!("failed to write {}: {}", output_path.display(), e),
        })
    }

    fn default_file_name(&self) -> &'static str {
        "best.svg"
    }
}

/// Maps dates and prices onto the plot area.
struct Scale {
    origin: chrono::NaiveDate,
    span_days: f64,
    min_value: f64,
    value_range: f64,
}

impl Scale {
    fn new(series: &PriceSeries) -> Option<Self> {
        let first = series.first()?;
        let last = series.last()?;
        let (min_value, max_value) = series.value_range();
        Some(Self {
            origin: first.date,
            span_days: (last.date - first.date).num_days() as f64,
            min_value,
            value_range: max_value - min_value,
        })
    }

    fn x(&self, date: chrono::NaiveDate) -> f64 {
        let plot_width = WIDTH - 2.0 * PADDING;
        if self.span_days > 0.0 {
            PADDING + (date - self.origin).num_days() as f64 / self.span_days * plot_width
        } else {
            PADDING
        }
    }

    fn y(&self, value: f64) -> f64 {
        let plot_height = HEIGHT - 2.0 * PADDING;
        if self.value_range > 0.0 {
            HEIGHT - PADDING - (value - self.min_value) / self.value_range * plot_height
        } else {
            HEIGHT / 2.0
        }
    }
}

fn event_lines(scale: &Scale, events: &[CashoutEvent], color: &str, out: &mut String) {
    for event in events {
        let x = scale.x(event.date);
        out.push_str(&format!(
            r#"  <line x1="{x:.1}" y1="{top:.1}" x2="{x:.1}" y2="{bottom:.1}" stroke="{color}" stroke-width="1"><title>{date} {amount:.2}</title></line>
"#,
            top = PADDING,
            bottom = HEIGHT - PADDING,
            date = event.date,
            amount = event.amount,
        ));
    }
}

fn title(best: Option<&SimulationResult>) -> String {
    match best {
        Some(r) => {
            let p = &r.parameters;
            format!(
                "total {:.2} | upper {} | lower {} | holdout {}",
                r.total_cashout, p.upper_cashout_boundary, p.lower_cashout_boundary, p.max_holdout
            )
        }
        None => "no results".to_string(),
    }
}

/// Renders a standalone SVG document. Without a best result only the price
/// line is drawn.
pub fn render_chart(series: &PriceSeries, best: Option<&SimulationResult>) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH:.0}" height="{HEIGHT:.0}" viewBox="0 0 {WIDTH:.0} {HEIGHT:.0}">
  <rect width="100%" height="100%" fill="white"/>
  <text x="{PADDING:.0}" y="{title_y:.0}" font-family="sans-serif" font-size="13">{title}</text>
  <line x1="{PADDING:.0}" y1="{PADDING:.0}" x2="{PADDING:.0}" y2="{axis_y:.0}" stroke="black"/>
  <line x1="{PADDING:.0}" y1="{axis_y:.0}" x2="{axis_x:.0}" y2="{axis_y:.0}" stroke="black"/>
"#,
        title_y = PADDING / 2.0,
        title = title(best),
        axis_y = HEIGHT - PADDING,
        axis_x = WIDTH - PADDING,
    );

    let Some(scale) = Scale::new(series) else {
        svg.push_str("</svg>\n");
        return svg;
    };

    let points: Vec<String> = series
        .iter()
        .map(|o| format!("{:.1},{:.1}", scale.x(o.date), scale.y(o.value)))
        .collect();
    svg.push_str(&format!(
        "  <polyline fill=\"none\" stroke=\"steelblue\" stroke-width=\"1\" points=\"{}\"/>\n",
        points.join(" ")
    ));

    if let Some(best) = best {
        event_lines(&scale, &best.loss_events, LOSS_COLOR, &mut svg);
        event_lines(&scale, &best.profit_events, PROFIT_COLOR, &mut svg);
    }

    svg.push_str("</svg>\n");
    svg
}
