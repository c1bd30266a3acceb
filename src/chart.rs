use std::io::Write;

use crate::models::{Reason, StatsResponse};

/// One line of the chart
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub data: Vec<f64>,
    pub fill: bool,
    pub border_width: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Series>,
}

/// Line chart setup: the data plus axis titles
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub data: ChartData,
    pub x_title: String,
    pub y_title: String,
}

/// A chart that has already been drawn and can be redrawn in place
pub trait Chart {
    fn data_mut(&mut self) -> &mut ChartData;
    fn update(&mut self);
}

/// Where charts get drawn. Creating a chart renders it immediately.
pub trait ChartSurface {
    type Chart: Chart;

    fn create_chart(&mut self, config: ChartConfig) -> Self::Chart;
}

/// Dates on the x-axis, ascending
pub fn date_labels(stats: &StatsResponse) -> Vec<String> {
    let mut labels: Vec<String> = stats.daily_stats.keys().cloned().collect();
    labels.sort();
    labels
}

/// Minutes for one reason across `labels`, zero where the date has no entry
pub fn series_values(stats: &StatsResponse, labels: &[String], reason: Reason) -> Vec<f64> {
    labels
        .iter()
        .map(|date| {
            stats
                .daily_stats
                .get(date)
                .and_then(|day| day.get(reason.as_str()))
                .copied()
                .unwrap_or(0.0)
        })
        .collect()
}

/// Chart contents for a stats reply: one series per reason, one point per date
pub fn chart_data(stats: &StatsResponse) -> ChartData {
    let labels = date_labels(stats);
    let datasets = Reason::ALL
        .iter()
        .map(|&reason| Series {
            label: reason.as_str().to_string(),
            data: series_values(stats, &labels, reason),
            fill: false,
            border_width: 2,
        })
        .collect();

    ChartData { labels, datasets }
}

pub fn line_chart_config(data: ChartData) -> ChartConfig {
    ChartConfig {
        data,
        x_title: "Date".to_string(),
        y_title: "Delay Duration (minutes)".to_string(),
    }
}

const BAR_WIDTH: usize = 30;

/// Renders a chart as a date-by-reason table with a bar for each day's total.
pub fn render_text(config: &ChartConfig) -> String {
    let data = &config.data;
    let mut out = String::new();

    out.push_str(&format!("{} by {}\n", config.y_title, config.x_title));
    if data.labels.is_empty() {
        out.push_str("  (no finished delays yet)\n");
        return out;
    }

    out.push_str(&format!("  {:<10}", config.x_title));
    for series in &data.datasets {
        out.push_str(&format!(" | {:>20}", series.label));
    }
    out.push('\n');

    let totals: Vec<f64> = (0..data.labels.len())
        .map(|i| {
            data.datasets
                .iter()
                .map(|s| s.data.get(i).copied().unwrap_or(0.0))
                .sum()
        })
        .collect();
    let max = totals.iter().copied().fold(0.0_f64, f64::max);

    for (i, label) in data.labels.iter().enumerate() {
        out.push_str(&format!("  {:<10}", label));
        for series in &data.datasets {
            let value = series.data.get(i).copied().unwrap_or(0.0);
            out.push_str(&format!(" | {:>20.2}", value));
        }
        let width = if max > 0.0 {
            ((totals[i] / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        out.push_str(&format!("  {}\n", "#".repeat(width)));
    }

    out
}

/// Text chart written to a terminal
pub struct TextChart<W: Write> {
    config: ChartConfig,
    out: W,
}

impl<W: Write> TextChart<W> {
    fn draw(&mut self) {
        let text = render_text(&self.config);
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::warn!("failed to draw chart: {}", e);
        }
    }
}

impl<W: Write> Chart for TextChart<W> {
    fn data_mut(&mut self) -> &mut ChartData {
        &mut self.config.data
    }

    fn update(&mut self) {
        self.draw();
    }
}

/// Surface handing out text charts that print to stdout
pub struct TextChartSurface;

impl ChartSurface for TextChartSurface {
    type Chart = TextChart<std::io::Stdout>;

    fn create_chart(&mut self, config: ChartConfig) -> Self::Chart {
        let mut chart = TextChart {
            config,
            out: std::io::stdout(),
        };
        chart.draw();
        chart
    }
}
