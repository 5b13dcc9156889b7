//! Terminal charts for forecasts and loss curves.

/// A named series drawn with one glyph, starting at column `offset` in time steps.
#[derive(Debug, Clone)]
pub struct Series<'a> {
    /// Legend label.
    pub label: &'a str,
    /// Values in time order.
    pub values: &'a [f32],
    /// Time step of the first value.
    pub offset: usize,
    /// Glyph used for the points.
    pub glyph: char,
}

/// Render series on a shared time axis as a boxed character grid.
///
/// Later series overwrite earlier ones where they land on the same cell.
/// Non-finite values are skipped.
pub fn render_chart(title: &str, series: &[Series<'_>], width: usize, height: usize) -> String {
    let width = width.max(20);
    let height = height.max(5);

    let finite = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .filter(|v| v.is_finite());
    let (min_val, max_val) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min_val.is_finite() {
        return format!("{title}: no data\n");
    }
    let range = (max_val - min_val).max(1e-6);
    let steps = series
        .iter()
        .map(|s| s.offset + s.values.len())
        .max()
        .unwrap_or(0)
        .max(1);

    let mut grid = vec![vec![' '; width]; height];
    for s in series {
        for (i, &val) in s.values.iter().enumerate() {
            if !val.is_finite() {
                continue;
            }
            let col = ((s.offset + i) * width / steps).min(width - 1);
            let normalized = (val - min_val) / range;
            let row = (((1.0 - normalized) * (height - 1) as f32).round() as usize).min(height - 1);
            grid[row][col] = s.glyph;
        }
    }

    let mut output = String::new();
    output.push_str(&format!("┌─ {title} "));
    output.push_str(&"─".repeat((width + 8).saturating_sub(title.chars().count() + 4)));
    output.push_str("┐\n");

    for (i, row) in grid.iter().enumerate() {
        if i == 0 {
            output.push_str(&format!("│{max_val:>7.3}"));
        } else if i == height - 1 {
            output.push_str(&format!("│{min_val:>7.3}"));
        } else {
            output.push_str("│       ");
        }
        output.extend(row.iter());
        output.push_str("│\n");
    }

    output.push('└');
    output.push_str(&"─".repeat(width + 7));
    output.push_str("┘\n");

    let legend: Vec<String> = series.iter().map(|s| format!("{} {}", s.glyph, s.label)).collect();
    output.push_str(&format!("        {}\n", legend.join("   ")));
    output
}

/// Chart of one sample: history, then ground truth and prediction over the horizon.
pub fn plot_forecast(history: &[f32], truth: &[f32], pred: &[f32]) -> String {
    let offset = history.len();
    render_chart(
        "Forecast",
        &[
            Series {
                label: "history",
                values: history,
                offset: 0,
                glyph: '·',
            },
            Series {
                label: "truth",
                values: truth,
                offset,
                glyph: 'o',
            },
            Series {
                label: "prediction",
                values: pred,
                offset,
                glyph: '*',
            },
        ],
        60,
        12,
    )
}

/// Chart of training and validation loss per epoch.
pub fn plot_losses(train: &[f32], valid: &[f32]) -> String {
    render_chart(
        "Loss",
        &[
            Series {
                label: "train",
                values: train,
                offset: 0,
                glyph: '█',
            },
            Series {
                label: "valid",
                values: valid,
                offset: 0,
                glyph: '▒',
            },
        ],
        50,
        10,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_forecast_contains_all_series() {
        let history: Vec<f32> = (0..24).map(|i| (i as f32 / 4.0).sin()).collect();
        let chart = plot_forecast(&history, &[0.1, 0.2, 0.3], &[0.15, 0.25, 0.2]);
        assert!(chart.contains('·'));
        assert!(chart.contains('o') || chart.contains('*'));
        assert!(chart.contains("prediction"));
        // title + rows + bottom + legend
        assert_eq!(chart.lines().count(), 12 + 3);
    }

    #[test]
    fn test_empty_and_nan() {
        assert!(render_chart("Empty", &[], 30, 5).contains("no data"));
        let chart = plot_losses(&[f32::NAN, 1.0, 0.5], &[]);
        assert!(chart.contains('█'));
    }
}
