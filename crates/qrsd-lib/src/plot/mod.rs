use crate::signal::{PeakCandidate, QrsEvent, Recording};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Scatter markers; `style.width` is the marker radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Points(PointSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) => &line.points,
            Series::Points(points) => &points.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over all series, `None` when there is nothing to draw.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut iter = self.series.iter().flat_map(|s| s.points().iter());
        let first = iter.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(iter.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

/// Raw signal against sample index, with QRS and noise peaks marked.
pub fn figure_from_detection(
    recording: &Recording,
    qrs: &[QrsEvent],
    noise: &[PeakCandidate],
    max_points: usize,
) -> Figure {
    let mut fig = Figure::new(Some("ECG measurements with detected peaks".into()));
    fig.x.label = Some("sample".into());
    fig.y.label = Some("amplitude".into());
    let signal: Vec<[f64; 2]> = recording
        .samples
        .iter()
        .map(|s| [s.index as f64, s.amplitude])
        .collect();
    fig.add_series(Series::Line(LineSeries {
        name: "ECG".into(),
        points: decimate_points(&signal, max_points),
        style: Style {
            width: 1.4,
            color: Color(0xFA8072),
        },
    }));
    fig.add_series(Series::Points(PointSeries {
        name: "noise".into(),
        points: noise
            .iter()
            .map(|c| [c.index as f64, c.amplitude])
            .collect(),
        style: Style {
            width: 3.0,
            color: Color(0x999999),
        },
    }));
    fig.add_series(Series::Points(PointSeries {
        name: "QRS".into(),
        points: qrs.iter().map(|e| [e.index as f64, e.amplitude]).collect(),
        style: Style {
            width: 4.0,
            color: Color(0x000000),
        },
    }));
    fig
}
