/// Maximal run of one pixel value within a pixel line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowComponent {
    pub position: usize,
    pub length: usize,
    pub value: u8,
}

/// Split a pixel line into runs.
pub fn line_components(line: &[u8]) -> Vec<RowComponent> {
    let mut components: Vec<RowComponent> = Vec::new();
    for (position, &value) in line.iter().enumerate() {
        match components.last_mut() {
            Some(last) if last.value == value => last.length += 1,
            _ => components.push(RowComponent {
                position,
                length: 1,
                value,
            }),
        }
    }
    components
}

/// Count white-to-black transitions between consecutive runs.
pub fn white_to_black_transitions(components: &[RowComponent]) -> usize {
    components
        .windows(2)
        .filter(|w| w[0].value == 0 && w[1].value == 1)
        .count()
}

/// Run statistics of one pixel line, each normalized to `[0, 1]` across
/// the matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFeatures {
    pub max_size: f64,
    pub min_size: f64,
    pub avg_size: f64,
    pub count: f64,
}

impl LineFeatures {
    fn as_array(&self) -> [f64; 4] {
        [self.max_size, self.min_size, self.avg_size, self.count]
    }

    /// Euclidean distance over the four features.
    pub fn distance(&self, other: &LineFeatures) -> f64 {
        self.as_array()
            .iter()
            .zip(other.as_array())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Runs and normalized features of every line of a matrix.
#[derive(Debug, Clone)]
pub struct RowComponents {
    pub components: Vec<Vec<RowComponent>>,
    pub features: Vec<LineFeatures>,
}

impl RowComponents {
    pub fn from_lines(lines: &[Vec<u8>]) -> Self {
        let components: Vec<Vec<RowComponent>> =
            lines.iter().map(|line| line_components(line)).collect();

        let raw: Vec<[f64; 4]> = lines
            .iter()
            .zip(&components)
            .map(|(line, runs)| {
                let max = runs.iter().map(|r| r.length).max().unwrap_or(0) as f64;
                let min = runs.iter().map(|r| r.length).min().unwrap_or(0) as f64;
                let count = runs.len() as f64;
                let avg = if runs.is_empty() {
                    0.0
                } else {
                    line.len() as f64 / count
                };
                [max, min, avg, count]
            })
            .collect();

        let mut lo = [f64::INFINITY; 4];
        let mut hi = [f64::NEG_INFINITY; 4];
        for values in &raw {
            for k in 0..4 {
                lo[k] = lo[k].min(values[k]);
                hi[k] = hi[k].max(values[k]);
            }
        }
        let scale = |k: usize, v: f64| {
            let range = hi[k] - lo[k];
            if range > 0.0 { (v - lo[k]) / range } else { 0.0 }
        };

        let features = raw
            .iter()
            .map(|v| LineFeatures {
                max_size: scale(0, v[0]),
                min_size: scale(1, v[1]),
                avg_size: scale(2, v[2]),
                count: scale(3, v[3]),
            })
            .collect();

        Self {
            components,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Raw number of runs on line `index`.
    pub fn run_count(&self, index: usize) -> usize {
        self.components[index].len()
    }
}
