//! Box overlap and assignment helpers shared by the tracker and detectors.

/// Intersection over union of two `[x1, y1, x2, y2]` boxes. Zero when they
/// do not overlap.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let overlap_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let overlap_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let shared = overlap_w * overlap_h;
    if shared <= 0.0 {
        return 0.0;
    }
    let area = |r: &[f64; 4]| (r[2] - r[0]) * (r[3] - r[1]);
    shared / (area(a) + area(b) - shared)
}

/// Greedy IoU assignment between two box lists.
///
/// Candidate pairs with IoU > 0 and IoU >= `thresh` are taken best first;
/// a row or column is used at most once. Returns `(row, col)` index pairs.
pub fn greedy_match(rows: &[[f64; 4]], cols: &[[f64; 4]], thresh: f64) -> Vec<(usize, usize)> {
    let mut candidates: Vec<(f64, usize, usize)> = rows
        .iter()
        .enumerate()
        .flat_map(|(r, a)| {
            cols.iter()
                .enumerate()
                .map(move |(c, b)| (bbox_iou(a, b), r, c))
        })
        .filter(|&(iou, _, _)| iou > 0.0 && iou >= thresh)
        .collect();
    candidates.sort_by(|x, y| y.0.total_cmp(&x.0));

    let mut row_taken = vec![false; rows.len()];
    let mut col_taken = vec![false; cols.len()];
    let mut assigned = Vec::new();
    for (_, r, c) in candidates {
        if row_taken[r] || col_taken[c] {
            continue;
        }
        row_taken[r] = true;
        col_taken[c] = true;
        assigned.push((r, c));
    }
    assigned
}

/// Euclidean distance between two 2D points.
pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}
