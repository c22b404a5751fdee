/// Intersection over union of two `[x1, y1, x2, y2]` boxes.
///
/// Degenerate or disjoint boxes give `0.0`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let [ax1, ay1, ax2, ay2] = *a;
    let [bx1, by1, bx2, by2] = *b;

    let overlap_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
    let overlap_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
    let inter = overlap_w * overlap_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let union = (ax2 - ax1) * (ay2 - ay1) + (bx2 - bx1) * (by2 - by1) - inter;
    inter / union
}
