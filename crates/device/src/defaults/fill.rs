//! Vector fills decomposed into `fill_rectangle` runs.

use super::{clip_rect, pure_color};
use crate::device::Device;
use crate::error::{DeviceError, DeviceResult};
use crate::op::Op;
use pagechain_types::geometry::{FIXED_ONE, fixed2int, fixed2int_ceiling, float2fixed, int2fixed};
use pagechain_types::graphics::{
    ClipPath, FillAttributes, FillParams, FillRule, ImagerState, LogicalOp, LOP_DEFAULT, Path, PathSegment,
    ShadingVertex, StrokeParams,
};
use pagechain_types::{
    ColorIndex, ColorValue, DeviceColor, Fixed, FixedEdge, FixedPoint, FixedRect, IntRect, MAX_COLOR_VALUE,
};

const HALF: Fixed = FIXED_ONE / 2;
const CURVE_STEPS: i64 = 16;

/// Deferred: a device without a buffer has nowhere to put pixels.
pub fn fill_rectangle(_dev: &mut Device, _x: i32, _y: i32, _w: i32, _h: i32, _color: ColorIndex) -> DeviceResult<()> {
    Err(DeviceError::Unsupported(Op::FillRectangle))
}

pub fn fillpage(dev: &mut Device, _pis: &ImagerState, color: &DeviceColor) -> DeviceResult<()> {
    let Some(color) = pure_color(dev, color) else {
        return Ok(());
    };
    let (w, h) = (dev.state().width, dev.state().height);
    dev.fill_rectangle(0, 0, w, h, color)
}

pub fn fill_rectangle_hl_color(
    dev: &mut Device,
    rect: &FixedRect,
    _pis: &ImagerState,
    color: &DeviceColor,
    clip: Option<&ClipPath>,
) -> DeviceResult<()> {
    let Some(color) = pure_color(dev, color) else {
        return Ok(());
    };
    let r = rect.to_int_rect().intersect(&clip_rect(dev, clip));
    if r.is_empty() {
        return Ok(());
    }
    dev.fill_rectangle(r.p.x, r.p.y, r.width(), r.height(), color)
}

pub fn draw_line(dev: &mut Device, x0: i32, y0: i32, x1: i32, y1: i32, color: ColorIndex) -> DeviceResult<()> {
    dev.draw_thin_line(
        FixedPoint::new(int2fixed(x0), int2fixed(y0)),
        FixedPoint::new(int2fixed(x1), int2fixed(y1)),
        &DeviceColor::Pure(color),
        LOP_DEFAULT,
    )
}

/// Bresenham over whole pixels, with horizontal runs merged.
pub fn draw_thin_line(
    dev: &mut Device,
    from: FixedPoint,
    to: FixedPoint,
    color: &DeviceColor,
    _lop: LogicalOp,
) -> DeviceResult<()> {
    let Some(color) = pure_color(dev, color) else {
        return Ok(());
    };
    let (mut x, mut y) = (fixed2int(from.x), fixed2int(from.y));
    let (x1, y1) = (fixed2int(to.x), fixed2int(to.y));
    let (dx, dy) = ((x1 - x).abs(), -(y1 - y).abs());
    let (sx, sy) = (if x < x1 { 1 } else { -1 }, if y < y1 { 1 } else { -1 });
    let mut err = dx + dy;
    let mut run_start = x;
    loop {
        let done = x == x1 && y == y1;
        let e2 = 2 * err;
        let step_x = !done && e2 >= dy;
        let step_y = !done && e2 <= dx;
        if done || step_y {
            let (lo, hi) = (run_start.min(x), run_start.max(x));
            dev.fill_rectangle(lo, y, hi - lo + 1, 1, color)?;
        }
        if done {
            return Ok(());
        }
        if step_x {
            err += dy;
            x += sx;
        }
        if step_y {
            err += dx;
            y += sy;
            run_start = x;
        }
    }
}

pub fn fill_path(
    dev: &mut Device,
    _pis: &ImagerState,
    path: &Path,
    params: &FillParams,
    color: &DeviceColor,
    clip: Option<&ClipPath>,
) -> DeviceResult<()> {
    let Some(color) = pure_color(dev, color) else {
        return Ok(());
    };
    let bounds = clip_rect(dev, clip);
    fill_polygons(dev, &flatten(path), params.rule, bounds, color)
}

/// Each segment becomes a quad `line_width` wide; the quads are filled
/// together so joins do not double-paint.
pub fn stroke_path(
    dev: &mut Device,
    pis: &ImagerState,
    path: &Path,
    params: &StrokeParams,
    color: &DeviceColor,
    clip: Option<&ClipPath>,
) -> DeviceResult<()> {
    let Some(color) = pure_color(dev, color) else {
        return Ok(());
    };
    let width = if params.line_width > 0.0 { params.line_width } else { pis.line_width };
    let half = (width.max(1.0) / 2.0) * f64::from(FIXED_ONE);
    let mut quads = Vec::new();
    for (polyline, closed) in polylines(path) {
        let mut segments: Vec<(FixedPoint, FixedPoint)> = polyline.windows(2).map(|w| (w[0], w[1])).collect();
        if closed && polyline.len() > 2 {
            if let (Some(last), Some(first)) = (polyline.last(), polyline.first()) {
                segments.push((*last, *first));
            }
        }
        for (a, b) in segments {
            let (dx, dy) = (f64::from(b.x - a.x), f64::from(b.y - a.y));
            let len = dx.hypot(dy);
            if len == 0.0 {
                continue;
            }
            let nx = (-dy / len * half) as Fixed;
            let ny = (dx / len * half) as Fixed;
            quads.push(vec![
                FixedPoint::new(a.x + nx, a.y + ny),
                FixedPoint::new(b.x + nx, b.y + ny),
                FixedPoint::new(b.x - nx, b.y - ny),
                FixedPoint::new(a.x - nx, a.y - ny),
            ]);
        }
    }
    let bounds = clip_rect(dev, clip);
    fill_polygons(dev, &quads, FillRule::NonZero, bounds, color)
}

pub fn fill_trapezoid(
    dev: &mut Device,
    left: &FixedEdge,
    right: &FixedEdge,
    ybot: Fixed,
    ytop: Fixed,
    swap_axes: bool,
    color: &DeviceColor,
    _lop: LogicalOp,
) -> DeviceResult<()> {
    let Some(color) = pure_color(dev, color) else {
        return Ok(());
    };
    for y in fixed2int_ceiling(ybot - HALF)..fixed2int_ceiling(ytop - HALF) {
        let center = int2fixed(y) + HALF;
        let x0 = fixed2int_ceiling(left.x_at(center) - HALF);
        let x1 = fixed2int_ceiling(right.x_at(center) - HALF);
        if x1 <= x0 {
            continue;
        }
        if swap_axes {
            dev.fill_rectangle(y, x0, 1, x1 - x0, color)?;
        } else {
            dev.fill_rectangle(x0, y, x1 - x0, 1, color)?;
        }
    }
    Ok(())
}

pub fn fill_parallelogram(
    dev: &mut Device,
    origin: FixedPoint,
    a: FixedPoint,
    b: FixedPoint,
    color: &DeviceColor,
    _lop: LogicalOp,
) -> DeviceResult<()> {
    let Some(color) = pure_color(dev, color) else {
        return Ok(());
    };
    let corners = vec![
        origin,
        FixedPoint::new(origin.x + a.x, origin.y + a.y),
        FixedPoint::new(origin.x + a.x + b.x, origin.y + a.y + b.y),
        FixedPoint::new(origin.x + b.x, origin.y + b.y),
    ];
    let bounds = clip_rect(dev, None);
    fill_polygons(dev, &[corners], FillRule::NonZero, bounds, color)
}

pub fn fill_triangle(
    dev: &mut Device,
    origin: FixedPoint,
    a: FixedPoint,
    b: FixedPoint,
    color: &DeviceColor,
    _lop: LogicalOp,
) -> DeviceResult<()> {
    let Some(color) = pure_color(dev, color) else {
        return Ok(());
    };
    let corners = vec![
        origin,
        FixedPoint::new(origin.x + a.x, origin.y + a.y),
        FixedPoint::new(origin.x + b.x, origin.y + b.y),
    ];
    let bounds = clip_rect(dev, None);
    fill_polygons(dev, &[corners], FillRule::NonZero, bounds, color)
}

/// Paints one scanline of a smooth shading, merging pixels that encode to
/// the same device color.
pub fn fill_linear_color_scanline(
    dev: &mut Device,
    fa: &FillAttributes,
    x: i32,
    y: i32,
    width: i32,
    c0: &[f32],
    step: &[f32],
) -> DeviceResult<()> {
    let clip = fa.clip.to_int_rect();
    let mut run: Option<(i32, ColorIndex)> = None;
    for i in 0..=width {
        let color = (i < width).then(|| {
            let comps: Vec<ColorValue> = c0
                .iter()
                .zip(step.iter().chain(std::iter::repeat(&0.0)))
                .map(|(c, s)| ((c + s * i as f32).clamp(0.0, 1.0) * f32::from(MAX_COLOR_VALUE)) as ColorValue)
                .collect();
            dev.encode_color(&comps)
        });
        match (run, color) {
            (Some((_, current)), Some(next)) if current == next => continue,
            (Some((start, current)), _) => {
                scanline_run(dev, fa, &clip, start, x + i, y, current)?;
                run = color.map(|c| (x + i, c));
            }
            (None, _) => run = color.map(|c| (x + i, c)),
        }
    }
    Ok(())
}

fn scanline_run(
    dev: &mut Device,
    fa: &FillAttributes,
    clip: &IntRect,
    x0: i32,
    x1: i32,
    y: i32,
    color: ColorIndex,
) -> DeviceResult<()> {
    let r = if fa.swap_axes { IntRect::new(y, x0, y + 1, x1) } else { IntRect::new(x0, y, x1, y + 1) };
    let r = r.intersect(clip);
    if r.is_empty() {
        return Ok(());
    }
    dev.fill_rectangle(r.p.x, r.p.y, r.width(), r.height(), color)
}

/// `Ok(false)`: the caller decomposes the shape into scanlines.
pub fn fill_linear_color_trapezoid(
    _dev: &mut Device,
    _fa: &FillAttributes,
    _corners: &[ShadingVertex; 4],
) -> DeviceResult<bool> {
    Ok(false)
}

pub fn fill_linear_color_triangle(
    _dev: &mut Device,
    _fa: &FillAttributes,
    _corners: &[ShadingVertex; 3],
) -> DeviceResult<bool> {
    Ok(false)
}

/// Subpaths as point lists, curves flattened; the flag says whether the
/// subpath was explicitly closed.
fn polylines(path: &Path) -> Vec<(Vec<FixedPoint>, bool)> {
    let mut out = Vec::new();
    let mut current: Vec<FixedPoint> = Vec::new();
    let mut closed = false;
    for seg in &path.segments {
        match *seg {
            PathSegment::MoveTo(p) => {
                if current.len() > 1 {
                    out.push((std::mem::take(&mut current), closed));
                }
                current.clear();
                current.push(p);
                closed = false;
            }
            PathSegment::LineTo(p) => current.push(p),
            PathSegment::CurveTo(c1, c2, end) => {
                let start = current.last().copied().unwrap_or(c1);
                current.extend((1..=CURVE_STEPS).map(|i| bezier(start, c1, c2, end, i)));
            }
            PathSegment::ClosePath => closed = true,
        }
    }
    if current.len() > 1 {
        out.push((current, closed));
    }
    out
}

fn flatten(path: &Path) -> Vec<Vec<FixedPoint>> {
    polylines(path).into_iter().map(|(points, _)| points).collect()
}

fn bezier(p0: FixedPoint, p1: FixedPoint, p2: FixedPoint, p3: FixedPoint, i: i64) -> FixedPoint {
    let t = i as f64 / CURVE_STEPS as f64;
    let mt = 1.0 - t;
    let blend = |a: Fixed, b: Fixed, c: Fixed, d: Fixed| {
        mt * mt * mt * f64::from(a) + 3.0 * mt * mt * t * f64::from(b) + 3.0 * mt * t * t * f64::from(c)
            + t * t * t * f64::from(d)
    };
    FixedPoint::new(
        float2fixed(blend(p0.x, p1.x, p2.x, p3.x) / f64::from(FIXED_ONE)),
        float2fixed(blend(p0.y, p1.y, p2.y, p3.y) / f64::from(FIXED_ONE)),
    )
}

/// Scan-converts closed polygons, sampling each row at pixel centers.
/// Rows with identical spans are merged into taller rectangles.
pub(crate) fn fill_polygons(
    dev: &mut Device,
    polygons: &[Vec<FixedPoint>],
    rule: FillRule,
    bounds: IntRect,
    color: ColorIndex,
) -> DeviceResult<()> {
    let edges: Vec<(FixedPoint, FixedPoint)> = polygons
        .iter()
        .filter(|p| p.len() > 2)
        .flat_map(|p| p.iter().zip(p.iter().cycle().skip(1)).map(|(a, b)| (*a, *b)))
        .filter(|(a, b)| a.y != b.y)
        .collect();
    let all: Vec<FixedPoint> = polygons.iter().flatten().copied().collect();
    let Some(bbox) = FixedRect::bounding(&all) else {
        return Ok(());
    };
    let y_start = fixed2int(bbox.p.y).max(bounds.p.y);
    let y_end = fixed2int_ceiling(bbox.q.y).min(bounds.q.y);

    let mut pending: Vec<(i32, i32)> = Vec::new();
    let mut pending_y = y_start;
    for y in y_start..y_end {
        let spans = row_spans(&edges, int2fixed(y) + HALF, rule, &bounds);
        if spans != pending {
            flush_spans(dev, &pending, pending_y, y, color)?;
            pending = spans;
            pending_y = y;
        }
    }
    flush_spans(dev, &pending, pending_y, y_end.max(pending_y), color)
}

fn row_spans(edges: &[(FixedPoint, FixedPoint)], yc: Fixed, rule: FillRule, bounds: &IntRect) -> Vec<(i32, i32)> {
    let mut crossings: Vec<(i64, i32)> = edges
        .iter()
        .filter(|(a, b)| (a.y <= yc && b.y > yc) || (b.y <= yc && a.y > yc))
        .map(|(a, b)| {
            let t = i64::from(yc - a.y);
            let x = i64::from(a.x) + t * i64::from(b.x - a.x) / i64::from(b.y - a.y);
            (x, if b.y > a.y { 1 } else { -1 })
        })
        .collect();
    crossings.sort_by_key(|c| c.0);

    let mut spans = Vec::new();
    let mut winding = 0;
    for pair in crossings.windows(2) {
        winding += pair[0].1;
        let inside = match rule {
            FillRule::NonZero => winding != 0,
            FillRule::EvenOdd => winding % 2 != 0,
        };
        if !inside {
            continue;
        }
        let x0 = fixed2int_ceiling(pair[0].0 as Fixed - HALF).max(bounds.p.x);
        let x1 = fixed2int_ceiling(pair[1].0 as Fixed - HALF).min(bounds.q.x);
        if x1 <= x0 {
            continue;
        }
        match spans.last_mut() {
            Some((_, end)) if *end == x0 => *end = x1,
            _ => spans.push((x0, x1)),
        }
    }
    spans
}

fn flush_spans(dev: &mut Device, spans: &[(i32, i32)], y0: i32, y1: i32, color: ColorIndex) -> DeviceResult<()> {
    if y1 <= y0 {
        return Ok(());
    }
    for (x0, x1) in spans {
        dev.fill_rectangle(*x0, y0, x1 - x0, y1 - y0, color)?;
    }
    Ok(())
}
