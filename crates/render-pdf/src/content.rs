//! Page content streams, written in device coordinates.
//!
//! Every stream opens with `q` and a `cm` that maps device pixels (y down)
//! onto PDF points (y up), so the drawing operations below can use the
//! coordinates the chain hands them unchanged.

use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};
use pagechain_types::geometry::fixed2float;
use pagechain_types::graphics::{ClipPath, FillRule, Path, PathSegment};
use pagechain_types::{ColorValue, FixedPoint, MAX_COLOR_VALUE, Matrix};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    Fill(FillRule),
    Stroke,
}

#[derive(Debug)]
pub struct ContentBuilder {
    operations: Vec<Operation>,
    fill_color: Option<Vec<f32>>,
    stroke_color: Option<Vec<f32>>,
    line_width: Option<f64>,
    /// Saves not yet restored, the opening one included.
    depth: usize,
}

impl ContentBuilder {
    /// Starts a stream for a page `height_points` tall drawn at `resolution` dpi.
    pub fn new(resolution: [f32; 2], height_points: f32) -> Self {
        let base = Matrix::new(
            72.0 / f64::from(resolution[0]),
            0.0,
            0.0,
            -72.0 / f64::from(resolution[1]),
            0.0,
            f64::from(height_points),
        );
        let mut builder = Self { operations: Vec::new(), fill_color: None, stroke_color: None, line_width: None, depth: 0 };
        builder.save();
        builder.concat(&base);
        builder
    }

    pub fn is_empty(&self) -> bool {
        // `q` and the base `cm` only.
        self.operations.len() <= 2
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    pub fn save(&mut self) {
        self.push("q", vec![]);
        self.depth += 1;
    }

    /// Restores the graphics state; color and width caches are forgotten
    /// since the restored state may differ.
    pub fn restore(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.push("Q", vec![]);
        self.depth -= 1;
        self.fill_color = None;
        self.stroke_color = None;
        self.line_width = None;
    }

    pub fn concat(&mut self, m: &Matrix) {
        let operands = m.to_array().iter().map(|v| real(*v)).collect();
        self.push("cm", operands);
    }

    pub fn set_fill_color(&mut self, components: &[ColorValue]) {
        let values = unit_values(components);
        if self.fill_color.as_ref() == Some(&values) {
            return;
        }
        let operator = match values.len() {
            1 => "g",
            4 => "k",
            _ => "rg",
        };
        self.push(operator, values.iter().map(|v| Object::Real(*v)).collect());
        self.fill_color = Some(values);
    }

    pub fn set_stroke_color(&mut self, components: &[ColorValue]) {
        let values = unit_values(components);
        if self.stroke_color.as_ref() == Some(&values) {
            return;
        }
        let operator = match values.len() {
            1 => "G",
            4 => "K",
            _ => "RG",
        };
        self.push(operator, values.iter().map(|v| Object::Real(*v)).collect());
        self.stroke_color = Some(values);
    }

    pub fn set_line_width(&mut self, width: f64) {
        if self.line_width != Some(width) {
            self.push("w", vec![real(width)]);
            self.line_width = Some(width);
        }
    }

    pub fn rectangle(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.push("re", vec![real(x), real(y), real(width), real(height)]);
    }

    pub fn fill_rectangle(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.rectangle(f64::from(x), f64::from(y), f64::from(width), f64::from(height));
        self.push("f", vec![]);
    }

    pub fn path(&mut self, path: &Path) {
        let point = |p: &FixedPoint| vec![real(fixed2float(p.x)), real(fixed2float(p.y))];
        for segment in &path.segments {
            match segment {
                PathSegment::MoveTo(p) => self.push("m", point(p)),
                PathSegment::LineTo(p) => self.push("l", point(p)),
                PathSegment::CurveTo(a, b, c) => {
                    let mut operands = point(a);
                    operands.extend(point(b));
                    operands.extend(point(c));
                    self.push("c", operands);
                }
                PathSegment::ClosePath => self.push("h", vec![]),
            }
        }
    }

    pub fn paint(&mut self, paint: Paint) {
        let operator = match paint {
            Paint::Fill(FillRule::NonZero) => "f",
            Paint::Fill(FillRule::EvenOdd) => "f*",
            Paint::Stroke => "S",
        };
        self.push(operator, vec![]);
    }

    /// Saves the state and clips to `clip`'s box; pair with [`Self::restore`].
    pub fn begin_clip(&mut self, clip: &ClipPath) {
        let b = clip.outer_box;
        self.save();
        self.rectangle(
            fixed2float(b.p.x),
            fixed2float(b.p.y),
            fixed2float(b.q.x - b.p.x),
            fixed2float(b.q.y - b.p.y),
        );
        self.push("W", vec![]);
        self.push("n", vec![]);
    }

    /// Paints the XObject `name` into the unit square mapped by `m`.
    pub fn draw_xobject(&mut self, name: &str, m: &Matrix) {
        self.save();
        self.concat(m);
        self.push("Do", vec![Object::Name(name.as_bytes().to_vec())]);
        self.restore();
    }

    pub fn show_text(&mut self, font: &str, size: f64, tm: &Matrix, spacing: f64, bytes: &[u8]) {
        self.push("BT", vec![]);
        self.push("Tf", vec![Object::Name(font.as_bytes().to_vec()), real(size)]);
        self.push("Tm", tm.to_array().iter().map(|v| real(*v)).collect());
        if spacing != 0.0 {
            self.push("Tc", vec![real(spacing)]);
        }
        self.push("Tj", vec![Object::String(bytes.to_vec(), StringFormat::Literal)]);
        self.push("ET", vec![]);
    }

    pub fn set_graphics_state(&mut self, name: &str) {
        self.push("gs", vec![Object::Name(name.as_bytes().to_vec())]);
    }

    /// Closes every open save and hands back the stream.
    pub fn finish(mut self) -> Content {
        while self.depth > 0 {
            self.restore();
        }
        Content { operations: self.operations }
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn unit_values(components: &[ColorValue]) -> Vec<f32> {
    components.iter().map(|c| f32::from(*c) / f32::from(MAX_COLOR_VALUE)).collect()
}
