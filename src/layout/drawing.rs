//! SVG technical drawing of a side.
//!
//! Drawing units are centimeters at 1:1. The side's bounding panel sits in
//! the canvas with room on the left for the height dimension and below for
//! one width dimension per segment. Output is a pure function of the state:
//! the same state always renders to the same bytes.

use std::fmt::Write;

use super::model::{Side, SideState};
use crate::error::{LayoutError, LayoutResult};

/// Blank border around the drawing.
pub const MARGIN: f64 = 50.0;
/// Additional room reserved for dimension lines.
pub const DIMENSION_SPACE: f64 = 60.0;

const DIMENSION_OFFSET: f64 = 30.0;
const ARROW_LEN: f64 = 8.0;
const ARROW_HALF_WIDTH: f64 = 3.0;
const FONT_SIZE: f64 = 14.0;

/// A rendered drawing ready to be offered as a download.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: String,
}

impl ExportFile {
    pub const MIME_TYPE: &'static str = "image/svg+xml";
}

/// Renders the side as an SVG document.
pub fn render_svg(side: Side, state: &SideState) -> LayoutResult<String> {
    let mut svg = String::new();
    write_svg(&mut svg, side, state).map_err(|e| LayoutError::export(e.to_string()))?;
    Ok(svg)
}

/// Renders the side and names the file after it.
pub fn export_file(side: Side, state: &SideState, task_prefix: Option<&str>) -> LayoutResult<ExportFile> {
    Ok(ExportFile {
        file_name: export_file_name(side, state, task_prefix),
        contents: render_svg(side, state)?,
    })
}

/// `[<prefix>-]<label>-layout-<side>-<width>mm.svg`
pub fn export_file_name(side: Side, state: &SideState, task_prefix: Option<&str>) -> String {
    let mut name = String::new();
    if let Some(prefix) = task_prefix.map(sanitize_prefix).filter(|p| !p.is_empty()) {
        name.push_str(&prefix);
        name.push('-');
    }
    name.push_str(&format!(
        "{}-layout-{}-{}mm.svg",
        side.label().to_lowercase(),
        side,
        num(state.total_width.round())
    ));
    name
}

fn sanitize_prefix(prefix: &str) -> String {
    prefix
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

fn write_svg(svg: &mut String, side: Side, state: &SideState) -> std::fmt::Result {
    let width = state.total_width + 2.0 * MARGIN + DIMENSION_SPACE;
    let height = state.height + 2.0 * MARGIN + DIMENSION_SPACE;
    let x0 = MARGIN + DIMENSION_SPACE;
    let y0 = MARGIN;
    let bottom = y0 + state.height;

    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = num(width),
        h = num(height)
    )?;
    writeln!(
        svg,
        r#"  <g fill="none" stroke="black" stroke-width="1" font-family="sans-serif" font-size="{}">"#,
        num(FONT_SIZE)
    )?;

    writeln!(
        svg,
        r#"    <text class="side-label" x="{}" y="{}" fill="black" stroke="none">{}</text>"#,
        num(x0),
        num(y0 - 15.0),
        side.label()
    )?;
    writeln!(
        svg,
        r#"    <rect class="outline" x="{}" y="{}" width="{}" height="{}" stroke-width="2"/>"#,
        num(x0),
        num(y0),
        num(state.total_width),
        num(state.height)
    )?;

    // door_height is measured from the bottom, so the opening's top edge sits
    // at height - door_height from the top of the outline.
    for door in state.sorted_doors() {
        let left = x0 + door.position;
        let right = left + door.width;
        let top = y0 + (state.height - door.door_height);
        line(svg, "door", left, top, left, bottom)?;
        line(svg, "door", right, top, right, bottom)?;
        line(svg, "door", left, top, right, top)?;
    }

    let dim_y = bottom + DIMENSION_OFFSET;
    for segment in state.segments() {
        let start = x0 + segment.start;
        let end = x0 + segment.end;
        line(svg, "extension", start, bottom, start, dim_y + 5.0)?;
        line(svg, "extension", end, bottom, end, dim_y + 5.0)?;
        line(svg, "dimension width", start, dim_y, end, dim_y)?;
        arrowhead(svg, end, dim_y, start, dim_y)?;
        arrowhead(svg, start, dim_y, end, dim_y)?;
        writeln!(
            svg,
            r#"    <text class="dimension-label" x="{}" y="{}" text-anchor="middle" fill="black" stroke="none">{}</text>"#,
            num((start + end) / 2.0),
            num(dim_y - 6.0),
            num(segment.width.round())
        )?;
    }

    let dim_x = x0 - DIMENSION_OFFSET;
    line(svg, "extension", x0, y0, dim_x - 5.0, y0)?;
    line(svg, "extension", x0, bottom, dim_x - 5.0, bottom)?;
    line(svg, "dimension height", dim_x, y0, dim_x, bottom)?;
    arrowhead(svg, dim_x, bottom, dim_x, y0)?;
    arrowhead(svg, dim_x, y0, dim_x, bottom)?;
    let label_x = dim_x - 6.0;
    let label_y = (y0 + bottom) / 2.0;
    writeln!(
        svg,
        r#"    <text class="dimension-label" x="{x}" y="{y}" transform="rotate(-90 {x} {y})" text-anchor="middle" fill="black" stroke="none">{}</text>"#,
        num(state.height.round()),
        x = num(label_x),
        y = num(label_y)
    )?;

    writeln!(svg, "  </g>")?;
    writeln!(svg, "</svg>")
}

fn line(svg: &mut String, class: &str, x1: f64, y1: f64, x2: f64, y2: f64) -> std::fmt::Result {
    writeln!(
        svg,
        r#"    <line class="{}" x1="{}" y1="{}" x2="{}" y2="{}"/>"#,
        class,
        num(x1),
        num(y1),
        num(x2),
        num(y2)
    )
}

/// Filled arrowhead with its tip at (ex, ey), pointing away from (sx, sy).
fn arrowhead(svg: &mut String, sx: f64, sy: f64, ex: f64, ey: f64) -> std::fmt::Result {
    let dx = ex - sx;
    let dy = ey - sy;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 0.001 {
        return Ok(());
    }
    let (ux, uy) = (dx / len, dy / len);
    let (px, py) = (-uy, ux);
    let base_x = ex - ux * ARROW_LEN.min(len / 2.0);
    let base_y = ey - uy * ARROW_LEN.min(len / 2.0);
    writeln!(
        svg,
        r#"    <polygon class="arrow" points="{},{} {},{} {},{}" fill="black" stroke="none"/>"#,
        num(ex),
        num(ey),
        num(base_x + px * ARROW_HALF_WIDTH),
        num(base_y + py * ARROW_HALF_WIDTH),
        num(base_x - px * ARROW_HALF_WIDTH),
        num(base_y - py * ARROW_HALF_WIDTH)
    )
}

/// Whole numbers print bare, everything else with two decimals.
fn num(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::model::Door;

    #[test]
    fn test_empty_side_single_width_dimension() {
        let state = SideState::new(240.0, 800.0);
        let svg = render_svg(Side::Left, &state).unwrap();

        assert_eq!(svg.matches(r#"class="dimension width""#).count(), 1);
        assert!(svg.contains(r#"<line class="dimension width" x1="110" y1="320" x2="910" y2="320"/>"#));
        assert!(svg.contains(">800</text>"));
        assert!(svg.contains(">Motorista</text>"));
        assert!(svg.contains(r#"width="960" height="400""#));
        assert_eq!(svg.matches(r#"class="door""#).count(), 0);
    }

    #[test]
    fn test_doors_and_dimensions() {
        let state = SideState::new(240.0, 800.0).with_door(Door::new(350.0, 100.0, 190.0));
        let svg = render_svg(Side::Right, &state).unwrap();

        assert_eq!(svg.matches(r#"class="door""#).count(), 3);
        assert_eq!(svg.matches(r#"class="dimension width""#).count(), 3);
        assert_eq!(svg.matches(r#"class="dimension height""#).count(), 1);
        // 2 arrowheads per dimension line
        assert_eq!(svg.matches(r#"class="arrow""#).count(), 8);
        // door top edge: 50 + (240 - 190)
        assert!(svg.contains(r#"<line class="door" x1="460" y1="100" x2="560" y2="100"/>"#));
        assert!(svg.contains(">350</text>"));
        assert!(svg.contains(">100</text>"));
        assert!(svg.contains(r#"transform="rotate(-90"#));
        assert!(svg.contains(">240</text>"));
        assert!(svg.contains(">Sapo</text>"));
    }

    #[test]
    fn test_render_deterministic() {
        let state = SideState::new(242.0, 242.0).with_door(Door::new(71.0, 100.0, 190.0));
        let a = render_svg(Side::Back, &state).unwrap();
        let mut moved = state.clone();
        moved.doors[0].id = "other-id".to_string();
        let b = render_svg(Side::Back, &moved).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_export_file_name() {
        let state = SideState::new(240.0, 800.0);
        assert_eq!(
            export_file_name(Side::Left, &state, None),
            "motorista-layout-left-800mm.svg"
        );
        assert_eq!(
            export_file_name(Side::Back, &Side::Back.default_state(), Some(" OS 123/A ")),
            "OS-123-A-traseira-layout-back-242mm.svg"
        );
        assert_eq!(
            export_file_name(Side::Right, &state, Some("///")),
            "sapo-layout-right-800mm.svg"
        );

        let file = export_file(Side::Left, &state, Some("task")).unwrap();
        assert!(file.file_name.starts_with("task-"));
        assert!(file.contents.starts_with("<svg"));
    }

    #[test]
    fn test_num_format() {
        assert_eq!(num(800.0), "800");
        assert_eq!(num(216.666), "216.67");
        assert_eq!(num(-0.0), "0");
    }
}
