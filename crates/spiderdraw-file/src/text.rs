//! 文本格式
//!
//! 每个图元占两行：第一行是类型名，第二行是逗号分隔的位置参数。
//!
//! ```text
//! Circle
//! 100,100,50,A
//! Line
//! 50,100,300,300
//! Point
//! 50,100
//! ```
//!
//! 圆的第四个参数是可选的标签字母。

use crate::error::FileError;
use spiderdraw_core::config::DiagramConfig;
use spiderdraw_core::diagram::Diagram;
use spiderdraw_core::entity::ShapeKind;
use spiderdraw_core::geometry::Geometry;
use spiderdraw_core::math::Point2;

/// 把记录写成文本
pub fn to_text(records: &[Geometry]) -> String {
    let mut out = String::new();
    for record in records {
        let params = match record {
            Geometry::Point { position } => format!("{},{}", position.x, position.y),
            Geometry::Line { start, end } => format!("{},{},{},{}", start.x, start.y, end.x, end.y),
            Geometry::Circle {
                center,
                radius,
                label,
            } => match label {
                Some(label) => format!("{},{},{},{}", center.x, center.y, radius, label),
                None => format!("{},{},{}", center.x, center.y, radius),
            },
            Geometry::Box { min, max } => format!("{},{},{},{}", min.x, min.y, max.x, max.y),
        };
        out.push_str(&format!("{}\n{}\n", record.type_name(), params));
    }
    out
}

fn numbers(line_no: usize, fields: &[&str]) -> Result<Vec<f64>, FileError> {
    fields
        .iter()
        .map(|field| {
            field.trim().parse::<f64>().map_err(|_| {
                FileError::InvalidFormat(format!("line {}: '{}' is not a number", line_no, field.trim()))
            })
        })
        .collect()
}

fn parse_record(line_no: usize, kind: ShapeKind, params: &str) -> Result<Geometry, FileError> {
    let fields: Vec<&str> = params.split(',').collect();
    let arity = |expected: &[usize]| {
        if expected.contains(&fields.len()) {
            Ok(())
        } else {
            Err(FileError::InvalidFormat(format!(
                "line {}: {} expects {:?} parameters, found {}",
                line_no,
                kind.name(),
                expected,
                fields.len()
            )))
        }
    };

    match kind {
        ShapeKind::Point => {
            arity(&[2])?;
            let n = numbers(line_no, &fields)?;
            Ok(Geometry::point(n[0], n[1]))
        }
        ShapeKind::Line => {
            arity(&[4])?;
            let n = numbers(line_no, &fields)?;
            Ok(Geometry::line(n[0], n[1], n[2], n[3]))
        }
        ShapeKind::Circle => {
            arity(&[3, 4])?;
            let n = numbers(line_no, &fields[..3])?;
            let label = match fields.get(3).map(|f| f.trim()) {
                None => None,
                Some(text) => {
                    let mut chars = text.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(c),
                        _ => {
                            return Err(FileError::InvalidFormat(format!(
                                "line {}: circle label '{}' must be one character",
                                line_no, text
                            )))
                        }
                    }
                }
            };
            Ok(Geometry::Circle {
                center: Point2::new(n[0], n[1]),
                radius: n[2],
                label,
            })
        }
        ShapeKind::Box => {
            arity(&[4])?;
            let n = numbers(line_no, &fields)?;
            Ok(Geometry::rect(n[0], n[1], n[2], n[3]))
        }
    }
}

/// 解析文本为记录
pub fn parse_text(text: &str) -> Result<Vec<Geometry>, FileError> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() % 2 != 0 {
        return Err(FileError::InvalidFormat(format!(
            "expected pairs of lines, found {} lines",
            lines.len()
        )));
    }

    lines
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| {
            let line_no = i * 2 + 1;
            let name = pair[0].trim();
            let kind = ShapeKind::from_name(name).ok_or_else(|| {
                FileError::InvalidFormat(format!("line {}: unknown shape type '{}'", line_no, name))
            })?;
            parse_record(line_no + 1, kind, pair[1])
        })
        .collect()
}

/// 从文本重建图表
pub fn load_text(config: DiagramConfig, canvas: Option<(f64, f64)>, text: &str) -> Result<Diagram, FileError> {
    let records = parse_text(text)?;
    tracing::info!("Parsed {} shapes from text", records.len());
    Ok(Diagram::from_records(config, canvas, records)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_parse() {
        let records = vec![
            Geometry::labeled_circle(100.0, 100.0, 50.0, 'A'),
            Geometry::circle(10.0, 10.0, 2.5),
            Geometry::line(50.0, 100.0, 300.0, 300.0),
            Geometry::point(50.0, 100.0),
            Geometry::rect(0.0, 0.0, 20.0, 20.0),
        ];
        let text = to_text(&records);
        assert!(text.starts_with("Circle\n100,100,50,A\n"));
        assert_eq!(parse_text(&text).unwrap(), records);
    }

    #[test]
    fn test_odd_line_count_is_rejected() {
        let err = parse_text("Point\n1,2\nLine\n").unwrap_err();
        assert!(matches!(err, FileError::InvalidFormat(_)));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = parse_text("Freeform\n1,2\n").unwrap_err();
        assert!(err.to_string().contains("unknown shape type"));
    }

    #[test]
    fn test_bad_parameters_are_rejected() {
        assert!(parse_text("Point\n1,x\n").is_err());
        assert!(parse_text("Line\n1,2,3\n").is_err());
        assert!(parse_text("Circle\n1,2,3,AB\n").is_err());
    }

    #[test]
    fn test_load_text_resolves_incidence() {
        let diagram = load_text(
            DiagramConfig::default(),
            Some((400.0, 400.0)),
            "Line\n0,0,100,0\nPoint\n3,4\n",
        )
        .unwrap();
        let point = diagram.points().next().unwrap();
        assert!(point.line1().is_some());
        assert_eq!(point.owner_box(), diagram.drawing_box());
    }

    #[test]
    fn test_degenerate_circle_surfaces_diagram_error() {
        let err = load_text(DiagramConfig::default(), None, "Circle\n0,0,0\n").unwrap_err();
        assert!(matches!(err, FileError::Diagram(_)));
    }
}
