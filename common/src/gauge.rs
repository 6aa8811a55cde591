use regex::Regex;

use crate::error::CommonError;

/// Vector-potential expressions for the `dynamic` gauge, one string per component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GaugeExpressions {
    pub ax: Option<String>,
    pub ay: Option<String>,
    pub az: Option<String>,
}

/// Strips every whitespace character; expressions are stored compacted.
pub fn compact_expression(expression: &str) -> String {
    expression.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Reads a gauge config file of the form
///
/// ```text
/// Ax = -y*omega*omegaX
/// Ay = x*omega*omegaY
/// Az = 0
/// ```
///
/// Blank lines and lines starting with `#` are skipped.
pub fn read_gauge_config(path: &str) -> Result<GaugeExpressions, CommonError> {
    let contents =
        std::fs::read_to_string(path).map_err(|_| CommonError::GaugeConfigReadError {
            path: path.to_string(),
        })?;
    parse_gauge_config(&contents)
}

pub fn parse_gauge_config(contents: &str) -> Result<GaugeExpressions, CommonError> {
    let line_pattern = Regex::new(r"^\s*A([xyz])\s*=\s*(.+?)\s*$").expect("valid gauge pattern");

    let mut expressions = GaugeExpressions::default();
    for (number, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let captures =
            line_pattern
                .captures(line)
                .ok_or_else(|| CommonError::GaugeConfigFormat {
                    line: number + 1,
                    content: line.to_string(),
                })?;
        let expression = Some(compact_expression(&captures[2]));
        match &captures[1] {
            "x" => expressions.ax = expression,
            "y" => expressions.ay = expression,
            _ => expressions.az = expression,
        }
    }

    log::debug!("parsed gauge config {expressions:?}");
    Ok(expressions)
}

#[test]
fn test_parse_gauge_config() {
    let contents = "# rotating frame\nAx = -y * omega * omegaX\n\nAy = x*omega*omegaY\nAz = 0\n";
    let expressions = parse_gauge_config(contents).unwrap();
    assert_eq!(expressions.ax.as_deref(), Some("-y*omega*omegaX"));
    assert_eq!(expressions.ay.as_deref(), Some("x*omega*omegaY"));
    assert_eq!(expressions.az.as_deref(), Some("0"));
}

#[test]
fn test_parse_gauge_config_rejects_garbage() {
    let result = parse_gauge_config("Ax = x\nBx = 3\n");
    assert!(matches!(
        result,
        Err(CommonError::GaugeConfigFormat { line: 2, .. })
    ));
}

#[test]
fn test_read_gauge_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gauge.cfg");
    let result = read_gauge_config(path.to_str().unwrap());
    assert!(matches!(
        result,
        Err(CommonError::GaugeConfigReadError { .. })
    ));
}
